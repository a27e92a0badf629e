/// DBCLI Error Module
///
/// This module defines the error types shared by the query console, the
/// database adapters and the history store.
use thiserror::Error;

/// Error type for the dbcli application.
///
/// The console treats these differently:
/// - `Connection` aborts the session (after the guaranteed disconnect)
/// - `Query` is reported, recorded to history and the loop continues
/// - `Cancelled` ends the session with a farewell, it is not a failure
/// - `UnsupportedEngine` is raised while building a client and is fatal
///
/// History persistence problems never appear here; the store logs them
/// and keeps working from memory.
#[derive(Error, Debug)]
pub enum DbcliError {
    /// Handshake, authentication, file or network failure while connecting
    #[error("Connection error: {0}")]
    Connection(String),

    /// The engine rejected or failed to execute a query
    #[error("Query error: {0}")]
    Query(String),

    /// The user aborted an input request (Ctrl+C, menu exit)
    #[error("Input cancelled by user")]
    Cancelled,

    /// A stored profile names an engine type this build does not know
    #[error("Unsupported database type: {0}")]
    UnsupportedEngine(String),

    /// No stored profile has the requested identifier
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and terminal I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing and serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbcliError {
    /// True for the user-initiated abort of an input request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DbcliError::Cancelled)
    }
}

/// Type alias for Result to use DbcliError as the error type.
pub type Result<T> = std::result::Result<T, DbcliError>;
