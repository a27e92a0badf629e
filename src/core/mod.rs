/// Core Module for dbcli
///
/// Shared infrastructure for the query console: the error type and the
/// database client abstraction with its per-engine adapters.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{DbcliError, Result};
