//! Database client contract
//!
//! Every engine adapter implements [`DatabaseClient`]; the console only ever
//! talks to a `Box<dyn DatabaseClient>` produced by [`create_client`].

use super::engine::{Dialect, Engine};
use super::mongo::MongoClient;
use super::mysql::MySqlClient;
use super::postgres::PostgresClient;
use super::query::QueryResult;
use super::sqlite::SqliteClient;
use crate::connections::ConnectionProfile;
use crate::core::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Uniform capability interface over one database session
#[async_trait]
pub trait DatabaseClient: Send {
    /// Engine this client talks to
    fn engine(&self) -> Engine;

    /// Establish the underlying session.
    ///
    /// # Errors
    ///
    /// `DbcliError::Connection` when the file, network or auth handshake fails.
    async fn connect(&mut self) -> Result<()>;

    /// Release the session. Safe to call when `connect` never ran or failed,
    /// and safe to call twice.
    async fn disconnect(&mut self) -> Result<()>;

    /// Send an opaque command string to the engine
    ///
    /// # Errors
    ///
    /// `DbcliError::Query` carrying the engine's message, including when the
    /// client is not connected.
    async fn query(&mut self, text: &str) -> Result<QueryResult>;
}

/// Builds the adapter for the profile's engine.
///
/// # Errors
///
/// `DbcliError::UnsupportedEngine` when the profile's type is not known.
pub fn create_client(profile: &ConnectionProfile) -> Result<Box<dyn DatabaseClient>> {
    let client: Box<dyn DatabaseClient> = match profile.engine()? {
        Engine::Relational(Dialect::MySql) => Box::new(MySqlClient::new(profile)),
        Engine::Relational(Dialect::Postgres) => Box::new(PostgresClient::new(profile)),
        Engine::FileBased => Box::new(SqliteClient::new(profile)),
        Engine::Document => Box::new(MongoClient::new(profile)),
    };
    debug!("Created {} client for connection '{}'", client.engine(), profile.name);
    Ok(client)
}

/// Connects and immediately disconnects, reporting only the connect outcome
pub async fn test_connection(profile: &ConnectionProfile) -> Result<()> {
    let mut client = create_client(profile)?;
    let outcome = client.connect().await;
    if let Err(e) = client.disconnect().await {
        warn!("Disconnect after connection test failed: {}", e);
    }
    outcome
}
