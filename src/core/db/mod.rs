/// Database Module
///
/// This module provides the database client abstraction for dbcli,
/// organized into focused submodules per concern and per engine.
///
/// ## Architecture
///
/// - **Engines** (`engine.rs`): The closed set of supported engines and their introspection queries
/// - **Results** (`query.rs`): The engine-neutral row/value model every adapter returns
/// - **Client contract** (`client.rs`): The `DatabaseClient` trait and the adapter factory
/// - **Adapters** (`sqlite.rs`, `mysql.rs`, `postgres.rs`, `mongo/`): One implementation per engine
///
/// ## Error Handling
///
/// Adapters translate driver failures into `DbcliError::Connection` while
/// connecting and `DbcliError::Query` while executing.
pub mod client;
pub mod engine;
pub mod mongo;
pub mod mysql;
pub mod postgres;
pub mod query;
pub mod sqlite;

pub use client::*;
pub use engine::*;
pub use query::*;
