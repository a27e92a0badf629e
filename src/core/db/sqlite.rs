/// SQLite Adapter
///
/// Wraps a single `rusqlite::Connection` opened on an existing database
/// file. Column names come from the first returned row.

use super::client::DatabaseClient;
use super::engine::Engine;
use super::query::{QueryResult, Row, Value};
use crate::connections::ConnectionProfile;
use crate::core::{DbcliError, Result};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::time::Instant;
use tracing::{debug, info};

pub struct SqliteClient {
    filename: Option<String>,
    conn: Option<Connection>,
}

impl SqliteClient {
    pub fn new(profile: &ConnectionProfile) -> Self {
        SqliteClient {
            filename: profile.filename.clone(),
            conn: None,
        }
    }

    fn open(path: &str) -> rusqlite::Result<Connection> {
        if path == ":memory:" {
            return Connection::open_in_memory();
        }
        // Without SQLITE_OPEN_CREATE a missing file fails to open
        Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    fn run(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<Row>> {
        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (i, name) in names.iter().enumerate() {
                record.push(name.as_str(), to_value(row.get_ref(i)?));
            }
            out.push(record);
        }
        Ok(out)
    }
}

fn to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Text(format!("[BLOB: {} bytes]", bytes.len())),
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn engine(&self) -> Engine {
        Engine::FileBased
    }

    async fn connect(&mut self) -> Result<()> {
        let path = self
            .filename
            .as_deref()
            .ok_or_else(|| DbcliError::Connection("No database file configured".to_string()))?;
        let conn = Self::open(path)
            .map_err(|e| DbcliError::Connection(format!("{}: {}", path, e)))?;
        info!("Opened SQLite database {}", path);
        self.conn = Some(conn);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .map_err(|(_, e)| DbcliError::Connection(e.to_string()))?;
            debug!("Closed SQLite database");
        }
        Ok(())
    }

    async fn query(&mut self, text: &str) -> Result<QueryResult> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| DbcliError::Query("Not connected to database".to_string()))?;

        let started = Instant::now();
        let rows = Self::run(conn, text).map_err(|e| DbcliError::Query(e.to_string()))?;
        let columns = rows
            .first()
            .map(|row| row.keys().map(String::from).collect())
            .unwrap_or_default();
        Ok(QueryResult::new(rows, Some(columns), started))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn profile_for(path: &str) -> ConnectionProfile {
        let mut profile = ConnectionProfile::new("test", Engine::FileBased);
        profile.filename = Some(path.to_string());
        profile
    }

    #[tokio::test]
    async fn test_missing_file_is_connection_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.db");
        let mut client = SqliteClient::new(&profile_for(&path.display().to_string()));

        assert!(matches!(client.connect().await, Err(DbcliError::Connection(_))));
        assert!(!path.exists());
        // Disconnect after a failed connect is a no-op
        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_query_rows_and_columns() {
        let mut client = SqliteClient::new(&profile_for(":memory:"));
        client.connect().await.unwrap();

        client
            .query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, score REAL, avatar BLOB)")
            .await
            .unwrap();
        client
            .query("INSERT INTO users VALUES (1, 'ada', 9.5, x'0102'), (2, NULL, 7.0, NULL)")
            .await
            .unwrap();

        let result = client.query("SELECT id, name, score, avatar FROM users ORDER BY id").await.unwrap();
        assert_eq!(result.row_count, 2);
        assert_eq!(
            result.columns,
            Some(vec!["id".into(), "name".into(), "score".into(), "avatar".into()])
        );
        assert_eq!(result.rows[0].get("name"), Some(&Value::Text("ada".into())));
        assert_eq!(result.rows[0].get("avatar"), Some(&Value::Text("[BLOB: 2 bytes]".into())));
        assert_eq!(result.rows[1].get("name"), Some(&Value::Null));
        assert_eq!(result.rows[1].get("score"), Some(&Value::Float(7.0)));

        client.disconnect().await.unwrap();
        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_result_has_empty_columns() {
        let mut client = SqliteClient::new(&profile_for(":memory:"));
        client.connect().await.unwrap();
        client.query("CREATE TABLE t (a INTEGER)").await.unwrap();

        let result = client.query("SELECT a FROM t").await.unwrap();
        assert_eq!(result.row_count, 0);
        assert_eq!(result.columns, Some(vec![]));
    }

    #[tokio::test]
    async fn test_bad_sql_is_query_error() {
        let mut client = SqliteClient::new(&profile_for(":memory:"));
        client.connect().await.unwrap();
        match client.query("SELEC nonsense").await {
            Err(DbcliError::Query(msg)) => assert!(msg.contains("syntax")),
            other => panic!("Expected query error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_query_before_connect_fails() {
        let mut client = SqliteClient::new(&profile_for(":memory:"));
        assert!(matches!(client.query("SELECT 1").await, Err(DbcliError::Query(_))));
    }
}
