//! MySQL adapter
//!
//! A single `sqlx::MySqlConnection`. Statements go through the binary
//! protocol when the server can prepare them and fall back to the text
//! protocol for the few it refuses (ER_UNSUPPORTED_PS).

use super::client::DatabaseClient;
use super::engine::{Dialect, Engine};
use super::query::{QueryResult, Row, Value};
use crate::connections::ConnectionProfile;
use crate::core::{DbcliError, Result};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlRow, MySqlSslMode};
use sqlx::{Column, Connection, Executor, Row as _, Statement, TypeInfo, ValueRef};
use std::time::Instant;
use tracing::{debug, info};

const ER_UNSUPPORTED_PS: u16 = 1295;

pub struct MySqlClient {
    options: MySqlConnectOptions,
    conn: Option<MySqlConnection>,
}

impl MySqlClient {
    pub fn new(profile: &ConnectionProfile) -> Self {
        let mut options = MySqlConnectOptions::new()
            .host(profile.host.as_deref().unwrap_or("localhost"))
            .port(profile.port.unwrap_or(3306))
            .ssl_mode(if profile.use_ssl() {
                MySqlSslMode::Required
            } else {
                MySqlSslMode::Preferred
            });
        if let Some(user) = &profile.username {
            options = options.username(user);
        }
        if let Some(password) = &profile.password {
            options = options.password(password);
        }
        if let Some(database) = &profile.database {
            options = options.database(database);
        }
        MySqlClient { options, conn: None }
    }
}

/// Raw text of a cell, or `<TYPE>` when the bytes are not text
fn text_or_placeholder(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    row.try_get_unchecked::<String, _>(index)
        .map(Value::Text)
        .unwrap_or_else(|_| Value::Text(format!("<{}>", type_name)))
}

fn decode(row: &MySqlRow, index: usize) -> std::result::Result<Value, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }
    let type_name = row.column(index).type_info().name().to_string();
    let value = match type_name.as_str() {
        "BOOLEAN" => Value::Bool(row.try_get(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => Value::Int(row.try_get(index)?),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" | "BIT" => {
            let n: u64 = row.try_get(index)?;
            i64::try_from(n)
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Text(n.to_string()))
        }
        "YEAR" => Value::Int(row.try_get::<u16, _>(index)?.into()),
        "FLOAT" => Value::Float(row.try_get::<f32, _>(index)?.into()),
        "DOUBLE" => Value::Float(row.try_get(index)?),
        "DECIMAL" => Value::Text(row.try_get::<BigDecimal, _>(index)?.to_string()),
        "TIMESTAMP" => Value::Timestamp(row.try_get::<DateTime<Utc>, _>(index)?),
        "DATETIME" => Value::Timestamp(row.try_get::<NaiveDateTime, _>(index)?.and_utc()),
        "DATE" => Value::Text(row.try_get::<NaiveDate, _>(index)?.to_string()),
        "TIME" => match row.try_get::<NaiveTime, _>(index) {
            Ok(t) => Value::Text(t.to_string()),
            // Durations outside 00:00..24:00
            Err(_) => text_or_placeholder(row, index, &type_name),
        },
        "JSON" => Value::Text(row.try_get::<serde_json::Value, _>(index)?.to_string()),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            let bytes: Vec<u8> = row.try_get(index)?;
            let len = bytes.len();
            String::from_utf8(bytes)
                .map(Value::Text)
                .unwrap_or_else(|_| Value::Text(format!("[BLOB: {} bytes]", len)))
        }
        _ => text_or_placeholder(row, index, &type_name),
    };
    Ok(value)
}

fn to_rows(raw: &[MySqlRow]) -> Result<Vec<Row>> {
    raw.iter()
        .map(|row| {
            let mut record = Row::new();
            for (index, column) in row.columns().iter().enumerate() {
                record.push(column.name(), decode(row, index)?);
            }
            Ok(record)
        })
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
        .map_err(|e| DbcliError::Query(e.to_string()))
}

fn is_unsupported_ps(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(|e| e.number() == ER_UNSUPPORTED_PS)
            .unwrap_or(false),
        _ => false,
    }
}

#[async_trait]
impl DatabaseClient for MySqlClient {
    fn engine(&self) -> Engine {
        Engine::Relational(Dialect::MySql)
    }

    async fn connect(&mut self) -> Result<()> {
        let conn = MySqlConnection::connect_with(&self.options)
            .await
            .map_err(|e| DbcliError::Connection(e.to_string()))?;
        info!("Connected to MySQL");
        self.conn = Some(conn);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| DbcliError::Connection(e.to_string()))?;
            debug!("MySQL connection closed");
        }
        Ok(())
    }

    async fn query(&mut self, text: &str) -> Result<QueryResult> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| DbcliError::Query("Not connected to database".to_string()))?;

        let started = Instant::now();
        match (&mut *conn).prepare(text).await {
            Ok(stmt) => {
                let columns: Vec<String> =
                    stmt.columns().iter().map(|c| c.name().to_string()).collect();
                let raw = stmt
                    .query()
                    .fetch_all(&mut *conn)
                    .await
                    .map_err(|e| DbcliError::Query(e.to_string()))?;
                Ok(QueryResult::new(to_rows(&raw)?, Some(columns), started))
            }
            Err(e) if is_unsupported_ps(&e) => {
                debug!("Statement cannot be prepared, using text protocol");
                let raw = (&mut *conn)
                    .fetch_all(sqlx::raw_sql(text))
                    .await
                    .map_err(|e| DbcliError::Query(e.to_string()))?;
                let columns = raw
                    .first()
                    .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect());
                Ok(QueryResult::new(to_rows(&raw)?, columns, started))
            }
            Err(e) => Err(DbcliError::Query(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_and_host() {
        let profile = ConnectionProfile::new("my", Engine::Relational(Dialect::MySql));
        let client = MySqlClient::new(&profile);
        assert_eq!(client.options.get_host(), "localhost");
        assert_eq!(client.options.get_port(), 3306);
    }

    #[tokio::test]
    async fn test_unconnected_client() {
        let profile = ConnectionProfile::new("my", Engine::Relational(Dialect::MySql));
        let mut client = MySqlClient::new(&profile);
        client.disconnect().await.unwrap();
        match client.query("SHOW TABLES").await {
            Err(DbcliError::Query(msg)) => assert_eq!(msg, "Not connected to database"),
            other => panic!("Expected query error, got {:?}", other),
        }
    }
}
