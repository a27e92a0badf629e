//! PostgreSQL adapter
//!
//! A single `sqlx::PgConnection`. Statements are prepared before execution
//! so column metadata is reported even when no rows come back.

use super::client::DatabaseClient;
use super::engine::{Dialect, Engine};
use super::query::{QueryResult, Row, Value};
use crate::connections::ConnectionProfile;
use crate::core::{DbcliError, Result};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::types::{Oid, PgInterval, PgMoney};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::{Column, Connection, Decode, Executor, Postgres, Row as _, Statement, Type, TypeInfo, ValueRef};
use std::time::Instant;
use tracing::{debug, info};

pub struct PostgresClient {
    options: PgConnectOptions,
    conn: Option<PgConnection>,
}

impl PostgresClient {
    pub fn new(profile: &ConnectionProfile) -> Self {
        let mut options = PgConnectOptions::new()
            .host(profile.host.as_deref().unwrap_or("localhost"))
            .port(profile.port.unwrap_or(5432))
            .ssl_mode(if profile.use_ssl() {
                PgSslMode::Require
            } else {
                PgSslMode::Prefer
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
        PostgresClient { options, conn: None }
    }
}

/// Reads a cell as `T`, `None` when the driver refuses the conversion
fn read<'r, T>(row: &'r PgRow, index: usize) -> Option<T>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    match row.try_get(index) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Column {} not decodable: {}", index, e);
            None
        }
    }
}

fn as_text<T: ToString>(value: T) -> Value {
    Value::Text(value.to_string())
}

/// Renders an array the way psql does, `{1,2,3}`
fn array_text<T: ToString>(items: &[T]) -> String {
    let items: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("{{{}}}", items.join(","))
}

fn array<T: ToString>(items: Vec<T>) -> Value {
    Value::Text(array_text(&items))
}

/// MONEY arrives as an integer count of cents
fn money_text(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, cents / 100, cents % 100)
}

fn plural(count: i64, unit: &str) -> String {
    if count.abs() == 1 {
        format!("{} {}", count, unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

/// Formats an interval like psql: `1 year 2 mons 3 days 04:05:06`
fn interval_text(months: i32, days: i32, microseconds: i64) -> String {
    let mut parts = Vec::new();
    let (years, months) = (i64::from(months) / 12, i64::from(months) % 12);
    if years != 0 {
        parts.push(plural(years, "year"));
    }
    if months != 0 {
        parts.push(plural(months, "mon"));
    }
    if days != 0 {
        parts.push(plural(days.into(), "day"));
    }
    if microseconds != 0 || parts.is_empty() {
        let sign = if microseconds < 0 { "-" } else { "" };
        let micros = microseconds.unsigned_abs();
        let seconds = micros / 1_000_000;
        let mut clock = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            seconds / 3600,
            seconds / 60 % 60,
            seconds % 60
        );
        if micros % 1_000_000 != 0 {
            clock.push_str(&format!(".{:06}", micros % 1_000_000));
        }
        parts.push(clock);
    }
    parts.join(" ")
}

/// Placeholder for a value the console cannot display
fn unrecognized(type_name: &str) -> Value {
    Value::Text(format!("<{}>", type_name))
}

/// Decodes one cell by its reported type name. A cell that cannot be
/// decoded degrades to a placeholder; it never fails the row.
fn decode(row: &PgRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(e) => {
            debug!("Column {} unreadable: {}", index, e);
            return Value::Null;
        }
    }
    let type_name = row.column(index).type_info().name().to_string();
    let value = match type_name.as_str() {
        "BOOL" => read(row, index).map(Value::Bool),
        "INT2" => read::<i16>(row, index).map(|v| Value::Int(v.into())),
        "INT4" => read::<i32>(row, index).map(|v| Value::Int(v.into())),
        "INT8" => read(row, index).map(Value::Int),
        "OID" => read::<Oid>(row, index).map(|v| Value::Int(v.0.into())),
        "FLOAT4" => read::<f32>(row, index).map(|v| Value::Float(v.into())),
        "FLOAT8" => read(row, index).map(Value::Float),
        "NUMERIC" => read::<BigDecimal>(row, index).map(as_text),
        "MONEY" => read::<PgMoney>(row, index).map(|m| Value::Text(money_text(m.0))),
        "TIMESTAMPTZ" => read::<DateTime<Utc>>(row, index).map(Value::Timestamp),
        "TIMESTAMP" => read::<NaiveDateTime>(row, index).map(|t| Value::Timestamp(t.and_utc())),
        "DATE" => read::<NaiveDate>(row, index).map(as_text),
        "TIME" => read::<NaiveTime>(row, index).map(as_text),
        "INTERVAL" => read::<PgInterval>(row, index)
            .map(|i| Value::Text(interval_text(i.months, i.days, i.microseconds))),
        "UUID" => read::<uuid::Uuid>(row, index).map(as_text),
        "JSON" | "JSONB" => read::<serde_json::Value>(row, index).map(as_text),
        "BYTEA" => read::<Vec<u8>>(row, index).map(|b| Value::Text(format!("[BLOB: {} bytes]", b.len()))),
        "BOOL[]" | "_bool" => read::<Vec<bool>>(row, index).map(array),
        "INT2[]" | "_int2" => read::<Vec<i16>>(row, index).map(array),
        "INT4[]" | "_int4" => read::<Vec<i32>>(row, index).map(array),
        "INT8[]" | "_int8" => read::<Vec<i64>>(row, index).map(array),
        "FLOAT4[]" | "_float4" => read::<Vec<f32>>(row, index).map(array),
        "FLOAT8[]" | "_float8" => read::<Vec<f64>>(row, index).map(array),
        "NUMERIC[]" | "_numeric" => read::<Vec<BigDecimal>>(row, index).map(array),
        "UUID[]" | "_uuid" => read::<Vec<uuid::Uuid>>(row, index).map(array),
        "JSON[]" | "JSONB[]" | "_json" | "_jsonb" => read::<Vec<serde_json::Value>>(row, index).map(array),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" | "CHAR[]" | "_text" | "_varchar" | "_bpchar"
        | "_name" | "_char" => read::<Vec<String>>(row, index).map(array),
        // TEXT, VARCHAR, NAME, BPCHAR and other string-compatible types
        _ => read::<String>(row, index).map(Value::Text),
    };
    value.unwrap_or_else(|| unrecognized(&type_name))
}

fn to_row(row: &PgRow) -> Row {
    let mut record = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        record.push(column.name(), decode(row, index));
    }
    record
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    fn engine(&self) -> Engine {
        Engine::Relational(Dialect::Postgres)
    }

    async fn connect(&mut self) -> Result<()> {
        let conn = PgConnection::connect_with(&self.options)
            .await
            .map_err(|e| DbcliError::Connection(e.to_string()))?;
        info!("Connected to PostgreSQL at {}", self.options.get_host());
        self.conn = Some(conn);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| DbcliError::Connection(e.to_string()))?;
            debug!("PostgreSQL connection closed");
        }
        Ok(())
    }

    async fn query(&mut self, text: &str) -> Result<QueryResult> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| DbcliError::Query("Not connected to database".to_string()))?;

        let started = Instant::now();
        let stmt = (&mut *conn)
            .prepare(text)
            .await
            .map_err(|e| DbcliError::Query(e.to_string()))?;
        let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();

        let raw = stmt
            .query()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| DbcliError::Query(e.to_string()))?;
        let rows = raw.iter().map(to_row).collect();

        Ok(QueryResult::new(rows, Some(columns), started))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_follow_profile() {
        let mut profile = ConnectionProfile::new("pg", Engine::Relational(Dialect::Postgres));
        profile.host = Some("db.internal".into());
        profile.port = Some(6543);
        profile.database = Some("shop".into());
        let client = PostgresClient::new(&profile);

        assert_eq!(client.options.get_host(), "db.internal");
        assert_eq!(client.options.get_port(), 6543);
        assert_eq!(client.options.get_database(), Some("shop"));
        assert_eq!(client.engine(), Engine::Relational(Dialect::Postgres));
    }

    #[test]
    fn test_unrecognized_types_degrade_to_placeholder() {
        assert_eq!(unrecognized("INET"), Value::Text("<INET>".to_string()));
        assert_eq!(unrecognized("TSVECTOR"), Value::Text("<TSVECTOR>".to_string()));
    }

    #[test]
    fn test_array_text() {
        assert_eq!(array_text(&[1, 2, 3]), "{1,2,3}");
        assert_eq!(array_text::<i32>(&[]), "{}");
        assert_eq!(array(vec!["a".to_string(), "b".to_string()]), Value::Text("{a,b}".to_string()));
    }

    #[test]
    fn test_money_text() {
        assert_eq!(money_text(123_456), "$1234.56");
        assert_eq!(money_text(-5), "-$0.05");
        assert_eq!(money_text(0), "$0.00");
    }

    #[test]
    fn test_interval_text() {
        assert_eq!(interval_text(14, 3, 3_723_000_000), "1 year 2 mons 3 days 01:02:03");
        assert_eq!(interval_text(0, 1, 0), "1 day");
        assert_eq!(interval_text(0, 0, 0), "00:00:00");
        assert_eq!(interval_text(0, 0, -1_500_000), "-00:00:01.500000");
        assert_eq!(interval_text(24, 0, 0), "2 years");
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_noop() {
        let profile = ConnectionProfile::new("pg", Engine::Relational(Dialect::Postgres));
        let mut client = PostgresClient::new(&profile);
        client.disconnect().await.unwrap();
        assert!(matches!(client.query("SELECT 1").await, Err(DbcliError::Query(_))));
    }
}
