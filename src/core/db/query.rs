/// Query Result Module
///
/// The engine-neutral result contract every adapter returns: ordered rows
/// of named, dynamically typed scalars plus timing and optional column
/// metadata.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// A single dynamically typed cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// One result row: column name to value, in the order the engine produced them
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Row { fields: Vec::new() }
    }

    /// Appends a field. A repeated name replaces the earlier value in place.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// The first value of the row, used for single-column introspection results
    pub fn first_value(&self) -> Option<&Value> {
        self.fields.first().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Represents the result of a query execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Rows in engine order
    pub rows: Vec<Row>,
    /// Number of rows returned
    pub row_count: usize,
    /// Wall time spent inside the driver, in milliseconds
    pub execution_time_ms: u64,
    /// Column names as reported by the engine; `None` for schema-less stores
    pub columns: Option<Vec<String>>,
}

impl QueryResult {
    /// Creates a QueryResult, measuring elapsed time from `started`
    pub fn new(rows: Vec<Row>, columns: Option<Vec<String>>, started: Instant) -> Self {
        let row_count = rows.len();
        QueryResult {
            rows,
            row_count,
            execution_time_ms: started.elapsed().as_millis() as u64,
            columns,
        }
    }

    /// Columns to display: reported metadata when present, otherwise the
    /// keys of the first row.
    pub fn column_names(&self) -> Vec<String> {
        match &self.columns {
            Some(cols) if !cols.is_empty() => cols.clone(),
            _ => self
                .rows
                .first()
                .map(|row| row.keys().map(String::from).collect())
                .unwrap_or_default(),
        }
    }

    /// First value of every row, as text. Used for table and database listings.
    pub fn first_column_strings(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.first_value())
            .filter(|v| !v.is_null())
            .map(|v| v.to_string())
            .collect()
    }
}
