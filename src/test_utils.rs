//! # Test Utilities Module
//!
//! In-process stand-ins for the console's collaborators:
//! - `FakeClient`: a scripted database client that logs every query
//! - `ScriptedInput`: an input strategy replaying canned queries
//! - `SharedBuffer`: a `Write` sink the test can read back

use crate::core::db::{DatabaseClient, Engine, QueryResult, Row};
use crate::core::{DbcliError, Result};
use crate::query_editor::{InputContext, QueryInput};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Scripted database client.
///
/// Table listing queries return the configured tables, column listing
/// queries the configured columns, anything else the configured rows. The
/// query log is shared between clones so a test keeps a handle after
/// boxing the client.
#[derive(Clone)]
pub struct FakeClient {
    engine: Engine,
    tables: Vec<String>,
    columns: Vec<String>,
    rows: Vec<Row>,
    fail_connect: bool,
    fail_queries: bool,
    log: Arc<Mutex<Vec<String>>>,
    disconnects: Arc<Mutex<usize>>,
}

impl FakeClient {
    pub fn new(engine: Engine) -> Self {
        FakeClient {
            engine,
            tables: Vec::new(),
            columns: Vec::new(),
            rows: vec![Row::new().with("answer", 42_i64)],
            fail_connect: false,
            fail_queries: false,
            log: Arc::new(Mutex::new(Vec::new())),
            disconnects: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_tables(mut self, tables: &[&str]) -> Self {
        self.tables = tables.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    /// Every query fails with a `Query` error
    pub fn failing(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    /// `connect` fails with a `Connection` error
    pub fn unreachable(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Queries received so far, in order
    pub fn executed(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn disconnect_count(&self) -> usize {
        *self.disconnects.lock().unwrap()
    }

    fn is_column_listing(&self, text: &str) -> bool {
        text.starts_with("PRAGMA table_info")
            || text.starts_with("DESCRIBE")
            || text.contains("information_schema.columns")
    }
}

#[async_trait]
impl DatabaseClient for FakeClient {
    fn engine(&self) -> Engine {
        self.engine
    }

    async fn connect(&mut self) -> Result<()> {
        if self.fail_connect {
            return Err(DbcliError::Connection("connection refused".to_string()));
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        *self.disconnects.lock().unwrap() += 1;
        Ok(())
    }

    async fn query(&mut self, text: &str) -> Result<QueryResult> {
        self.log.lock().unwrap().push(text.to_string());
        let started = Instant::now();
        if self.fail_queries {
            return Err(DbcliError::Query("no such table: missing".to_string()));
        }
        let rows = if Some(text) == self.engine.table_listing_query() {
            self.tables.iter().map(|t| Row::new().with("name", t.as_str())).collect()
        } else if self.is_column_listing(text) {
            self.columns.iter().map(|c| Row::new().with("name", c.as_str())).collect()
        } else {
            self.rows.clone()
        };
        Ok(QueryResult::new(rows, None, started))
    }
}

/// Input strategy replaying canned queries; cancels once they run out
#[derive(Default)]
pub struct ScriptedInput {
    queries: VecDeque<String>,
    answers: VecDeque<bool>,
    /// Recent queries offered with each request
    pub seen_recent: Arc<Mutex<Vec<Vec<String>>>>,
}

impl ScriptedInput {
    pub fn new(queries: &[&str]) -> Self {
        ScriptedInput {
            queries: queries.iter().map(|q| q.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Answers for `confirm`, in order; missing answers are "no"
    pub fn answering(mut self, answers: &[bool]) -> Self {
        self.answers = answers.iter().copied().collect();
        self
    }
}

impl QueryInput for ScriptedInput {
    fn read_query(&mut self, ctx: &InputContext<'_>) -> Result<String> {
        self.seen_recent.lock().unwrap().push(ctx.recent.to_vec());
        self.queries.pop_front().ok_or(DbcliError::Cancelled)
    }

    fn confirm(&mut self, _message: &str) -> Result<bool> {
        Ok(self.answers.pop_front().unwrap_or(false))
    }
}

/// Cloneable in-memory output sink
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
