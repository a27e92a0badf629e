//! End-to-end console sessions against real SQLite files and a stub
//! document-store client

use async_trait::async_trait;
use dbcli::config::{Config, ConsoleConfig};
use dbcli::connections::{ConnectionProfile, ConnectionStore};
use dbcli::core::db::{create_client, DatabaseClient, Engine, QueryResult};
use dbcli::core::{DbcliError, Result};
use dbcli::query_editor::{InputContext, QueryInput};
use dbcli::repl::{run_console, Console};
use dbcli::storage::QueryHistory;
use rusqlite::Connection;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct Script(VecDeque<String>);

impl Script {
    fn new(lines: &[&str]) -> Box<Self> {
        Box::new(Script(lines.iter().map(|l| l.to_string()).collect()))
    }
}

impl QueryInput for Script {
    fn read_query(&mut self, _ctx: &InputContext<'_>) -> Result<String> {
        self.0.pop_front().ok_or(DbcliError::Cancelled)
    }

    fn confirm(&mut self, _message: &str) -> Result<bool> {
        Ok(false)
    }
}

#[derive(Clone, Default)]
struct Output(Arc<Mutex<Vec<u8>>>);

impl Output {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Document-store client that records every query it receives
struct DocumentStub {
    queries: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl DatabaseClient for DocumentStub {
    fn engine(&self) -> Engine {
        Engine::Document
    }

    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn query(&mut self, text: &str) -> Result<QueryResult> {
        self.queries.lock().unwrap().push(text.to_string());
        Err(DbcliError::Query("not expected".to_string()))
    }
}

fn sqlite_profile(path: &std::path::Path) -> ConnectionProfile {
    let mut profile = ConnectionProfile::new("fixtures", Engine::FileBased);
    profile.filename = Some(path.to_string_lossy().into_owned());
    profile
}

#[tokio::test]
async fn test_sqlite_session_end_to_end() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("app.db");
    let conn = Connection::open(&db_path).unwrap();
    conn.execute_batch(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, email TEXT);
         INSERT INTO users (name, email) VALUES ('Alice', NULL), ('Bob', 'bob@example.com');",
    )
    .unwrap();
    drop(conn);

    let profile = sqlite_profile(&db_path);
    let client = create_client(&profile).unwrap();
    let history = Arc::new(QueryHistory::open(dir.path().join("history.json"), 1000));
    let out = Output::default();
    let mut console = Console::new(
        profile.clone(),
        client,
        history.clone(),
        Script::new(&[
            "SELECT id, name, email FROM users ORDER BY id",
            ".tables",
            "SELECT * FROM nope",
            ".exit",
            "SELECT 'never reached'",
        ]),
        Box::new(out.clone()),
        ConsoleConfig::default(),
    );

    console.run().await.unwrap();

    let text = out.text();
    assert!(text.contains("Alice"));
    assert!(text.contains("bob@example.com"));
    assert!(text.contains("NULL"));
    assert!(text.contains("2 row(s) returned"));
    assert!(text.contains("Found 1 tables"));
    assert!(text.contains("no such table"));

    let entries = history.get_history(Some(&profile.id), 10);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].query, "SELECT * FROM nope");
    assert!(!entries[0].success);
    assert!(entries[0].error.is_some());
    assert!(entries[1].success);
}

#[tokio::test]
async fn test_missing_sqlite_file_fails_without_history() {
    let dir = TempDir::new().unwrap();
    let store = ConnectionStore::new(dir.path());
    let profile = sqlite_profile(&dir.path().join("does-not-exist.db"));
    let id = profile.id.clone();
    store.save(profile).unwrap();
    let history = Arc::new(QueryHistory::open(dir.path().join("history.json"), 1000));

    let result = run_console(&id, &store, history.clone(), &Config::default()).await;

    assert!(matches!(result, Err(DbcliError::Connection(_))));
    assert!(history.is_empty());
    assert!(!dir.path().join("does-not-exist.db").exists());
}

#[tokio::test]
async fn test_unknown_connection_id() {
    let dir = TempDir::new().unwrap();
    let store = ConnectionStore::new(dir.path());
    let history = Arc::new(QueryHistory::open(dir.path().join("history.json"), 1000));

    let result = run_console("nope", &store, history, &Config::default()).await;
    assert!(matches!(result, Err(DbcliError::ConnectionNotFound(_))));
}

#[tokio::test]
async fn test_tables_unsupported_for_document_store() {
    let dir = TempDir::new().unwrap();
    let queries = Arc::new(Mutex::new(Vec::new()));
    let client = Box::new(DocumentStub {
        queries: queries.clone(),
    });
    let history = Arc::new(QueryHistory::open(dir.path().join("history.json"), 1000));
    let out = Output::default();
    let mut console = Console::new(
        ConnectionProfile::new("docs", Engine::Document),
        client,
        history.clone(),
        Script::new(&[".tables"]),
        Box::new(out.clone()),
        ConsoleConfig::default(),
    );

    console.run().await.unwrap();

    assert!(out.text().contains("Table listing not supported"));
    assert!(queries.lock().unwrap().is_empty());
    assert!(history.is_empty());
}
