use crate::autocomplete::{Completer, SuggestionSource};
use crate::config::{Config, ConsoleConfig, InputMode};
use crate::connections::{ConnectionProfile, ConnectionStore};
use crate::core::db::{create_client, DatabaseClient, Engine};
use crate::core::{DbcliError, Result};
use crate::highlight::highlight;
use crate::query_editor::{EditorInput, InputContext, QueryInput};
use crate::query_menu::{LineInput, MenuInput};
use crate::results_grid::ResultsGrid;
use crate::storage::QueryHistory;
use chrono::{Local, Utc};
use crossterm::style::Stylize;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Entries fetched for `.history`
const HISTORY_FETCH: usize = 20;
/// Entries drawn by `.history`
const HISTORY_SHOWN: usize = 15;
const HISTORY_QUERY_WIDTH: usize = 45;

/// Represents one line of console input.
#[derive(Debug, PartialEq)]
pub enum Command {
    Exit,
    Clear,
    Tables,
    History,
    HistoryClear,
    Help,
    Query(String),
    Unknown(String),
}

/// Parses a console input line into a `Command`.
///
/// Input starting with a dot is a meta-command; anything else is a query
/// for the engine.
pub fn parse_command(input: &str) -> Command {
    let input = input.trim();
    if !input.starts_with('.') {
        return Command::Query(input.to_string());
    }
    let parts: Vec<&str> = input.split_whitespace().collect();
    match parts.as_slice() {
        [".exit"] => Command::Exit,
        [".clear"] => Command::Clear,
        [".tables"] => Command::Tables,
        [".history"] => Command::History,
        [".history", "clear"] => Command::HistoryClear,
        [".help"] => Command::Help,
        _ => Command::Unknown(input.to_string()),
    }
}

/// Outcome of a table listing
#[derive(Debug, PartialEq)]
pub enum TableListing {
    /// The engine has no table listing through the query interface
    Unsupported,
    Tables(Vec<String>),
}

/// Lists the tables of the connected database.
///
/// # Errors
///
/// `DbcliError::Query` when the introspection query fails.
pub async fn list_tables(client: &mut dyn DatabaseClient) -> Result<TableListing> {
    let Some(sql) = client.engine().table_listing_query() else {
        return Ok(TableListing::Unsupported);
    };
    let result = client.query(sql).await?;
    Ok(TableListing::Tables(result.first_column_strings()))
}

/// Builds the input strategy selected in the configuration
pub fn input_for(config: &ConsoleConfig) -> Box<dyn QueryInput> {
    match config.input {
        InputMode::Editor => Box::new(EditorInput::new()),
        InputMode::Menu => Box::new(MenuInput::new()),
        InputMode::Line => Box::new(LineInput::new(config.recent_queries.max(1) * 10)),
    }
}

/// One interactive session against a single connection profile
pub struct Console {
    profile: ConnectionProfile,
    engine: Engine,
    client: Box<dyn DatabaseClient>,
    history: Arc<QueryHistory>,
    input: Box<dyn QueryInput>,
    out: Box<dyn Write>,
    completer: Option<Completer>,
    config: ConsoleConfig,
}

impl Console {
    pub fn new(
        profile: ConnectionProfile,
        client: Box<dyn DatabaseClient>,
        history: Arc<QueryHistory>,
        input: Box<dyn QueryInput>,
        out: Box<dyn Write>,
        config: ConsoleConfig,
    ) -> Self {
        let engine = client.engine();
        Console {
            profile,
            engine,
            client,
            history,
            input,
            out,
            completer: None,
            config,
        }
    }

    /// Runs the session until `.exit`, cancellation or a fatal error.
    ///
    /// Disconnect is attempted on every path out, including a failed connect.
    ///
    /// # Errors
    ///
    /// `DbcliError::Connection` when the connect handshake fails. Query
    /// failures are reported and recorded, never returned.
    pub async fn run(&mut self) -> Result<()> {
        self.banner(true)?;
        let outcome = self.session().await;
        if let Err(e) = self.client.disconnect().await {
            warn!("Disconnect from {} failed: {}", self.profile.name, e);
        }
        writeln!(self.out, "{}", "Disconnected from database".dim())?;
        outcome
    }

    async fn session(&mut self) -> Result<()> {
        if let Err(e) = self.client.connect().await {
            writeln!(self.out, "{}", format!("Connection failed: {}", e).red())?;
            return Err(e);
        }
        info!("Console connected to {} ({})", self.profile.name, self.engine);
        writeln!(self.out, "{}\n", "Connected successfully!".green())?;

        let mut completer = Completer::new(self.engine);
        completer.load_table_names(self.client.as_mut()).await;
        self.completer = Some(completer);

        let prompt = format!("{}>", self.engine.type_name());
        loop {
            let recent = self
                .history
                .get_recent_queries(Some(&self.profile.id), self.config.recent_queries);
            let read = {
                let ctx = InputContext {
                    prompt: &prompt,
                    engine: self.engine,
                    completer: self.completer.as_ref().map(|c| c as &dyn SuggestionSource),
                    recent: &recent,
                };
                self.input.read_query(&ctx)
            };
            let line = match read {
                Ok(line) => line,
                Err(e) if e.is_cancelled() => {
                    writeln!(self.out, "{}", "Goodbye!".yellow())?;
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            if line.trim().is_empty() {
                continue;
            }

            match parse_command(&line) {
                Command::Exit => {
                    writeln!(self.out, "{}", "Goodbye!".yellow())?;
                    return Ok(());
                }
                Command::Clear => {
                    crossterm::queue!(
                        self.out,
                        crossterm::terminal::Clear(crossterm::terminal::ClearType::All),
                        crossterm::cursor::MoveTo(0, 0)
                    )?;
                    self.banner(false)?;
                }
                Command::Tables => self.show_tables().await?,
                Command::History => self.show_history()?,
                Command::HistoryClear => self.clear_history()?,
                Command::Help => self.help()?,
                Command::Unknown(text) => writeln!(
                    self.out,
                    "{}",
                    format!("Unknown command: {}. Type .help for the list of commands.", text).red()
                )?,
                Command::Query(query) => self.execute(&query).await?,
            }
        }
    }

    fn banner(&mut self, full: bool) -> io::Result<()> {
        writeln!(self.out, "{}", format!("Query Console - {}", self.profile.name).cyan().bold())?;
        writeln!(self.out, "{}", format!("Database Type: {}", self.profile.kind).dim())?;
        if full {
            writeln!(self.out, "{}", format!("Connected: {}", Local::now().format("%Y-%m-%d %H:%M:%S")).dim())?;
            writeln!(self.out, "{}", "Commands: .exit | .tables | .history | .clear | .help".dim())?;
        }
        writeln!(self.out)
    }

    fn help(&mut self) -> io::Result<()> {
        writeln!(self.out, "Available commands:")?;
        writeln!(self.out, "  .exit          - Leave the console")?;
        writeln!(self.out, "  .clear         - Clear the screen")?;
        writeln!(self.out, "  .tables        - List tables in the database")?;
        writeln!(self.out, "  .history       - Show recent queries for this connection")?;
        writeln!(self.out, "  .history clear - Clear the history of this connection")?;
        writeln!(self.out, "  .help          - Show this list")?;
        writeln!(self.out, "\nAnything else is sent to the database as a query.\n")
    }

    async fn show_tables(&mut self) -> Result<()> {
        match list_tables(self.client.as_mut()).await {
            Ok(TableListing::Unsupported) => {
                writeln!(self.out, "{}", "Table listing not supported for this database type".yellow())?;
            }
            Ok(TableListing::Tables(tables)) if tables.is_empty() => {
                writeln!(self.out, "{}", "No tables found in this database\n".yellow())?;
            }
            Ok(TableListing::Tables(tables)) => {
                writeln!(self.out, "{}", format!("Found {} tables", tables.len()).green())?;
                for (i, table) in tables.iter().enumerate() {
                    writeln!(self.out, "  {:>2}. {}", i + 1, table.as_str().cyan())?;
                }
                writeln!(self.out)?;
            }
            Err(e) => {
                writeln!(self.out, "{}", format!("Failed to fetch tables: {}\n", e).red())?;
            }
        }
        Ok(())
    }

    fn show_history(&mut self) -> io::Result<()> {
        let entries = self.history.get_history(Some(&self.profile.id), HISTORY_FETCH);
        if entries.is_empty() {
            return writeln!(self.out, "{}", "No query history found\n".yellow());
        }
        writeln!(self.out, "{}", format!("Query History - {}", self.profile.name).cyan().bold())?;
        writeln!(self.out, "{}", format!("Total queries: {}\n", entries.len()).dim())?;

        for (i, entry) in entries.iter().take(HISTORY_SHOWN).enumerate() {
            let time = entry.executed_at.with_timezone(&Local).format("%H:%M:%S");
            let single = entry.query.split_whitespace().collect::<Vec<_>>().join(" ");
            let query = if single.chars().count() > HISTORY_QUERY_WIDTH {
                format!("{}...", single.chars().take(HISTORY_QUERY_WIDTH - 3).collect::<String>())
            } else {
                single
            };
            let status = if entry.success { "✓".green() } else { "✗".red() };
            let duration = entry
                .execution_time
                .map(|ms| format!("{}ms", ms))
                .unwrap_or_else(|| "N/A".to_string());
            writeln!(self.out, "{:>3}  {}  {}  {:<45}  {}", i + 1, time, status, query, duration)?;
        }

        let stats = self.history.get_stats(Some(&self.profile.id));
        if stats.total_queries > 0 {
            writeln!(self.out, "\n{}", "Statistics:".blue())?;
            writeln!(
                self.out,
                "Total: {} | Success: {} | Failed: {}",
                stats.total_queries, stats.successful_queries, stats.failed_queries
            )?;
            if stats.average_execution_time > 0 {
                writeln!(self.out, "Average execution time: {}ms", stats.average_execution_time)?;
            }
        }
        writeln!(self.out)
    }

    fn clear_history(&mut self) -> Result<()> {
        let question = format!("Clear all query history for {}?", self.profile.name);
        let confirmed = match self.input.confirm(&question) {
            Ok(answer) => answer,
            Err(e) if e.is_cancelled() => false,
            Err(e) => return Err(e),
        };
        if confirmed {
            self.history.clear_history(Some(&self.profile.id));
            writeln!(self.out, "{}", "Query history cleared\n".green())?;
        }
        Ok(())
    }

    async fn execute(&mut self, query: &str) -> Result<()> {
        let rule = "─".repeat(50);
        writeln!(self.out, "\n{}", "Executing Query:".dim())?;
        writeln!(self.out, "{}", rule.as_str().dim())?;
        writeln!(self.out, "{}", highlight(query, self.engine.family()))?;
        writeln!(self.out, "{}", rule.as_str().dim())?;

        let started = Instant::now();
        let outcome = self.client.query(query).await;
        let elapsed = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                self.history.add_query(
                    query,
                    &self.profile.id,
                    &self.profile.name,
                    true,
                    Some(elapsed),
                    None,
                );
                writeln!(self.out, "{}", format!("Query executed successfully in {}ms", elapsed).green())?;
                if result.rows.is_empty() {
                    writeln!(self.out, "{}", "Query executed successfully (no results returned)\n".yellow())?;
                } else {
                    let grid = ResultsGrid::from_result(&result, self.config.max_display_rows);
                    write!(self.out, "\n{}", grid.render())?;
                    writeln!(self.out, "{}", format!("\nResult: {} row(s) returned\n", result.row_count).blue())?;
                }
            }
            Err(e) => {
                debug!("Query failed after {}ms: {}", elapsed, e);
                writeln!(self.out, "{}", format!("Query failed after {}ms", elapsed).red())?;
                writeln!(self.out, "{}", format!("Error: {}\n", e).red())?;
                self.history.add_query(
                    query,
                    &self.profile.id,
                    &self.profile.name,
                    false,
                    Some(elapsed),
                    Some(e.to_string()),
                );
            }
        }
        Ok(())
    }
}

/// Resolves a stored profile and runs a console on stdout with the
/// configured input strategy.
///
/// # Errors
///
/// `ConnectionNotFound` for an unknown id, `UnsupportedEngine` for a
/// profile type this build does not know, `Connection` when connecting fails.
pub async fn run_console(
    connection_id: &str,
    store: &ConnectionStore,
    history: Arc<QueryHistory>,
    config: &Config,
) -> Result<()> {
    let profile = store
        .get(connection_id)
        .ok_or_else(|| DbcliError::ConnectionNotFound(connection_id.to_string()))?;
    let client = create_client(&profile)?;
    debug!("Starting console for {} at {}", profile.id, Utc::now());
    let input = input_for(&config.console);
    let mut console = Console::new(
        profile,
        client,
        history,
        input,
        Box::new(io::stdout()),
        config.console.clone(),
    );
    console.run().await
}
