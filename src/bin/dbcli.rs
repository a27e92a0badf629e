use crossterm::style::Stylize;
use dbcli::config::{self, Config};
use dbcli::connections::{ConnectionProfile, ConnectionStore};
use dbcli::core::db::{create_client, test_connection, Dialect, Engine, EngineFamily};
use dbcli::core::{DbcliError, Result};
use dbcli::query_editor::termination::{self, TERMINATED_EXIT_CODE};
use dbcli::query_menu::{Prompter, TerminalPrompter};
use dbcli::repl;
use dbcli::storage::QueryHistory;
use std::env;
use std::process;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `DBCLI_LOG=debug`
const LOG_ENV: &str = "DBCLI_LOG";

const ENGINE_CHOICES: [Engine; 4] = [
    Engine::Relational(Dialect::MySql),
    Engine::Relational(Dialect::Postgres),
    Engine::FileBased,
    Engine::Document,
];

fn print_usage() {
    println!("dbcli - Database CLI with query console, history & syntax highlighting\n");
    println!("Usage: dbcli <command> [args]\n");
    println!("Commands:");
    println!("  connect              Add a new database connection");
    println!("  list                 List all saved database connections");
    println!("  remove <id>          Delete a saved connection");
    println!("  query [id]           Open the query console for a connection");
    println!("  databases <id>       List databases in a connection");
    println!("  history              Show global query history statistics");
    println!("  help                 Show this message");
    println!("\nConfiguration lives in ~/.dbcli (override with ${}).", config::HOME_ENV);
}

fn list(store: &ConnectionStore) -> Result<()> {
    let profiles = store.list();
    if profiles.is_empty() {
        println!("{}", "No database connections found.".yellow());
        println!("Use {} to add a new connection", "dbcli connect".cyan());
        return Ok(());
    }
    println!("{}\n", "Saved Database Connections".cyan().bold());
    println!("{:<15} {:<20} {:<12} {:<30} {}", "ID", "Name", "Type", "Host/File", "Created");
    for profile in &profiles {
        let label = profile
            .engine()
            .map(|e| e.label().to_string())
            .unwrap_or_else(|_| profile.kind.clone());
        println!(
            "{:<15} {:<20} {:<12} {:<30} {}",
            profile.id,
            profile.name,
            label,
            profile.location(),
            profile.created_at.format("%Y-%m-%d")
        );
    }
    Ok(())
}

fn required(prompter: &mut TerminalPrompter, prompt: &str, what: &str) -> Result<String> {
    loop {
        let answer = prompter.line(prompt, None)?;
        let answer = answer.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
        println!("{}", format!("{} is required", what).red());
    }
}

fn with_default(prompter: &mut TerminalPrompter, prompt: &str, default: &str) -> Result<String> {
    let answer = prompter.line(prompt, Some(default))?;
    let answer = answer.trim();
    Ok(if answer.is_empty() { default.to_string() } else { answer.to_string() })
}

fn optional(answer: String) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        None
    } else {
        Some(answer.to_string())
    }
}

async fn connect(store: &ConnectionStore) -> Result<()> {
    println!("{}\n", "Add New Database Connection".yellow());
    let mut prompter = TerminalPrompter::new();

    let name = required(&mut prompter, "Connection name:", "Name")?;
    let labels: Vec<String> = ENGINE_CHOICES.iter().map(|e| e.label().to_string()).collect();
    let engine = ENGINE_CHOICES[prompter.select("Database type:", &labels)?];
    let mut profile = ConnectionProfile::new(name, engine);

    match engine {
        Engine::FileBased => {
            profile.filename = Some(required(&mut prompter, "SQLite file path:", "File path")?);
        }
        Engine::Document => {
            profile.uri = Some(with_default(&mut prompter, "MongoDB URI:", "mongodb://localhost:27017")?);
        }
        Engine::Relational(_) => {
            profile.host = Some(with_default(&mut prompter, "Host:", "localhost")?);
            let default_port = engine.default_port().unwrap_or_default().to_string();
            let port = with_default(&mut prompter, "Port:", &default_port)?;
            profile.port = Some(
                port.parse()
                    .map_err(|_| DbcliError::Config(format!("Invalid port: {}", port)))?,
            );
            profile.username = Some(required(&mut prompter, "Username:", "Username")?);
            profile.password = optional(prompter.line("Password:", None)?);
            profile.database = optional(prompter.line("Database name (optional):", None)?);
            let ssl = prompter.line("Use SSL? [y/N]", None)?;
            profile.ssl = Some(matches!(ssl.trim().to_lowercase().as_str(), "y" | "yes"));
        }
    }

    println!("Testing connection...");
    match test_connection(&profile).await {
        Ok(()) => {
            println!("{}", "Connection successful!".green());
            let id = profile.id.clone();
            let name = profile.name.clone();
            store.save(profile)?;
            println!("{}", format!("\nConnection \"{}\" saved successfully!", name).green());
            println!("Use: {} to start querying", format!("dbcli query {}", id).cyan());
            Ok(())
        }
        Err(e) => {
            println!("{}", "Connection failed!".red());
            Err(e)
        }
    }
}

fn remove(store: &ConnectionStore, id: Option<&str>) -> Result<()> {
    let id = id.ok_or_else(|| DbcliError::Config("Usage: dbcli remove <connection-id>".to_string()))?;
    let profile = store
        .get(id)
        .ok_or_else(|| DbcliError::ConnectionNotFound(id.to_string()))?;
    let mut prompter = TerminalPrompter::new();
    let answer = prompter.line(
        &format!("Delete connection \"{}\"? [y/N]", profile.name),
        None,
    )?;
    if matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") && store.delete(id)? {
        println!("{}", "Connection deleted successfully!".green());
    }
    Ok(())
}

async fn query(
    store: &ConnectionStore,
    history: Arc<QueryHistory>,
    config: &Config,
    id: Option<&str>,
) -> Result<()> {
    let id = match id {
        Some(id) => id.to_string(),
        None => {
            let profiles = store.list();
            if profiles.is_empty() {
                println!("{}", "No connections found. Use \"dbcli connect\" first.".yellow());
                return Ok(());
            }
            let names: Vec<String> = profiles.iter().map(|p| p.name.clone()).collect();
            let index = TerminalPrompter::new().select("Select database connection:", &names)?;
            profiles[index].id.clone()
        }
    };
    repl::run_console(&id, store, history, config).await
}

async fn databases(store: &ConnectionStore, id: Option<&str>) -> Result<()> {
    let id = id.ok_or_else(|| DbcliError::Config("Usage: dbcli databases <connection-id>".to_string()))?;
    let profile = store
        .get(id)
        .ok_or_else(|| DbcliError::ConnectionNotFound(id.to_string()))?;
    println!("{}\n", format!("Databases in {}", profile.name).cyan().bold());

    let engine = profile.engine()?;
    let Some(sql) = engine.database_listing_query() else {
        match engine.family() {
            EngineFamily::Sql => {
                println!("SQLite uses single file database");
                println!("{}", profile.filename.as_deref().unwrap_or("N/A").yellow());
            }
            EngineFamily::Document => {
                println!("{}", "Use MongoDB-specific commands in query console".yellow());
            }
        }
        return Ok(());
    };

    let mut client = create_client(&profile)?;
    let outcome = match client.connect().await {
        Ok(()) => client.query(sql).await,
        Err(e) => Err(e),
    };
    client.disconnect().await?;
    for (i, name) in outcome?.first_column_strings().iter().enumerate() {
        println!("  {}. {}", i + 1, name.as_str().cyan());
    }
    Ok(())
}

fn show_stats(history: &QueryHistory) {
    let stats = history.get_stats(None);
    println!("{}\n", "Global Query Statistics".cyan().bold());
    println!("Total queries:      {}", stats.total_queries);
    println!("Successful:         {}", stats.successful_queries);
    println!("Failed:             {}", stats.failed_queries);
    let rate = if stats.total_queries > 0 {
        stats.successful_queries as f64 * 100.0 / stats.total_queries as f64
    } else {
        0.0
    };
    println!("Success rate:       {:.1}%", rate);
    println!("Average time:       {}ms", stats.average_execution_time);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    termination::listen();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");
    let arg = args.get(2).map(String::as_str);

    let dir = config::config_dir();
    let config = Config::load(&dir);
    let store = ConnectionStore::new(&dir);
    info!("Using configuration directory {:?}", dir);

    let outcome = match command {
        "list" => list(&store),
        "connect" => connect(&store).await,
        "remove" => remove(&store, arg),
        "query" | "databases" | "history" => {
            let history = Arc::new(QueryHistory::open(
                config.history_file(&dir),
                config.history.max_entries,
            ));
            match command {
                "query" => query(&store, history, &config, arg).await,
                "databases" => databases(&store, arg).await,
                _ => {
                    show_stats(&history);
                    Ok(())
                }
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("{}", format!("Unknown command: {}", other).red());
            print_usage();
            process::exit(2);
        }
    };

    if termination::process().is_requested() {
        process::exit(TERMINATED_EXIT_CODE);
    }
    match outcome {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => println!("{}", "Goodbye!".yellow()),
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            process::exit(1);
        }
    }
}
