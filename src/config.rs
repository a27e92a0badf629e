use crate::core::{DbcliError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable overriding the configuration directory
pub const HOME_ENV: &str = "DBCLI_HOME";
const CONFIG_FILE: &str = "config.toml";
const HISTORY_FILE: &str = "query_history.json";

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub console: ConsoleConfig,
    pub history: HistoryConfig,
}

/// Which input strategy the console uses to read queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Raw-mode editor with the live suggestion strip
    #[default]
    Editor,
    /// Menu of entry styles, templates and history
    Menu,
    /// Plain line prompt
    Line,
}

/// Console-related configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub input: InputMode,
    pub max_display_rows: usize,
    pub recent_queries: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            input: InputMode::Editor,
            max_display_rows: 50,
            recent_queries: 15,
        }
    }
}

/// History store configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_entries: usize,
    pub file: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            max_entries: 1000,
            file: None,
        }
    }
}

impl Config {
    /// Reads `<config_dir>/config.toml`. A missing file yields defaults; a
    /// malformed one is logged and also yields defaults.
    pub fn load(config_dir: &Path) -> Config {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Config::default();
        }
        match load_config(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}; using defaults", e);
                Config::default()
            }
        }
    }

    /// History file location: the configured override or `<config_dir>/query_history.json`
    pub fn history_file(&self, config_dir: &Path) -> PathBuf {
        self.history
            .file
            .clone()
            .unwrap_or_else(|| config_dir.join(HISTORY_FILE))
    }
}

/// Resolves the configuration directory: `$DBCLI_HOME`, else `~/.dbcli`.
///
/// Falls back to a relative `.dbcli` when no home directory can be found.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".dbcli"))
        .unwrap_or_else(|| PathBuf::from(".dbcli"))
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = dbcli::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| DbcliError::Config(format!("{}: {}", path.display(), e)))?;
    toml::from_str(&content).map_err(|e| DbcliError::Config(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE_CONFIG: &str = r#"
[console]
input = "menu"
max_display_rows = 20

[history]
max_entries = 250
file = "/tmp/dbcli-history.json"
"#;

    #[test]
    fn test_load_config_from_str() {
        let config: Config = toml::from_str(SAMPLE_CONFIG).expect("Failed to parse sample config");
        assert_eq!(config.console.input, InputMode::Menu);
        assert_eq!(config.console.max_display_rows, 20);
        // Keys left out keep their defaults
        assert_eq!(config.console.recent_queries, 15);
        assert_eq!(config.history.max_entries, 250);
        assert_eq!(
            config.history_file(Path::new("/ignored")),
            PathBuf::from("/tmp/dbcli-history.json")
        );
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path());
        assert_eq!(config, Config::default());
        assert_eq!(config.console.max_display_rows, 50);
        assert_eq!(config.history.max_entries, 1000);
        assert_eq!(config.history_file(dir.path()), dir.path().join("query_history.json"));
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[console]\ninput = \"telepathy\"\n").unwrap();

        assert!(matches!(load_config(&path), Err(DbcliError::Config(_))));
        assert_eq!(Config::load(dir.path()), Config::default());
    }
}
