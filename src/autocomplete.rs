use crate::core::db::{DatabaseClient, Dialect, Engine, EngineFamily};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Keywords offered for every engine
const COMMON_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "ORDER BY", "GROUP BY", "HAVING", "LIMIT",
    "INSERT INTO", "VALUES", "UPDATE", "SET", "DELETE FROM",
    "CREATE TABLE", "ALTER TABLE", "DROP TABLE", "CREATE INDEX",
    "INNER JOIN", "LEFT JOIN", "RIGHT JOIN", "FULL JOIN", "ON",
    "UNION", "UNION ALL", "DISTINCT", "AS", "AND", "OR", "NOT",
    "IN", "LIKE", "BETWEEN", "IS NULL", "IS NOT NULL",
    "EXISTS", "CASE", "WHEN", "THEN", "ELSE", "END",
];

/// SQL functions, not loaded for document sessions
const SQL_FUNCTIONS: &[&str] = &[
    "COUNT(*)", "COUNT()", "SUM()", "AVG()", "MIN()", "MAX()",
    "CONCAT()", "SUBSTRING()", "UPPER()", "LOWER()", "TRIM()",
    "NOW()", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP",
    "LENGTH()", "COALESCE()", "NULLIF()", "ISNULL()",
];

/// Shell methods and query operators for document sessions
const DOCUMENT_KEYWORDS: &[&str] = &[
    "db.", ".find()", ".findOne()", ".insertOne()", ".insertMany()",
    ".updateOne()", ".updateMany()", ".deleteOne()", ".deleteMany()",
    ".aggregate()", ".count()", ".distinct()", ".createIndex()",
    "$match", "$group", "$sort", "$limit", "$skip", "$project",
    "$unwind", "$lookup", "$addFields", "$replaceRoot",
    "$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin",
    "$and", "$or", "$not", "$nor", "$exists", "$type", "$regex",
];

const MYSQL_KEYWORDS: &[&str] = &[
    "AUTO_INCREMENT", "UNSIGNED", "ZEROFILL", "BINARY",
    "SHOW TABLES", "SHOW DATABASES", "DESCRIBE", "EXPLAIN",
];

const POSTGRES_KEYWORDS: &[&str] = &[
    "SERIAL", "BIGSERIAL", "RETURNING", "ILIKE", "SIMILAR TO",
    "ARRAY", "JSONB", "UUID", "GENERATE_SERIES",
];

const SQLITE_KEYWORDS: &[&str] = &[
    "AUTOINCREMENT", "WITHOUT ROWID", "PRAGMA",
    "ATTACH DATABASE", "DETACH DATABASE",
];

const SQL_QUICK: &[&str] = &[
    "SELECT * FROM",
    "SELECT COUNT(*) FROM",
    "INSERT INTO",
    "UPDATE",
    "DELETE FROM",
    "CREATE TABLE",
    "ALTER TABLE",
    "DROP TABLE",
];

const DOCUMENT_QUICK: &[&str] = &[
    "db.collection.find()",
    "db.collection.findOne()",
    "db.collection.insertOne()",
    "db.collection.updateOne()",
    "db.collection.deleteOne()",
    "db.collection.aggregate()",
    "db.collection.count()",
    "db.collection.distinct()",
];

/// Keywords after which the next token is a table name
const TABLE_CONTEXT: &[&str] = &["from", "join", "update", "into"];

const MAX_SUGGESTIONS: usize = 10;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Anything that can rank completions for partial input
pub trait SuggestionSource {
    /// Ranked suggestions for non-empty input
    fn suggestions(&self, input: &str) -> Vec<String>;

    /// Statement skeletons offered when nothing has been typed
    fn quick_suggestions(&self) -> Vec<String>;
}

/// Per-session completion corpus: static keywords and functions for the
/// engine plus table and column names fetched from the live connection
pub struct Completer {
    engine: Engine,
    keywords: Vec<String>,
    functions: Vec<String>,
    tables: Vec<String>,
    columns: HashMap<String, Vec<String>>,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Completer {
    /// Creates a completer with the static corpus for `engine`
    pub fn new(engine: Engine) -> Self {
        let mut keywords = owned(COMMON_KEYWORDS);
        let mut functions = Vec::new();
        match engine.family() {
            EngineFamily::Document => keywords.extend(owned(DOCUMENT_KEYWORDS)),
            EngineFamily::Sql => functions = owned(SQL_FUNCTIONS),
        }
        keywords.extend(owned(match engine {
            Engine::Relational(Dialect::MySql) => MYSQL_KEYWORDS,
            Engine::Relational(Dialect::Postgres) => POSTGRES_KEYWORDS,
            Engine::FileBased => SQLITE_KEYWORDS,
            Engine::Document => &[],
        }));

        Completer {
            engine,
            keywords,
            functions,
            tables: Vec::new(),
            columns: HashMap::new(),
        }
    }

    /// Creates a completer over an explicit corpus
    pub fn with_corpus(
        engine: Engine,
        keywords: Vec<String>,
        functions: Vec<String>,
        tables: Vec<String>,
    ) -> Self {
        Completer {
            engine,
            keywords,
            functions,
            tables,
            columns: HashMap::new(),
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// Fetches table names from the live connection.
    ///
    /// Failures are logged and leave the table list empty.
    pub async fn load_table_names(&mut self, client: &mut dyn DatabaseClient) {
        let Some(sql) = self.engine.table_listing_query() else {
            return;
        };
        match client.query(sql).await {
            Ok(result) => {
                self.tables = result.first_column_strings();
                debug!("Loaded {} table names for autocomplete", self.tables.len());
            }
            Err(e) => warn!("Failed to load table names for autocomplete: {}", e),
        }
    }

    /// Column names of `table`, fetched once per session and then cached.
    ///
    /// Returns an empty list for engines without column metadata, for
    /// names that are not plain identifiers and on failure.
    pub async fn load_column_names(
        &mut self,
        client: &mut dyn DatabaseClient,
        table: &str,
    ) -> Vec<String> {
        if let Some(cached) = self.columns.get(table) {
            return cached.clone();
        }
        let Some(listing) = self.engine.column_listing_query(table) else {
            return Vec::new();
        };
        match client.query(&listing.sql).await {
            Ok(result) => {
                let names: Vec<String> = result
                    .rows
                    .iter()
                    .filter_map(|row| row.get(listing.name_field).or_else(|| row.first_value()))
                    .filter(|v| !v.is_null())
                    .map(|v| v.to_string())
                    .collect();
                self.columns.insert(table.to_string(), names.clone());
                names
            }
            Err(e) => {
                warn!("Failed to load columns for table {}: {}", table, e);
                Vec::new()
            }
        }
    }

    /// Ranks suggestions for `input`.
    ///
    /// Substring matches over keywords, functions and tables, plus table
    /// names after `FROM`/`JOIN`/`UPDATE`/`INTO`, `WHERE` after a table
    /// name and a few clause patterns. Prefix matches sort before
    /// containment matches, then shorter before longer. At most ten.
    pub fn get_suggestions(&self, input: &str) -> Vec<String> {
        let input_lower = input.to_lowercase();
        let mut suggestions: Vec<String> = Vec::new();

        for candidate in self.keywords.iter().chain(&self.functions).chain(&self.tables) {
            if candidate.to_lowercase().contains(&input_lower) {
                suggestions.push(candidate.clone());
            }
        }

        let words: Vec<&str> = WHITESPACE_RE.split(input).collect();
        let last_word = words.last().map(|w| w.to_lowercase()).unwrap_or_default();
        let second_last = if words.len() >= 2 {
            words[words.len() - 2].to_lowercase()
        } else {
            String::new()
        };

        if TABLE_CONTEXT.contains(&second_last.as_str()) {
            for table in &self.tables {
                if table.to_lowercase().starts_with(&last_word) {
                    suggestions.push(table.clone());
                }
            }
        }

        if last_word.is_empty() && self.tables.iter().any(|t| t.to_lowercase() == second_last) {
            suggestions.push("WHERE".to_string());
        }

        if input_lower.contains("select") && !input_lower.contains("from") {
            suggestions.push("* FROM".to_string());
            suggestions.push("COUNT(*) FROM".to_string());
        }
        if input_lower.contains("where") && !input_lower.contains("order") {
            suggestions.push("ORDER BY".to_string());
            suggestions.push("GROUP BY".to_string());
            suggestions.push("LIMIT".to_string());
        }

        let mut unique: Vec<String> = Vec::with_capacity(suggestions.len());
        for s in suggestions {
            if !unique.contains(&s) {
                unique.push(s);
            }
        }
        unique.sort_by_key(|s| (!s.to_lowercase().starts_with(&input_lower), s.chars().count()));
        unique.truncate(MAX_SUGGESTIONS);
        unique
    }

    /// Fixed statement skeletons for the empty-input case
    pub fn get_quick_suggestions(&self) -> Vec<String> {
        match self.engine.family() {
            EngineFamily::Sql => owned(SQL_QUICK),
            EngineFamily::Document => owned(DOCUMENT_QUICK),
        }
    }
}

impl SuggestionSource for Completer {
    fn suggestions(&self, input: &str) -> Vec<String> {
        self.get_suggestions(input)
    }

    fn quick_suggestions(&self) -> Vec<String> {
        self.get_quick_suggestions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeClient;

    fn corpus(keywords: &[&str], tables: &[&str]) -> Completer {
        Completer::with_corpus(Engine::FileBased, owned(keywords), Vec::new(), owned(tables))
    }

    #[test]
    fn test_substring_match_is_case_insensitive() {
        let completer = corpus(&["SELECT", "SET"], &[]);
        let suggestions = completer.get_suggestions("se");
        assert_eq!(suggestions, vec!["SET", "SELECT"]);
    }

    #[test]
    fn test_prefix_matches_sort_first() {
        let completer = corpus(&["UNSELECTED", "SELECT", "PRESELECT"], &[]);
        let suggestions = completer.get_suggestions("sel");
        assert_eq!(suggestions[0], "SELECT");
        assert_eq!(suggestions, vec!["SELECT", "PRESELECT", "UNSELECTED"]);
    }

    #[test]
    fn test_table_names_after_from() {
        let completer = corpus(&["FROM"], &["users", "user_roles", "orders"]);
        let suggestions = completer.get_suggestions("SELECT * FROM us");
        assert!(suggestions.contains(&"users".to_string()));
        assert!(suggestions.contains(&"user_roles".to_string()));
        assert!(!suggestions.contains(&"orders".to_string()));
    }

    #[test]
    fn test_where_after_table_name() {
        let completer = corpus(&[], &["Users"]);
        let suggestions = completer.get_suggestions("SELECT * FROM users ");
        assert!(suggestions.contains(&"WHERE".to_string()));

        let suggestions = completer.get_suggestions("SELECT * FROM users");
        assert!(!suggestions.contains(&"WHERE".to_string()));
    }

    #[test]
    fn test_clause_patterns() {
        let completer = corpus(&[], &[]);
        let suggestions = completer.get_suggestions("select id ");
        assert_eq!(suggestions, vec!["* FROM", "COUNT(*) FROM"]);

        let suggestions = completer.get_suggestions("select id from t where ");
        assert_eq!(suggestions, vec!["LIMIT", "ORDER BY", "GROUP BY"]);
    }

    #[test]
    fn test_results_are_deduplicated_and_capped() {
        let completer = Completer::new(Engine::Relational(Dialect::Postgres));
        let suggestions = completer.get_suggestions("e");
        assert_eq!(suggestions.len(), MAX_SUGGESTIONS);
        let mut unique = suggestions.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), suggestions.len());
    }

    #[test]
    fn test_engine_specific_corpus() {
        let sqlite = Completer::new(Engine::FileBased);
        assert!(sqlite.get_suggestions("pragm").contains(&"PRAGMA".to_string()));
        assert!(sqlite.get_suggestions("coales").contains(&"COALESCE()".to_string()));

        let mongo = Completer::new(Engine::Document);
        assert!(mongo.get_suggestions("$loo").contains(&"$lookup".to_string()));
        assert!(mongo.get_suggestions("coales").is_empty());
        assert!(mongo.get_quick_suggestions()[0].starts_with("db.collection"));
        assert_eq!(sqlite.get_quick_suggestions()[0], "SELECT * FROM");
    }

    #[tokio::test]
    async fn test_load_table_names_from_client() {
        let mut client = FakeClient::new(Engine::FileBased).with_tables(&["users", "orders"]);
        let mut completer = Completer::new(Engine::FileBased);
        completer.load_table_names(&mut client).await;
        assert_eq!(completer.tables(), &["users".to_string(), "orders".to_string()]);
        assert!(completer.get_suggestions("ord").contains(&"orders".to_string()));
    }

    #[tokio::test]
    async fn test_load_table_names_failure_leaves_cache_empty() {
        let mut client = FakeClient::new(Engine::FileBased).failing();
        let mut completer = Completer::new(Engine::FileBased);
        completer.load_table_names(&mut client).await;
        assert!(completer.tables().is_empty());
    }

    #[tokio::test]
    async fn test_load_column_names_is_cached() {
        let mut client = FakeClient::new(Engine::FileBased).with_columns(&["id", "email"]);
        let mut completer = Completer::new(Engine::FileBased);

        let columns = completer.load_column_names(&mut client, "users").await;
        assert_eq!(columns, vec!["id", "email"]);
        let queries_after_first = client.executed().len();

        let again = completer.load_column_names(&mut client, "users").await;
        assert_eq!(again, columns);
        assert_eq!(client.executed().len(), queries_after_first);

        assert!(completer.load_column_names(&mut client, "bad name;").await.is_empty());
        assert_eq!(client.executed().len(), queries_after_first);
    }
}
