/// Engine Module
///
/// The closed set of supported database engines and every per-engine lookup
/// the console needs (introspection queries, templates, display labels).
/// All lookups are exhaustive matches so a new engine cannot be forgotten.

use crate::core::{DbcliError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// SQL dialect of a server-based relational engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
}

/// Kind of backing database, decides adapter and query language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Relational(Dialect),
    FileBased,
    Document,
}

/// Query language family, used by highlighting and autocomplete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFamily {
    Sql,
    Document,
}

/// A named statement skeleton offered by the template picker
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTemplate {
    pub name: &'static str,
    pub query: &'static str,
}

/// Column listing query plus the result field that carries the column name
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnQuery {
    pub sql: String,
    pub name_field: &'static str,
}

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*)?$").unwrap());

const SQL_TEMPLATES: &[QueryTemplate] = &[
    QueryTemplate { name: "Select all from table", query: "SELECT * FROM table_name LIMIT 10;" },
    QueryTemplate { name: "Count records", query: "SELECT COUNT(*) FROM table_name;" },
    QueryTemplate { name: "Find by condition", query: "SELECT * FROM table_name WHERE column_name = 'value';" },
    QueryTemplate { name: "Group and count", query: "SELECT column_name, COUNT(*) FROM table_name GROUP BY column_name;" },
    QueryTemplate { name: "Inner join tables", query: "SELECT * FROM table1 t1 INNER JOIN table2 t2 ON t1.id = t2.table1_id;" },
    QueryTemplate { name: "Insert record", query: "INSERT INTO table_name (column1, column2) VALUES ('value1', 'value2');" },
    QueryTemplate { name: "Update records", query: "UPDATE table_name SET column_name = 'new_value' WHERE condition;" },
    QueryTemplate { name: "Delete records", query: "DELETE FROM table_name WHERE condition;" },
    QueryTemplate { name: "Create table", query: "CREATE TABLE table_name (\n  id INT PRIMARY KEY,\n  name VARCHAR(255) NOT NULL\n);" },
];

const DOCUMENT_TEMPLATES: &[QueryTemplate] = &[
    QueryTemplate { name: "Find all documents", query: "db.collection.find().limit(10)" },
    QueryTemplate { name: "Count documents", query: "db.collection.countDocuments()" },
    QueryTemplate { name: "Find by condition", query: "db.collection.find({ \"field\": \"value\" })" },
    QueryTemplate { name: "Aggregate data", query: "db.collection.aggregate([\n  { $group: { _id: \"$field\", count: { $sum: 1 } } }\n])" },
    QueryTemplate { name: "Insert document", query: "db.collection.insertOne({ \"field1\": \"value1\", \"field2\": \"value2\" })" },
    QueryTemplate { name: "Update document", query: "db.collection.updateOne({ \"field\": \"value\" }, { $set: { \"field\": \"newValue\" } })" },
    QueryTemplate { name: "Delete document", query: "db.collection.deleteOne({ \"field\": \"value\" })" },
    QueryTemplate { name: "Lookup (join)", query: "db.collection.aggregate([\n  {\n    $lookup: {\n      from: \"other_collection\",\n      localField: \"_id\",\n      foreignField: \"ref_id\",\n      as: \"joined_data\"\n    }\n  }\n])" },
];

impl Engine {
    /// Maps a stored profile type onto an engine.
    ///
    /// # Errors
    ///
    /// Returns `DbcliError::UnsupportedEngine` for any unknown type string.
    pub fn from_type(kind: &str) -> Result<Self> {
        match kind {
            "mysql" => Ok(Engine::Relational(Dialect::MySql)),
            "postgresql" => Ok(Engine::Relational(Dialect::Postgres)),
            "sqlite" => Ok(Engine::FileBased),
            "mongodb" => Ok(Engine::Document),
            other => Err(DbcliError::UnsupportedEngine(other.to_string())),
        }
    }

    /// The profile type string for this engine
    pub fn type_name(&self) -> &'static str {
        match self {
            Engine::Relational(Dialect::MySql) => "mysql",
            Engine::Relational(Dialect::Postgres) => "postgresql",
            Engine::FileBased => "sqlite",
            Engine::Document => "mongodb",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Engine::Relational(Dialect::MySql) => "MySQL",
            Engine::Relational(Dialect::Postgres) => "PostgreSQL",
            Engine::FileBased => "SQLite",
            Engine::Document => "MongoDB",
        }
    }

    pub fn family(&self) -> EngineFamily {
        match self {
            Engine::Relational(_) | Engine::FileBased => EngineFamily::Sql,
            Engine::Document => EngineFamily::Document,
        }
    }

    /// Introspection query listing tables, `None` when the engine has no
    /// table listing through the query interface.
    pub fn table_listing_query(&self) -> Option<&'static str> {
        match self {
            Engine::Relational(Dialect::MySql) => Some("SHOW TABLES"),
            Engine::Relational(Dialect::Postgres) => {
                Some("SELECT tablename FROM pg_tables WHERE schemaname = 'public'")
            }
            Engine::FileBased => Some("SELECT name FROM sqlite_master WHERE type='table'"),
            Engine::Document => None,
        }
    }

    /// Introspection query listing the columns of `table`.
    ///
    /// Returns `None` for engines without column metadata and for table
    /// names that are not plain identifiers; nothing user-typed is ever
    /// spliced into SQL unchecked.
    pub fn column_listing_query(&self, table: &str) -> Option<ColumnQuery> {
        if !IDENTIFIER_RE.is_match(table) {
            return None;
        }
        match self {
            Engine::Relational(Dialect::MySql) => Some(ColumnQuery {
                sql: format!("DESCRIBE {}", table),
                name_field: "Field",
            }),
            Engine::Relational(Dialect::Postgres) => Some(ColumnQuery {
                sql: format!(
                    "SELECT column_name FROM information_schema.columns WHERE table_name = '{}'",
                    table
                ),
                name_field: "column_name",
            }),
            Engine::FileBased => Some(ColumnQuery {
                sql: format!("PRAGMA table_info({})", table),
                name_field: "name",
            }),
            Engine::Document => None,
        }
    }

    /// Query listing the databases on the server, `None` where the notion
    /// does not apply through the query interface.
    pub fn database_listing_query(&self) -> Option<&'static str> {
        match self {
            Engine::Relational(Dialect::MySql) => Some("SHOW DATABASES"),
            Engine::Relational(Dialect::Postgres) => {
                Some("SELECT datname FROM pg_database WHERE datistemplate = false")
            }
            Engine::FileBased | Engine::Document => None,
        }
    }

    pub fn query_templates(&self) -> &'static [QueryTemplate] {
        match self.family() {
            EngineFamily::Sql => SQL_TEMPLATES,
            EngineFamily::Document => DOCUMENT_TEMPLATES,
        }
    }

    /// Default server port for the engine, if it has one
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Engine::Relational(Dialect::MySql) => Some(3306),
            Engine::Relational(Dialect::Postgres) => Some(5432),
            Engine::FileBased | Engine::Document => None,
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_type_round_trips_type_name() {
        for kind in ["mysql", "postgresql", "sqlite", "mongodb"] {
            let engine = Engine::from_type(kind).unwrap();
            assert_eq!(engine.type_name(), kind);
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        match Engine::from_type("oracle") {
            Err(DbcliError::UnsupportedEngine(name)) => assert_eq!(name, "oracle"),
            other => panic!("Expected UnsupportedEngine, got {:?}", other),
        }
    }

    #[test]
    fn test_document_engine_has_no_table_listing() {
        assert!(Engine::Document.table_listing_query().is_none());
        assert!(Engine::FileBased.table_listing_query().is_some());
    }

    #[test]
    fn test_column_query_rejects_non_identifiers() {
        assert!(Engine::FileBased.column_listing_query("users; DROP TABLE x").is_none());
        assert!(Engine::FileBased.column_listing_query("").is_none());

        let query = Engine::Relational(Dialect::Postgres)
            .column_listing_query("orders")
            .unwrap();
        assert!(query.sql.contains("table_name = 'orders'"));
        assert_eq!(query.name_field, "column_name");
    }

    #[test]
    fn test_templates_follow_family() {
        assert!(Engine::Document.query_templates()[0].query.starts_with("db."));
        assert!(Engine::FileBased.query_templates()[0].query.starts_with("SELECT"));
    }
}
