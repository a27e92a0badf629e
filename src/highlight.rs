use crate::core::db::EngineFamily;
use crossterm::style::Stylize;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "ORDER", "BY", "GROUP", "HAVING", "LIMIT", "OFFSET",
    "DISTINCT", "AS", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "ON",
    "UNION", "INTERSECT", "EXCEPT", "ALL", "EXISTS", "IN", "BETWEEN", "LIKE", "ILIKE",
    "INSERT", "INTO", "VALUES", "UPDATE", "SET", "DELETE", "MERGE", "UPSERT",
    "CREATE", "TABLE", "DATABASE", "SCHEMA", "INDEX", "VIEW", "ALTER", "DROP", "TRUNCATE",
    "ADD", "COLUMN", "CONSTRAINT", "PRIMARY", "KEY", "FOREIGN", "REFERENCES",
    "UNIQUE", "CHECK", "DEFAULT", "NOT", "NULL", "AUTO_INCREMENT",
    "GRANT", "REVOKE", "COMMIT", "ROLLBACK", "SAVEPOINT", "BEGIN", "TRANSACTION",
    "INT", "INTEGER", "VARCHAR", "CHAR", "TEXT", "DATE", "DATETIME", "TIMESTAMP",
    "BOOLEAN", "BOOL", "DECIMAL", "NUMERIC", "FLOAT", "DOUBLE", "REAL",
    "BIGINT", "SMALLINT", "TINYINT", "SERIAL", "UUID", "JSON", "JSONB",
    "COUNT", "SUM", "AVG", "MIN", "MAX", "CONCAT", "SUBSTRING", "SUBSTR",
    "UPPER", "LOWER", "TRIM", "LENGTH", "COALESCE", "ISNULL", "NULLIF",
    "CASE", "WHEN", "THEN", "ELSE", "END", "IF", "IFNULL",
    "AND", "OR", "XOR", "IS", "TRUE", "FALSE", "UNKNOWN",
];

static KEYWORD_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| SQL_KEYWORDS.iter().copied().collect());

static SQL_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?P<str>'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*")|(?P<num>\b\d+(?:\.\d+)?\b)|(?P<word>\b[A-Za-z_][A-Za-z0-9_]*\b)"#,
    )
    .unwrap()
});

static MONGO_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?P<str>'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*")|(?P<db>\bdb\.)|(?P<op>\$[A-Za-z]+)|(?P<method>\.[A-Za-z]+\()|(?P<num>\b\d+(?:\.\d+)?\b)"#,
    )
    .unwrap()
});

/// Colors a query for display. The visible text is never altered.
pub fn highlight(text: &str, family: EngineFamily) -> String {
    match family {
        EngineFamily::Sql => highlight_sql(text),
        EngineFamily::Document => highlight_mongo(text),
    }
}

fn highlight_sql(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in SQL_TOKEN_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        let token = whole.as_str();
        if caps.name("str").is_some() {
            out.push_str(&token.green().to_string());
        } else if caps.name("num").is_some() {
            out.push_str(&token.yellow().to_string());
        } else if KEYWORD_SET.contains(token.to_uppercase().as_str()) {
            out.push_str(&token.blue().to_string());
        } else {
            out.push_str(token);
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}

fn highlight_mongo(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in MONGO_TOKEN_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        let token = whole.as_str();
        if caps.name("str").is_some() {
            out.push_str(&token.green().to_string());
        } else if caps.name("db").is_some() {
            out.push_str(&token.cyan().bold().to_string());
        } else if caps.name("op").is_some() {
            out.push_str(&token.magenta().to_string());
        } else if let Some(name) = token.strip_suffix('(') {
            out.push_str(&name.blue().to_string());
            out.push('(');
        } else {
            out.push_str(&token.yellow().to_string());
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}
