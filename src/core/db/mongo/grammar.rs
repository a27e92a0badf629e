//! Shell-style command grammar for the document adapter
//!
//! Accepts exactly this shape and nothing else:
//!
//! ```text
//! command    := "db" "." ( "getCollectionNames" "(" ")"
//!                        | collection "." method "(" args? ")" modifier* ) ";"?
//! collection := ident ( "." ident )* | "getCollection" "(" string ")"
//! modifier   := "." ( "limit" | "skip" | "sort" | "toArray" | "pretty" ) "(" args? ")"
//! literal    := object | array | string | number | true | false | null
//!             | "ObjectId" "(" string ")" | "ISODate" "(" string ")"
//! ```
//!
//! Object keys may be bare identifiers (`$match`, `name`) or quoted strings.

use crate::core::{DbcliError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{self, Bson, Document};

/// A JSON-like literal argument
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Literal>),
    Object(Vec<(String, Literal)>),
    ObjectId(ObjectId),
    Date(DateTime<Utc>),
}

impl Literal {
    pub fn to_bson(&self) -> Bson {
        match self {
            Literal::Null => Bson::Null,
            Literal::Bool(b) => Bson::Boolean(*b),
            Literal::Int(i) => match i32::try_from(*i) {
                Ok(small) => Bson::Int32(small),
                Err(_) => Bson::Int64(*i),
            },
            Literal::Float(f) => Bson::Double(*f),
            Literal::Str(s) => Bson::String(s.clone()),
            Literal::Array(items) => Bson::Array(items.iter().map(Literal::to_bson).collect()),
            Literal::Object(fields) => Bson::Document(fields_to_document(fields)),
            Literal::ObjectId(oid) => Bson::ObjectId(*oid),
            Literal::Date(dt) => Bson::DateTime(bson::DateTime::from_millis(dt.timestamp_millis())),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Bool(_) => "boolean",
            Literal::Int(_) | Literal::Float(_) => "number",
            Literal::Str(_) => "string",
            Literal::Array(_) => "array",
            Literal::Object(_) => "object",
            Literal::ObjectId(_) => "ObjectId",
            Literal::Date(_) => "ISODate",
        }
    }
}

fn fields_to_document(fields: &[(String, Literal)]) -> Document {
    let mut doc = Document::new();
    for (key, value) in fields {
        doc.insert(key.clone(), value.to_bson());
    }
    doc
}

/// The operation requested on a collection
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Find {
        filter: Document,
        projection: Option<Document>,
        sort: Option<Document>,
        limit: Option<i64>,
        skip: Option<u64>,
    },
    FindOne {
        filter: Document,
        projection: Option<Document>,
    },
    InsertOne(Document),
    InsertMany(Vec<Document>),
    UpdateOne {
        filter: Document,
        update: Document,
    },
    UpdateMany {
        filter: Document,
        update: Document,
    },
    DeleteOne(Document),
    DeleteMany(Document),
    Aggregate(Vec<Document>),
    CountDocuments(Document),
    Distinct {
        field: String,
        filter: Document,
    },
    CreateIndex(Document),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MongoCommand {
    ListCollections,
    Collection { name: String, operation: Operation },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Punct(char),
}

fn syntax_error(message: impl Into<String>) -> DbcliError {
    DbcliError::Query(message.into())
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if "(){}[]:,.;".contains(c) {
            tokens.push(Token::Punct(c));
            i += 1;
        } else if c == '"' || c == '\'' {
            let (s, next) = read_string(&chars, i)?;
            tokens.push(Token::Str(s));
            i = next;
        } else if c.is_ascii_digit()
            || (c == '-' && chars.get(i + 1).map_or(false, |d| d.is_ascii_digit()))
        {
            let start = i;
            i += 1;
            while i < chars.len()
                && (chars[i].is_ascii_digit()
                    || matches!(chars[i], '.' | 'e' | 'E')
                    || (matches!(chars[i], '+' | '-') && matches!(chars[i - 1], 'e' | 'E')))
            {
                i += 1;
            }
            let raw: String = chars[start..i].iter().collect();
            tokens.push(number_token(&raw)?);
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
            {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            return Err(syntax_error(format!(
                "Unexpected character '{}' at position {}",
                c, i
            )));
        }
    }
    Ok(tokens)
}

fn number_token(raw: &str) -> Result<Token> {
    if !raw.contains(['.', 'e', 'E']) {
        if let Ok(i) = raw.parse::<i64>() {
            return Ok(Token::Int(i));
        }
    }
    raw.parse::<f64>()
        .map(Token::Float)
        .map_err(|_| syntax_error(format!("Invalid number '{}'", raw)))
}

/// Reads a quoted string starting at `start`, returning it and the index after the closing quote
fn read_string(chars: &[char], start: usize) -> Result<(String, usize)> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            c if c == quote => return Ok((out, i + 1)),
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| syntax_error("Unterminated string"))?;
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'u' => {
                        let hex: String = chars.iter().skip(i + 2).take(4).collect();
                        let code = u32::from_str_radix(&hex, 16)
                            .ok()
                            .filter(|_| hex.len() == 4)
                            .and_then(char::from_u32)
                            .ok_or_else(|| syntax_error(format!("Invalid escape \\u{}", hex)))?;
                        out.push(code);
                        i += 4;
                    }
                    other => out.push(*other),
                }
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(syntax_error("Unterminated string"))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_punct(&self, c: char) -> bool {
        self.peek() == Some(&Token::Punct(c))
    }

    fn expect_punct(&mut self, c: char) -> Result<()> {
        match self.next() {
            Some(Token::Punct(p)) if p == c => Ok(()),
            Some(other) => Err(syntax_error(format!("Expected '{}', found {}", c, describe(&other)))),
            None => Err(syntax_error(format!("Expected '{}', found end of input", c))),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            Some(other) => Err(syntax_error(format!("Expected a name, found {}", describe(&other)))),
            None => Err(syntax_error("Expected a name, found end of input")),
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Str(s)) => Ok(s),
            Some(other) => Err(syntax_error(format!("Expected a string, found {}", describe(&other)))),
            None => Err(syntax_error("Expected a string, found end of input")),
        }
    }

    /// `(` literal, ... `)`
    fn parse_args(&mut self) -> Result<Vec<Literal>> {
        self.expect_punct('(')?;
        let mut args = Vec::new();
        if self.peek_punct(')') {
            self.next();
            return Ok(args);
        }
        loop {
            args.push(self.parse_literal()?);
            match self.next() {
                Some(Token::Punct(',')) => {}
                Some(Token::Punct(')')) => return Ok(args),
                Some(other) => {
                    return Err(syntax_error(format!(
                        "Expected ',' or ')', found {}",
                        describe(&other)
                    )))
                }
                None => return Err(syntax_error("Unclosed argument list")),
            }
        }
    }

    fn parse_literal(&mut self) -> Result<Literal> {
        match self.next() {
            Some(Token::Punct('{')) => self.parse_object(),
            Some(Token::Punct('[')) => self.parse_array(),
            Some(Token::Str(s)) => Ok(Literal::Str(s)),
            Some(Token::Int(i)) => Ok(Literal::Int(i)),
            Some(Token::Float(f)) => Ok(Literal::Float(f)),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Literal::Bool(true)),
                "false" => Ok(Literal::Bool(false)),
                "null" => Ok(Literal::Null),
                "ObjectId" => {
                    let hex = self.single_string_arg()?;
                    ObjectId::parse_str(&hex)
                        .map(Literal::ObjectId)
                        .map_err(|_| syntax_error(format!("Invalid ObjectId \"{}\"", hex)))
                }
                "ISODate" => {
                    let text = self.single_string_arg()?;
                    parse_date(&text)
                        .map(Literal::Date)
                        .ok_or_else(|| syntax_error(format!("Invalid ISODate \"{}\"", text)))
                }
                other => Err(syntax_error(format!("Unsupported expression '{}'", other))),
            },
            Some(other) => Err(syntax_error(format!("Unexpected {}", describe(&other)))),
            None => Err(syntax_error("Unexpected end of input")),
        }
    }

    fn single_string_arg(&mut self) -> Result<String> {
        self.expect_punct('(')?;
        let s = self.expect_string()?;
        self.expect_punct(')')?;
        Ok(s)
    }

    fn parse_object(&mut self) -> Result<Literal> {
        let mut fields: Vec<(String, Literal)> = Vec::new();
        loop {
            let key = match self.next() {
                Some(Token::Punct('}')) => return Ok(Literal::Object(fields)),
                Some(Token::Ident(k)) | Some(Token::Str(k)) => k,
                Some(other) => {
                    return Err(syntax_error(format!(
                        "Expected an object key, found {}",
                        describe(&other)
                    )))
                }
                None => return Err(syntax_error("Unclosed object")),
            };
            self.expect_punct(':')?;
            let value = self.parse_literal()?;
            fields.retain(|(k, _)| *k != key);
            fields.push((key, value));

            match self.next() {
                Some(Token::Punct(',')) => {}
                Some(Token::Punct('}')) => return Ok(Literal::Object(fields)),
                Some(other) => {
                    return Err(syntax_error(format!(
                        "Expected ',' or '}}', found {}",
                        describe(&other)
                    )))
                }
                None => return Err(syntax_error("Unclosed object")),
            }
        }
    }

    fn parse_array(&mut self) -> Result<Literal> {
        let mut items = Vec::new();
        loop {
            if self.peek_punct(']') {
                self.next();
                return Ok(Literal::Array(items));
            }
            items.push(self.parse_literal()?);
            match self.next() {
                Some(Token::Punct(',')) => {}
                Some(Token::Punct(']')) => return Ok(Literal::Array(items)),
                Some(other) => {
                    return Err(syntax_error(format!(
                        "Expected ',' or ']', found {}",
                        describe(&other)
                    )))
                }
                None => return Err(syntax_error("Unclosed array")),
            }
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("'{}'", name),
        Token::Str(s) => format!("string \"{}\"", s),
        Token::Int(i) => format!("number {}", i),
        Token::Float(f) => format!("number {}", f),
        Token::Punct(c) => format!("'{}'", c),
    }
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn document_arg(method: &str, arg: Option<&Literal>) -> Result<Document> {
    match arg {
        None => Ok(Document::new()),
        Some(Literal::Object(fields)) => Ok(fields_to_document(fields)),
        Some(other) => Err(syntax_error(format!(
            "{}() expects an object, got {}",
            method,
            other.kind()
        ))),
    }
}

fn required_document(method: &str, arg: Option<&Literal>) -> Result<Document> {
    match arg {
        None => Err(syntax_error(format!("{}() requires an object argument", method))),
        some => document_arg(method, some),
    }
}

fn document_list(method: &str, arg: Option<&Literal>) -> Result<Vec<Document>> {
    match arg {
        None => Ok(Vec::new()),
        Some(Literal::Array(items)) => items
            .iter()
            .map(|item| required_document(method, Some(item)))
            .collect(),
        Some(other) => Err(syntax_error(format!(
            "{}() expects an array, got {}",
            method,
            other.kind()
        ))),
    }
}

fn check_arity(method: &str, args: &[Literal], min: usize, max: usize) -> Result<()> {
    if args.len() < min {
        return Err(syntax_error(format!(
            "{}() requires at least {} argument(s)",
            method, min
        )));
    }
    if args.len() > max {
        return Err(syntax_error(format!(
            "{}() takes at most {} argument(s)",
            method, max
        )));
    }
    Ok(())
}

fn build_operation(method: &str, args: &[Literal]) -> Result<Operation> {
    let op = match method {
        "find" => {
            check_arity(method, args, 0, 2)?;
            Operation::Find {
                filter: document_arg(method, args.first())?,
                projection: args.get(1).map(|p| document_arg(method, Some(p))).transpose()?,
                sort: None,
                limit: None,
                skip: None,
            }
        }
        "findOne" => {
            check_arity(method, args, 0, 2)?;
            Operation::FindOne {
                filter: document_arg(method, args.first())?,
                projection: args.get(1).map(|p| document_arg(method, Some(p))).transpose()?,
            }
        }
        "insertOne" => {
            check_arity(method, args, 1, 1)?;
            Operation::InsertOne(required_document(method, args.first())?)
        }
        "insertMany" => {
            check_arity(method, args, 1, 1)?;
            let docs = document_list(method, args.first())?;
            if docs.is_empty() {
                return Err(syntax_error("insertMany() requires a non-empty array"));
            }
            Operation::InsertMany(docs)
        }
        "updateOne" | "updateMany" => {
            check_arity(method, args, 2, 2)?;
            let filter = required_document(method, args.first())?;
            let update = required_document(method, args.get(1))?;
            if method == "updateOne" {
                Operation::UpdateOne { filter, update }
            } else {
                Operation::UpdateMany { filter, update }
            }
        }
        "deleteOne" => {
            check_arity(method, args, 1, 1)?;
            Operation::DeleteOne(required_document(method, args.first())?)
        }
        "deleteMany" => {
            check_arity(method, args, 1, 1)?;
            Operation::DeleteMany(required_document(method, args.first())?)
        }
        "aggregate" => {
            check_arity(method, args, 0, 1)?;
            Operation::Aggregate(document_list(method, args.first())?)
        }
        "countDocuments" | "count" => {
            check_arity(method, args, 0, 1)?;
            Operation::CountDocuments(document_arg(method, args.first())?)
        }
        "distinct" => {
            check_arity(method, args, 1, 2)?;
            let field = match args.first() {
                Some(Literal::Str(s)) => s.clone(),
                _ => return Err(syntax_error("distinct() expects a field name string")),
            };
            Operation::Distinct {
                field,
                filter: document_arg(method, args.get(1))?,
            }
        }
        "createIndex" => {
            check_arity(method, args, 1, 1)?;
            Operation::CreateIndex(required_document(method, args.first())?)
        }
        other => return Err(syntax_error(format!("Unsupported method '{}'", other))),
    };
    Ok(op)
}

fn non_negative(method: &str, args: &[Literal]) -> Result<i64> {
    check_arity(method, args, 1, 1)?;
    match args.first() {
        Some(Literal::Int(n)) if *n >= 0 => Ok(*n),
        _ => Err(syntax_error(format!(
            "{}() expects a non-negative integer",
            method
        ))),
    }
}

/// Applies a chained cursor modifier to the operation it follows
fn apply_modifier(op: &mut Operation, modifier: &str, args: &[Literal]) -> Result<()> {
    match (op, modifier) {
        (_, "toArray") | (_, "pretty") => check_arity(modifier, args, 0, 0),
        (Operation::Find { limit, .. }, "limit") => {
            let n = non_negative(modifier, args)?;
            // limit(0) means no limit
            *limit = if n == 0 { None } else { Some(n) };
            Ok(())
        }
        (Operation::Find { skip, .. }, "skip") => {
            *skip = Some(non_negative(modifier, args)? as u64);
            Ok(())
        }
        (Operation::Find { sort, .. }, "sort") => {
            check_arity(modifier, args, 1, 1)?;
            *sort = Some(required_document(modifier, args.first())?);
            Ok(())
        }
        (_, other) => Err(syntax_error(format!(
            "Unsupported cursor method '{}'",
            other
        ))),
    }
}

/// Parses a shell-style command against the allow-listed grammar.
///
/// # Errors
///
/// `DbcliError::Query` describing the first thing that does not fit.
pub fn parse_command(text: &str) -> Result<MongoCommand> {
    let text = text.trim();
    if !text.starts_with("db.") {
        return Err(syntax_error("MongoDB queries should start with \"db.\""));
    }

    let mut parser = Parser {
        tokens: tokenize(text)?,
        pos: 0,
    };
    parser.expect_ident()?;
    parser.expect_punct('.')?;

    let first = parser.expect_ident()?;
    let command = if first == "getCollectionNames" {
        check_arity(&first, &parser.parse_args()?, 0, 0)?;
        MongoCommand::ListCollections
    } else {
        let name = if first == "getCollection" {
            let name = parser.single_string_arg()?;
            parser.expect_punct('.')?;
            name
        } else {
            // Dotted collection names: everything before the final `name(` segment
            let mut segments = vec![first];
            parser.expect_punct('.')?;
            loop {
                let segment = parser.expect_ident()?;
                if parser.peek_punct('(') {
                    parser.pos -= 1;
                    break;
                }
                segments.push(segment);
                parser.expect_punct('.')?;
            }
            segments.join(".")
        };
        if name.is_empty() {
            return Err(syntax_error("Collection name must not be empty"));
        }

        let method = parser.expect_ident()?;
        let args = parser.parse_args()?;
        let mut operation = build_operation(&method, &args)?;

        while parser.peek_punct('.') {
            parser.next();
            let modifier = parser.expect_ident()?;
            let args = parser.parse_args()?;
            apply_modifier(&mut operation, &modifier, &args)?;
        }
        MongoCommand::Collection { name, operation }
    };

    if parser.peek_punct(';') {
        parser.next();
    }
    match parser.next() {
        None => Ok(command),
        Some(extra) => Err(syntax_error(format!(
            "Unexpected {} after command",
            describe(&extra)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn collection_op(text: &str) -> (String, Operation) {
        match parse_command(text).unwrap() {
            MongoCommand::Collection { name, operation } => (name, operation),
            other => panic!("Expected collection command, got {:?}", other),
        }
    }

    #[test]
    fn test_find_with_modifiers() {
        let (name, op) = collection_op(
            "db.users.find({ age: { $gt: 21 } }, { name: 1 }).sort({ name: -1 }).skip(5).limit(10)",
        );
        assert_eq!(name, "users");
        assert_eq!(
            op,
            Operation::Find {
                filter: doc! { "age": { "$gt": 21 } },
                projection: Some(doc! { "name": 1 }),
                sort: Some(doc! { "name": -1 }),
                limit: Some(10),
                skip: Some(5),
            }
        );
    }

    #[test]
    fn test_templates_parse() {
        let (_, op) = collection_op(
            "db.collection.aggregate([\n  { $group: { _id: \"$field\", count: { $sum: 1 } } }\n])",
        );
        assert_eq!(
            op,
            Operation::Aggregate(vec![doc! { "$group": { "_id": "$field", "count": { "$sum": 1 } } }])
        );

        let (_, op) = collection_op(
            "db.collection.updateOne({ \"field\": \"value\" }, { $set: { \"field\": \"newValue\" } })",
        );
        assert!(matches!(op, Operation::UpdateOne { .. }));

        let (_, op) = collection_op("db.collection.find().limit(10)");
        assert!(matches!(op, Operation::Find { limit: Some(10), .. }));
    }

    #[test]
    fn test_get_collection_and_dotted_names() {
        let (name, _) = collection_op("db.getCollection('order-items').countDocuments()");
        assert_eq!(name, "order-items");

        let (name, op) = collection_op("db.system.profile.findOne();");
        assert_eq!(name, "system.profile");
        assert_eq!(op, Operation::FindOne { filter: Document::new(), projection: None });
    }

    #[test]
    fn test_list_collections() {
        assert_eq!(
            parse_command("db.getCollectionNames()").unwrap(),
            MongoCommand::ListCollections
        );
    }

    #[test]
    fn test_special_literals() {
        let (_, op) = collection_op(
            "db.events.find({ _id: ObjectId(\"507f1f77bcf86cd799439011\"), at: { $gte: ISODate(\"2024-01-01\") } })",
        );
        let Operation::Find { filter, .. } = op else {
            panic!("Expected find");
        };
        assert!(matches!(filter.get("_id"), Some(Bson::ObjectId(_))));
        let at = filter.get_document("at").unwrap();
        assert!(matches!(at.get("$gte"), Some(Bson::DateTime(_))));
    }

    #[test]
    fn test_rejects_code_and_unknown_methods() {
        for bad in [
            "db.users.drop()",
            "db.users.find({ $where: function() { return true } })",
            "db.users.find().forEach(printjson)",
            "db.users.find({}).limit(-1)",
            "db.users.insertOne([1, 2])",
            "db.users.find() ; db.users.drop()",
            "db.dropDatabase()",
            "users.find()",
            "db.users.find({ a: 1 }",
            "db.users.find({ a: 'unterminated })",
        ] {
            match parse_command(bad) {
                Err(DbcliError::Query(_)) => {}
                other => panic!("Expected rejection of {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_count_after_non_find_is_rejected() {
        assert!(parse_command("db.users.countDocuments().limit(1)").is_err());
        assert!(parse_command("db.users.aggregate([]).toArray()").is_ok());
    }

    #[test]
    fn test_string_escapes_and_numbers() {
        let (_, op) = collection_op(r#"db.c.insertOne({ s: 'it\'s\n', big: 3000000000, f: -1.5e2 })"#);
        assert_eq!(
            op,
            Operation::InsertOne(doc! { "s": "it's\n", "big": 3_000_000_000i64, "f": -150.0 })
        );
    }
}
