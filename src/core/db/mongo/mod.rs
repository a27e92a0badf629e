//! MongoDB Adapter
//!
//! Executes shell-style commands (`db.users.find({...}).limit(5)`) against
//! the URI's default database. Commands are parsed by the allow-listed
//! grammar in [`grammar`] and mapped onto typed driver calls; nothing in the
//! query text is ever evaluated.

pub mod grammar;

use super::client::DatabaseClient;
use super::engine::Engine;
use super::query::{QueryResult, Row, Value};
use crate::connections::ConnectionProfile;
use crate::core::{DbcliError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use grammar::{parse_command, MongoCommand, Operation};
use mongodb::bson::{doc, Bson, Document};
use mongodb::{Client, Collection, Database, IndexModel};
use std::time::Instant;
use tracing::{debug, info};

const FALLBACK_DATABASE: &str = "test";

pub struct MongoClient {
    uri: Option<String>,
    client: Option<Client>,
    db: Option<Database>,
}

impl MongoClient {
    pub fn new(profile: &ConnectionProfile) -> Self {
        MongoClient {
            uri: profile.uri.clone(),
            client: None,
            db: None,
        }
    }

    async fn execute(db: &Database, command: MongoCommand) -> mongodb::error::Result<Vec<Row>> {
        let (name, operation) = match command {
            MongoCommand::ListCollections => {
                let names = db.list_collection_names().await?;
                return Ok(names
                    .into_iter()
                    .map(|n| Row::new().with("name", n))
                    .collect());
            }
            MongoCommand::Collection { name, operation } => (name, operation),
        };
        let coll: Collection<Document> = db.collection(&name);
        debug!("Running {:?} on collection {}", operation, name);

        let rows = match operation {
            Operation::Find {
                filter,
                projection,
                sort,
                limit,
                skip,
            } => {
                let mut find = coll.find(filter);
                if let Some(projection) = projection {
                    find = find.projection(projection);
                }
                if let Some(sort) = sort {
                    find = find.sort(sort);
                }
                if let Some(limit) = limit {
                    find = find.limit(limit);
                }
                if let Some(skip) = skip {
                    find = find.skip(skip);
                }
                let docs: Vec<Document> = find.await?.try_collect().await?;
                docs.iter().map(document_to_row).collect()
            }
            Operation::FindOne { filter, projection } => {
                let mut find = coll.find_one(filter);
                if let Some(projection) = projection {
                    find = find.projection(projection);
                }
                find.await?.iter().map(document_to_row).collect()
            }
            Operation::InsertOne(document) => {
                let result = coll.insert_one(document).await?;
                vec![Row::new().with("insertedId", bson_to_value(&result.inserted_id))]
            }
            Operation::InsertMany(documents) => {
                let result = coll.insert_many(documents).await?;
                let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
                ids.sort_by_key(|(index, _)| *index);
                let joined = ids
                    .iter()
                    .map(|(_, id)| bson_to_value(id).to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                vec![Row::new()
                    .with("insertedCount", ids.len() as i64)
                    .with("insertedIds", joined)]
            }
            Operation::UpdateOne { filter, update } => {
                let result = coll.update_one(filter, update).await?;
                vec![update_row(result.matched_count, result.modified_count)]
            }
            Operation::UpdateMany { filter, update } => {
                let result = coll.update_many(filter, update).await?;
                vec![update_row(result.matched_count, result.modified_count)]
            }
            Operation::DeleteOne(filter) => {
                let result = coll.delete_one(filter).await?;
                vec![Row::new().with("deletedCount", count_value(result.deleted_count))]
            }
            Operation::DeleteMany(filter) => {
                let result = coll.delete_many(filter).await?;
                vec![Row::new().with("deletedCount", count_value(result.deleted_count))]
            }
            Operation::Aggregate(pipeline) => {
                let docs: Vec<Document> = coll.aggregate(pipeline).await?.try_collect().await?;
                docs.iter().map(document_to_row).collect()
            }
            Operation::CountDocuments(filter) => {
                let count = coll.count_documents(filter).await?;
                vec![Row::new().with("count", count_value(count))]
            }
            Operation::Distinct { field, filter } => {
                let values = coll.distinct(field, filter).await?;
                vec![Row::new().with("values", Bson::Array(values).into_relaxed_extjson().to_string())]
            }
            Operation::CreateIndex(keys) => {
                let model = IndexModel::builder().keys(keys).build();
                let result = coll.create_index(model).await?;
                vec![Row::new().with("indexName", result.index_name)]
            }
        };
        Ok(rows)
    }
}

fn count_value(n: u64) -> Value {
    i64::try_from(n)
        .map(Value::Int)
        .unwrap_or_else(|_| Value::Text(n.to_string()))
}

fn update_row(matched: u64, modified: u64) -> Row {
    Row::new()
        .with("matchedCount", count_value(matched))
        .with("modifiedCount", count_value(modified))
}

/// Flattens a document into a row; nested values become relaxed extended JSON text
pub fn document_to_row(document: &Document) -> Row {
    let mut row = Row::new();
    for (key, value) in document {
        row.push(key.as_str(), bson_to_value(value));
    }
    row
}

pub fn bson_to_value(value: &Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::Int((*i).into()),
        Bson::Int64(i) => Value::Int(*i),
        Bson::Double(f) => Value::Float(*f),
        Bson::String(s) => Value::Text(s.clone()),
        Bson::ObjectId(oid) => Value::Text(oid.to_hex()),
        Bson::DateTime(dt) => DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
            .map(Value::Timestamp)
            .unwrap_or_else(|| Value::Text(dt.to_string())),
        other => Value::Text(other.clone().into_relaxed_extjson().to_string()),
    }
}

#[async_trait]
impl DatabaseClient for MongoClient {
    fn engine(&self) -> Engine {
        Engine::Document
    }

    async fn connect(&mut self) -> Result<()> {
        let uri = self
            .uri
            .as_deref()
            .ok_or_else(|| DbcliError::Connection("No connection URI configured".to_string()))?;
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| DbcliError::Connection(e.to_string()))?;
        let db = client
            .default_database()
            .unwrap_or_else(|| client.database(FALLBACK_DATABASE));

        // The driver connects lazily; ping so bad hosts and credentials fail here
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DbcliError::Connection(e.to_string()))?;

        info!("Connected to MongoDB database {}", db.name());
        self.db = Some(db);
        self.client = Some(client);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.db = None;
        if let Some(client) = self.client.take() {
            client.shutdown().await;
            debug!("MongoDB client shut down");
        }
        Ok(())
    }

    async fn query(&mut self, text: &str) -> Result<QueryResult> {
        let db = self
            .db
            .as_ref()
            .ok_or_else(|| DbcliError::Query("Not connected to database".to_string()))?;

        let started = Instant::now();
        let command = parse_command(text)?;
        let rows = Self::execute(db, command)
            .await
            .map_err(|e| DbcliError::Query(format!("MongoDB query error: {}", e)))?;
        Ok(QueryResult::new(rows, None, started))
    }
}
