//! Subcommand execution
//!
//! Every command returns a JSON value that `main` prints.

use crate::Command;
use anyhow::{anyhow, bail, Context, Result};
use mongostore::bson::{Bson, Document};
use mongostore::mongodb::options::FindOptions;
use mongostore::{Record, Store};
use serde_json::{json, Value};

pub async fn run(store: &Store, command: Command) -> Result<Value> {
    match command {
        Command::Ping => Ok(json!({ "ok": store.ping().await? })),
        Command::Databases => Ok(json!(store.get_databases().await?)),
        Command::Collections => Ok(json!(store.get_collections().await?)),
        Command::Version => Ok(json!({ "version": store.server_version().await? })),
        Command::Find {
            collection,
            filter,
            sort,
            limit,
            skip,
        } => {
            let filter = parse_optional_document(filter.as_deref())?;
            let mut options = FindOptions::default();
            options.sort = sort.as_deref().map(parse_document).transpose()?;
            options.limit = limit;
            options.skip = skip;

            let records = store.collection(&collection)?.find(filter, options).await?;
            Ok(records_to_json(records))
        }
        Command::FindId { collection, id } => {
            let record = store.collection(&collection)?.find_by_id(id).await?;
            Ok(record.map(Record::into_json).unwrap_or(Value::Null))
        }
        Command::Count { collection, filter } => {
            let filter = parse_optional_document(filter.as_deref())?;
            let count = store.collection(&collection)?.count(filter).await?;
            Ok(json!({ "count": count }))
        }
        Command::Insert {
            collection,
            document,
        } => {
            let handle = store.collection(&collection)?;
            match parse_json(&document)? {
                Bson::Document(doc) => Ok(json!({ "inserted_id": handle.insert_one(doc).await? })),
                Bson::Array(items) => {
                    let docs = items
                        .into_iter()
                        .map(|item| match item {
                            Bson::Document(doc) => Ok(doc),
                            other => Err(anyhow!("Array items must be objects, got {}", other)),
                        })
                        .collect::<Result<Vec<Document>>>()?;
                    Ok(json!({ "inserted_ids": handle.insert_many(docs).await? }))
                }
                other => bail!("Expected an object or an array of objects, got {}", other),
            }
        }
        Command::UpdateId {
            collection,
            id,
            update,
        } => {
            let update = parse_document(&update)?;
            let modified = store.collection(&collection)?.update_by_id(id, update).await?;
            Ok(json!({ "modified": modified }))
        }
        Command::DeleteId { collection, id } => {
            let deleted = store.collection(&collection)?.delete_by_id(id).await?;
            Ok(json!({ "deleted": deleted }))
        }
        Command::Aggregate {
            collection,
            pipeline,
        } => {
            let pipeline = parse_pipeline(&pipeline)?;
            let records = store.collection(&collection)?.aggregate(pipeline, None).await?;
            Ok(records_to_json(records))
        }
    }
}

fn records_to_json(records: Vec<Record>) -> Value {
    Value::Array(records.into_iter().map(Record::into_json).collect())
}

/// Parse extended JSON into BSON
fn parse_json(input: &str) -> Result<Bson> {
    let value: Value = serde_json::from_str(input).context("Invalid JSON")?;
    Bson::try_from(value).map_err(|e| anyhow!("Invalid extended JSON: {}", e))
}

fn parse_document(input: &str) -> Result<Document> {
    match parse_json(input)? {
        Bson::Document(doc) => Ok(doc),
        other => bail!("Expected a JSON object, got {}", other),
    }
}

fn parse_optional_document(input: Option<&str>) -> Result<Document> {
    input.map(parse_document).transpose().map(Option::unwrap_or_default)
}

fn parse_pipeline(input: &str) -> Result<Vec<Document>> {
    match parse_json(input)? {
        Bson::Array(stages) => stages
            .into_iter()
            .map(|stage| match stage {
                Bson::Document(doc) => Ok(doc),
                other => Err(anyhow!("Pipeline stages must be objects, got {}", other)),
            })
            .collect(),
        other => bail!("Expected a JSON array of stages, got {}", other),
    }
}
