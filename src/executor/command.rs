//! Command definitions
//!
//! Every request sent to the service is one of the variants of [`Command`].
//! A command serializes to the wire shape `{ "<name>": { ...body } }`, where
//! empty `options` objects are omitted.
//!
//! Commands that carry caller-provided update or replacement documents should be
//! built through the validating constructors (`Command::update_one`,
//! `Command::replace_one`, ...) so malformed input is rejected before anything
//! reaches the network.

use serde_json::{Map, Value, json};

use crate::error::{DataApiError, Result};

use super::Document;

/// A single command against a collection
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Paged query
    Find {
        filter: Document,
        sort: Option<Document>,
        projection: Option<Document>,
        limit: Option<u64>,
        skip: Option<u64>,
        include_similarity: bool,
        page_state: Option<String>,
    },

    /// Single-document query
    FindOne {
        filter: Document,
        sort: Option<Document>,
        projection: Option<Document>,
        include_similarity: bool,
    },

    /// Exact count, bounded by the service
    CountDocuments { filter: Document },

    /// Metadata-based count estimate
    EstimatedDocumentCount,

    /// Insert a single document
    InsertOne { document: Document },

    /// Insert a batch of documents in one request
    InsertMany { documents: Vec<Document>, ordered: bool },

    /// Update the first matching document
    UpdateOne {
        filter: Document,
        update: Document,
        upsert: bool,
    },

    /// Update matching documents, one service-side page at a time
    UpdateMany {
        filter: Document,
        update: Document,
        upsert: bool,
        page_state: Option<String>,
    },

    /// Replace the first matching document (sent as `findOneAndReplace`)
    ReplaceOne {
        filter: Document,
        replacement: Document,
        upsert: bool,
    },

    /// Delete the first matching document
    DeleteOne { filter: Document },

    /// Delete matching documents, one service-side page at a time
    DeleteMany { filter: Document },
}

impl Command {
    /// Build an `insertOne` command
    pub fn insert_one(document: Document) -> Self {
        Command::InsertOne { document }
    }

    /// Build an `insertMany` command
    ///
    /// # Arguments
    /// * `documents` - Documents for a single request, must not be empty
    /// * `ordered` - Whether the service stops at the first failing document
    ///
    /// # Returns
    /// * `Result<Self>` - The command or an invalid-argument error
    pub fn insert_many(documents: Vec<Document>, ordered: bool) -> Result<Self> {
        if documents.is_empty() {
            return Err(DataApiError::InvalidArgument(
                "insertMany requires at least one document".to_string(),
            ));
        }
        Ok(Command::InsertMany { documents, ordered })
    }

    /// Build an `updateOne` command, validating the update document
    pub fn update_one(filter: Document, update: Document, upsert: bool) -> Result<Self> {
        validate_update(&update)?;
        Ok(Command::UpdateOne {
            filter,
            update,
            upsert,
        })
    }

    /// Build the first page of an `updateMany` command, validating the update document
    pub fn update_many(filter: Document, update: Document, upsert: bool) -> Result<Self> {
        validate_update(&update)?;
        Ok(Command::UpdateMany {
            filter,
            update,
            upsert,
            page_state: None,
        })
    }

    /// Build a `findOneAndReplace` command, validating the replacement document
    pub fn replace_one(filter: Document, replacement: Document, upsert: bool) -> Result<Self> {
        validate_replacement(&replacement)?;
        Ok(Command::ReplaceOne {
            filter,
            replacement,
            upsert,
        })
    }

    /// Build a `deleteOne` command
    pub fn delete_one(filter: Document) -> Self {
        Command::DeleteOne { filter }
    }

    /// Build a `deleteMany` command
    ///
    /// An empty filter would wipe the collection; callers must ask for that
    /// explicitly through [`Command::delete_all`].
    pub fn delete_many(filter: Document) -> Result<Self> {
        if filter.is_empty() {
            return Err(DataApiError::InvalidArgument(
                "deleteMany with an empty filter would delete every document; use delete_all instead"
                    .to_string(),
            ));
        }
        Ok(Command::DeleteMany { filter })
    }

    /// Build a `deleteMany` command with an empty filter
    pub fn delete_all() -> Self {
        Command::DeleteMany {
            filter: Document::new(),
        }
    }

    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Command::Find { .. } => "find",
            Command::FindOne { .. } => "findOne",
            Command::CountDocuments { .. } => "countDocuments",
            Command::EstimatedDocumentCount => "estimatedDocumentCount",
            Command::InsertOne { .. } => "insertOne",
            Command::InsertMany { .. } => "insertMany",
            Command::UpdateOne { .. } => "updateOne",
            Command::UpdateMany { .. } => "updateMany",
            Command::ReplaceOne { .. } => "findOneAndReplace",
            Command::DeleteOne { .. } => "deleteOne",
            Command::DeleteMany { .. } => "deleteMany",
        }
    }

    /// Whether this command may insert a document through an upsert
    pub fn is_upsert(&self) -> bool {
        match self {
            Command::UpdateOne { upsert, .. }
            | Command::UpdateMany { upsert, .. }
            | Command::ReplaceOne { upsert, .. } => *upsert,
            _ => false,
        }
    }

    /// Serialize the command to its JSON wire form
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        let mut options = Map::new();

        match self {
            Command::Find {
                filter,
                sort,
                projection,
                limit,
                skip,
                include_similarity,
                page_state,
            } => {
                body.insert("filter".into(), Value::Object(filter.clone()));
                insert_opt_doc(&mut body, "sort", sort);
                insert_opt_doc(&mut body, "projection", projection);
                if let Some(limit) = limit {
                    options.insert("limit".into(), json!(limit));
                }
                if let Some(skip) = skip {
                    options.insert("skip".into(), json!(skip));
                }
                if *include_similarity {
                    options.insert("includeSimilarity".into(), Value::Bool(true));
                }
                if let Some(state) = page_state {
                    options.insert("pageState".into(), Value::String(state.clone()));
                }
            }
            Command::FindOne {
                filter,
                sort,
                projection,
                include_similarity,
            } => {
                body.insert("filter".into(), Value::Object(filter.clone()));
                insert_opt_doc(&mut body, "sort", sort);
                insert_opt_doc(&mut body, "projection", projection);
                if *include_similarity {
                    options.insert("includeSimilarity".into(), Value::Bool(true));
                }
            }
            Command::CountDocuments { filter } => {
                body.insert("filter".into(), Value::Object(filter.clone()));
            }
            Command::EstimatedDocumentCount => {}
            Command::InsertOne { document } => {
                body.insert("document".into(), Value::Object(document.clone()));
            }
            Command::InsertMany { documents, ordered } => {
                let docs = documents.iter().cloned().map(Value::Object).collect();
                body.insert("documents".into(), Value::Array(docs));
                options.insert("ordered".into(), Value::Bool(*ordered));
            }
            Command::UpdateOne {
                filter,
                update,
                upsert,
            } => {
                body.insert("filter".into(), Value::Object(filter.clone()));
                body.insert("update".into(), Value::Object(update.clone()));
                if *upsert {
                    options.insert("upsert".into(), Value::Bool(true));
                }
            }
            Command::UpdateMany {
                filter,
                update,
                upsert,
                page_state,
            } => {
                body.insert("filter".into(), Value::Object(filter.clone()));
                body.insert("update".into(), Value::Object(update.clone()));
                if *upsert {
                    options.insert("upsert".into(), Value::Bool(true));
                }
                if let Some(state) = page_state {
                    options.insert("pageState".into(), Value::String(state.clone()));
                }
            }
            Command::ReplaceOne {
                filter,
                replacement,
                upsert,
            } => {
                body.insert("filter".into(), Value::Object(filter.clone()));
                body.insert("replacement".into(), Value::Object(replacement.clone()));
                // Only the counters matter, not the document itself
                body.insert("projection".into(), json!({ "*": 0 }));
                options.insert("returnDocument".into(), Value::String("before".into()));
                if *upsert {
                    options.insert("upsert".into(), Value::Bool(true));
                }
            }
            Command::DeleteOne { filter } | Command::DeleteMany { filter } => {
                body.insert("filter".into(), Value::Object(filter.clone()));
            }
        }

        if !options.is_empty() {
            body.insert("options".into(), Value::Object(options));
        }

        let mut wrapper = Map::new();
        wrapper.insert(self.name().to_string(), Value::Object(body));
        Value::Object(wrapper)
    }
}

fn insert_opt_doc(body: &mut Map<String, Value>, key: &str, value: &Option<Document>) {
    if let Some(doc) = value {
        body.insert(key.to_string(), Value::Object(doc.clone()));
    }
}

/// An update document must be non-empty and made only of `$` operators.
fn validate_update(update: &Document) -> Result<()> {
    if update.is_empty() {
        return Err(DataApiError::InvalidArgument(
            "update document must not be empty".to_string(),
        ));
    }
    if let Some(key) = update.keys().find(|key| !key.starts_with('$')) {
        return Err(DataApiError::InvalidArgument(format!(
            "update document may only contain update operators, found '{key}'"
        )));
    }
    Ok(())
}

fn validate_replacement(replacement: &Document) -> Result<()> {
    if let Some(key) = replacement.keys().find(|key| key.starts_with('$')) {
        return Err(DataApiError::InvalidArgument(format!(
            "replacement document must not contain update operators, found '{key}'"
        )));
    }
    Ok(())
}
