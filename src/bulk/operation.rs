use serde_json::Value;

use crate::error::{DataApiError, Result};
use crate::executor::{Command, Document};

/// One write of a bulk run
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    InsertOne {
        document: Document,
    },
    UpdateOne {
        filter: Document,
        update: Document,
        upsert: bool,
    },
    UpdateMany {
        filter: Document,
        update: Document,
        upsert: bool,
    },
    ReplaceOne {
        filter: Document,
        replacement: Document,
        upsert: bool,
    },
    DeleteOne {
        filter: Document,
    },
    DeleteMany {
        filter: Document,
    },
}

impl BulkOperation {
    /// Parse an operation from its JSON form
    ///
    /// Accepted shapes mirror the command names, e.g.
    /// `{"insertOne": {"document": {...}}}` or
    /// `{"updateMany": {"filter": {...}, "update": {...}, "upsert": true}}`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .filter(|obj| obj.len() == 1)
            .ok_or_else(|| invalid("bulk operation must be an object with exactly one key"))?;
        let (kind, body) = obj.iter().next().ok_or_else(|| invalid("empty bulk operation"))?;
        let body = body
            .as_object()
            .ok_or_else(|| invalid(&format!("'{kind}' body must be an object")))?;

        let op = match kind.as_str() {
            "insertOne" => BulkOperation::InsertOne {
                document: required_doc(body, kind, "document")?,
            },
            "updateOne" => BulkOperation::UpdateOne {
                filter: required_doc(body, kind, "filter")?,
                update: required_doc(body, kind, "update")?,
                upsert: upsert_flag(body),
            },
            "updateMany" => BulkOperation::UpdateMany {
                filter: required_doc(body, kind, "filter")?,
                update: required_doc(body, kind, "update")?,
                upsert: upsert_flag(body),
            },
            "replaceOne" => BulkOperation::ReplaceOne {
                filter: required_doc(body, kind, "filter")?,
                replacement: required_doc(body, kind, "replacement")?,
                upsert: upsert_flag(body),
            },
            "deleteOne" => BulkOperation::DeleteOne {
                filter: required_doc(body, kind, "filter")?,
            },
            "deleteMany" => BulkOperation::DeleteMany {
                filter: required_doc(body, kind, "filter")?,
            },
            other => return Err(invalid(&format!("unknown bulk operation '{other}'"))),
        };
        Ok(op)
    }

    /// Whether a successful response may carry an upserted id
    pub fn is_upsert(&self) -> bool {
        match self {
            BulkOperation::UpdateOne { upsert, .. }
            | BulkOperation::UpdateMany { upsert, .. }
            | BulkOperation::ReplaceOne { upsert, .. } => *upsert,
            _ => false,
        }
    }

    /// Validate and convert into the command sent for this operation
    pub fn to_command(&self) -> Result<Command> {
        match self {
            BulkOperation::InsertOne { document } => Ok(Command::insert_one(document.clone())),
            BulkOperation::UpdateOne {
                filter,
                update,
                upsert,
            } => Command::update_one(filter.clone(), update.clone(), *upsert),
            BulkOperation::UpdateMany {
                filter,
                update,
                upsert,
            } => Command::update_many(filter.clone(), update.clone(), *upsert),
            BulkOperation::ReplaceOne {
                filter,
                replacement,
                upsert,
            } => Command::replace_one(filter.clone(), replacement.clone(), *upsert),
            BulkOperation::DeleteOne { filter } => Ok(Command::delete_one(filter.clone())),
            BulkOperation::DeleteMany { filter } => Command::delete_many(filter.clone()),
        }
    }
}

fn invalid(msg: &str) -> DataApiError {
    DataApiError::InvalidArgument(msg.to_string())
}

fn required_doc(body: &Document, kind: &str, field: &str) -> Result<Document> {
    match body.get(field) {
        Some(Value::Object(doc)) => Ok(doc.clone()),
        Some(_) => Err(invalid(&format!("'{kind}.{field}' must be an object"))),
        None => Err(invalid(&format!("'{kind}' requires '{field}'"))),
    }
}

fn upsert_flag(body: &Document) -> bool {
    body.get("upsert").and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use serde_json::json;

    #[test]
    fn test_from_json_variants() {
        let op = BulkOperation::from_json(&json!({
            "updateMany": { "filter": { "a": 1 }, "update": { "$set": { "b": 2 } }, "upsert": true }
        }))
        .unwrap();
        assert_eq!(
            op,
            BulkOperation::UpdateMany {
                filter: doc!({ "a": 1 }),
                update: doc!({ "$set": { "b": 2 } }),
                upsert: true,
            }
        );
        assert!(op.is_upsert());

        let op = BulkOperation::from_json(&json!({ "deleteOne": { "filter": {} } })).unwrap();
        assert!(!op.is_upsert());
    }

    #[test]
    fn test_from_json_rejects_malformed_input() {
        assert!(BulkOperation::from_json(&json!({ "insertOne": {} })).is_err());
        assert!(BulkOperation::from_json(&json!({ "insertOne": { "document": 3 } })).is_err());
        assert!(BulkOperation::from_json(&json!({ "dropCollection": {} })).is_err());
        assert!(BulkOperation::from_json(&json!({ "a": {}, "b": {} })).is_err());
        assert!(BulkOperation::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_to_command_validates() {
        let op = BulkOperation::DeleteMany {
            filter: Document::new(),
        };
        assert!(op.to_command().is_err());

        let op = BulkOperation::ReplaceOne {
            filter: doc!({ "_id": 1 }),
            replacement: doc!({ "x": 1 }),
            upsert: true,
        };
        let cmd = op.to_command().unwrap();
        assert_eq!(cmd.name(), "findOneAndReplace");
        assert!(cmd.is_upsert());
    }
}
