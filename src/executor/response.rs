//! Raw command responses
//!
//! The service answers every command with an envelope of the form
//! `{ "status": {...}, "data": {...}, "errors": [...] }`, all three parts optional.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Document;

/// Response envelope for a single command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResponseStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorDescriptor>>,
}

/// Mutation counters and pagination markers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inserted_ids: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_count: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_count: Option<u64>,

    /// `-1` when the whole collection was truncated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upserted_id: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub more_data: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

/// Returned documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Document>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_state: Option<String>,
}

/// One entry of the `errors` array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Anything else the service attached (family, scope, id, ...)
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ErrorDescriptor {
    /// Build a descriptor from a code and a message
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: Some(error_code.into()),
            message: Some(message.into()),
            attributes: Map::new(),
        }
    }
}

impl RawResponse {
    /// Parse a response envelope from its JSON form
    pub fn from_json(value: Value) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Whether the service reported at least one error
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }

    /// Reported errors, empty when there are none
    pub fn error_descriptors(&self) -> &[ErrorDescriptor] {
        self.errors.as_deref().unwrap_or(&[])
    }

    /// Continuation token for the next page, if any
    ///
    /// Query responses carry it under `data`, mutation responses under `status`.
    pub fn next_page_state(&self) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|data| data.next_page_state.clone())
            .or_else(|| {
                self.status
                    .as_ref()
                    .and_then(|status| status.next_page_state.clone())
            })
    }

    /// Whether the service has more matching documents to process
    pub fn more_data(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|status| status.more_data)
            .unwrap_or(false)
    }

    /// Take the page of documents out of the response
    pub fn into_documents(self) -> Vec<Document> {
        self.data
            .and_then(|data| data.documents)
            .unwrap_or_default()
    }

    /// Take the single document out of the response
    pub fn into_document(self) -> Option<Document> {
        self.data.and_then(|data| data.document)
    }
}
