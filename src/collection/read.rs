//! Read operations for collections
//!
//! This module contains all read operations including:
//! - find, findOne
//! - countDocuments, estimatedDocumentCount
//! - distinct

use serde_json::Value;
use tracing::debug;

use super::CallOptions;
use crate::cursor::{FindCursor, FindOneOptions};
use crate::error::{DataApiError, Result};
use crate::executor::{Command, Document, run_command};
use crate::path::{DistinctValues, extract_values, parse_path, projection_prefix};

impl super::Collection {
    /// Start a query
    ///
    /// Nothing is sent until the returned cursor is consumed.
    pub fn find(&self, filter: Document) -> FindCursor {
        FindCursor::new(self.name.clone(), self.executor.clone(), filter)
            .with_command_options(self.command_options(None))
    }

    /// Fetch the first document matching `filter`
    ///
    /// # Arguments
    /// * `filter` - Query filter
    /// * `options` - Sort, projection and similarity options
    ///
    /// # Returns
    /// * `Result<Option<Document>>` - The document, or `None` when nothing matches
    pub async fn find_one(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> Result<Option<Document>> {
        let command = Command::FindOne {
            filter,
            sort: options.sort,
            projection: options.projection,
            include_similarity: options.include_similarity,
        };
        let response = run_command(
            self.executor.as_ref(),
            &self.name,
            &command,
            &self.command_options(options.timeout),
        )
        .await?;
        Ok(response.into_document())
    }

    /// Distinct values found at the dotted path `key` across matching documents
    ///
    /// Values are returned in first-seen order. Arrays met along the path fan
    /// out, numeric segments index into arrays.
    pub async fn distinct(&self, key: &str, filter: Document) -> Result<Vec<Value>> {
        let segments = parse_path(key)?;
        let mut prefix = projection_prefix(&segments);
        if prefix.is_empty() {
            prefix = segments[0].to_string();
        }

        let mut projection = Document::new();
        projection.insert(prefix, Value::from(1));
        let mut cursor = self.find(filter).project(projection)?;

        let mut values = DistinctValues::new();
        let mut scanned = 0u64;
        while let Some(doc) = cursor.next().await? {
            scanned += 1;
            let doc = Value::Object(doc);
            for value in extract_values(&doc, &segments) {
                values.insert(value);
            }
        }

        debug!(
            "Distinct '{}' on '{}': {} value(s) from {} document(s)",
            key,
            self.name,
            values.len(),
            scanned
        );
        Ok(values.into_values())
    }

    /// Exact number of documents matching `filter`
    ///
    /// # Arguments
    /// * `filter` - Query filter
    /// * `upper_bound` - Largest count the caller is willing to accept
    /// * `options` - Per-call timeout
    ///
    /// # Returns
    /// * `Result<u64>` - The count, or `TooManyDocumentsToCount` when the
    ///   service limit or `upper_bound` is exceeded
    pub async fn count_documents(
        &self,
        filter: Document,
        upper_bound: u64,
        options: CallOptions,
    ) -> Result<u64> {
        let response = run_command(
            self.executor.as_ref(),
            &self.name,
            &Command::CountDocuments { filter },
            &self.command_options(options.timeout),
        )
        .await?;

        let count = response
            .status
            .as_ref()
            .and_then(|status| status.count)
            .ok_or_else(|| {
                DataApiError::Transport("countDocuments response carried no count".to_string())
            })?;

        if response.more_data() {
            return Err(DataApiError::TooManyDocumentsToCount {
                limit: count,
                hit_server_limit: true,
            });
        }
        if count > upper_bound {
            return Err(DataApiError::TooManyDocumentsToCount {
                limit: upper_bound,
                hit_server_limit: false,
            });
        }
        Ok(count)
    }

    pub async fn estimated_document_count(&self, options: CallOptions) -> Result<u64> {
        let response = run_command(
            self.executor.as_ref(),
            &self.name,
            &Command::EstimatedDocumentCount,
            &self.command_options(options.timeout),
        )
        .await?;

        response
            .status
            .and_then(|status| status.count)
            .ok_or_else(|| {
                DataApiError::Transport(
                    "estimatedDocumentCount response carried no count".to_string(),
                )
            })
    }
}
