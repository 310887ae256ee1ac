//! Collection handle
//!
//! [`Collection`] is the caller-facing entry point. It owns the namespace and
//! the per-collection defaults, builds typed commands and hands them to the
//! cursor, the bulk orchestrator or directly to the executor.
//!
//! The module is organized into sub-modules by operation type:
//! - `read`: find, findOne, distinct, counts
//! - `write`: inserts, updates, replaces, deletes, bulk writes

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::bulk::{DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY};
use crate::config::Config;
use crate::executor::{CommandExecutor, CommandOptions, RawResponse};

mod read;
mod write;

/// Defaults applied to calls that leave the corresponding option unset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDefaults {
    /// Per-request timeout
    pub timeout: Option<Duration>,

    /// Documents per insert-many request
    pub chunk_size: usize,

    /// Workers for unordered bulk runs
    pub concurrency: usize,
}

impl Default for CollectionDefaults {
    fn default() -> Self {
        Self {
            timeout: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl CollectionDefaults {
    /// Derive defaults from the loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.command_timeout(),
            chunk_size: config.bulk.chunk_size,
            concurrency: config.bulk.concurrency,
        }
    }
}

/// Per-call options for single-request operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Request timeout, overriding [`CollectionDefaults::timeout`]
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Handle on one collection of the remote service
#[derive(Clone)]
pub struct Collection {
    name: String,
    executor: Arc<dyn CommandExecutor>,
    defaults: CollectionDefaults,
}

impl Collection {
    /// Create a collection handle
    ///
    /// # Arguments
    /// * `name` - Collection name, used as the command namespace
    /// * `executor` - Transport implementation
    ///
    /// # Returns
    /// * `Self` - Handle using [`CollectionDefaults::default`]
    pub fn new(name: impl Into<String>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            name: name.into(),
            executor,
            defaults: CollectionDefaults::default(),
        }
    }

    /// Replace the defaults of this handle
    pub fn with_defaults(mut self, defaults: CollectionDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn defaults(&self) -> &CollectionDefaults {
        &self.defaults
    }

    fn command_options(&self, timeout: Option<Duration>) -> CommandOptions {
        CommandOptions {
            timeout: timeout.or(self.defaults.timeout),
        }
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .field("executor", &"<CommandExecutor>")
            .finish()
    }
}

/// Result of `insert_one`
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    pub inserted_id: Value,
}

/// Result of `update_one`, `update_many` and `replace_one`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub upserted_id: Option<Value>,
}

impl UpdateResult {
    fn merge(&mut self, response: &RawResponse) {
        let Some(status) = &response.status else {
            return;
        };
        self.matched_count += status.matched_count.unwrap_or(0);
        self.modified_count += status.modified_count.unwrap_or(0);
        if let Some(id) = &status.upserted_id {
            self.upserted_count += 1;
            self.upserted_id = Some(id.clone());
        }
    }
}

/// Result of `delete_one` and `delete_many`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

impl DeleteResult {
    fn merge(&mut self, response: &RawResponse) {
        if let Some(count) = response.status.as_ref().and_then(|s| s.deleted_count) {
            self.deleted_count += count.max(0) as u64;
        }
    }
}
