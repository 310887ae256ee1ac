//! Data API Client Library
//!
//! This library provides the client-side core for a document database exposed
//! through a JSON command API: lazy paginated cursors, ordered and unordered
//! bulk mutations, and dotted-path value extraction. The transport is supplied
//! by the caller through [`executor::CommandExecutor`].
//!
//! # Modules
//!
//! - `bulk`: Bulk write and chunked insert orchestration
//! - `collection`: Collection handle and its operations
//! - `config`: Configuration management
//! - `cursor`: Lazy paginated find cursor
//! - `error`: Error types and handling
//! - `executor`: Commands, responses and the transport seam
//! - `logging`: Tracing subscriber setup
//! - `path`: Dotted-path value extraction
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dataapi_client::executor::{Command, CommandExecutor, CommandOptions, RawResponse};
//! use dataapi_client::{Collection, CollectionDefaults, Config, Result, doc};
//!
//! struct HttpExecutor;
//!
//! #[async_trait::async_trait]
//! impl CommandExecutor for HttpExecutor {
//!     async fn execute(
//!         &self,
//!         _namespace: &str,
//!         _command: &Command,
//!         _options: &CommandOptions,
//!     ) -> Result<RawResponse> {
//!         unimplemented!("POST command.to_json() to the service")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     dataapi_client::logging::init(&config.logging);
//!
//!     let users = Collection::new("users", Arc::new(HttpExecutor))
//!         .with_defaults(CollectionDefaults::from_config(&config));
//!
//!     let mut cursor = users.find(doc!({ "active": true })).limit(10)?;
//!     while let Some(user) = cursor.next().await? {
//!         println!("{}", user["name"]);
//!     }
//!     Ok(())
//! }
//! ```

pub mod bulk;
pub mod collection;
pub mod config;
pub mod cursor;
pub mod error;
pub mod executor;
pub mod logging;
pub mod path;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use bulk::{
    BulkOperation, BulkWriteOptions, BulkWriteResult, InsertManyOptions, InsertManyResult,
};
pub use collection::{
    CallOptions, Collection, CollectionDefaults, DeleteResult, InsertOneResult, UpdateResult,
};
pub use config::Config;
pub use cursor::{CursorState, FindCursor, FindOneOptions, FindOptions};
pub use error::{DataApiError, Result};
pub use executor::{Command, CommandExecutor, Document, RawResponse};

#[doc(hidden)]
pub use serde_json as __serde_json;

/// Build a [`Document`] from a JSON object literal
///
/// Panics when the literal is not an object.
///
/// ```
/// let filter = dataapi_client::doc!({ "status": "active", "age": { "$gt": 21 } });
/// assert_eq!(filter.len(), 2);
/// ```
#[macro_export]
macro_rules! doc {
    ($($json:tt)+) => {
        match $crate::__serde_json::json!($($json)+) {
            $crate::__serde_json::Value::Object(map) => map,
            other => panic!("doc! expects a JSON object, got {}", other),
        }
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}
