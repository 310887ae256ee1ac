//! Error handling module for client operations.
//!
//! This module provides:
//! - A single crate-wide error type separating operational, transport and
//!   contract-violation failures
//! - Structured access to the service's `errors` array, with JSON rendering
//!   for logging and APIs
//! - Aggregated errors for multi-request operations that carry partial results
//!
//! # Example
//!
//! ```rust,no_run
//! use dataapi_client::error::DataApiError;
//!
//! fn report(err: &DataApiError) {
//!     match err {
//!         DataApiError::BulkWrite(bulk) => {
//!             println!("{} succeeded before failure", bulk.partial_result.inserted_count);
//!             for failure in &bulk.failures {
//!                 println!("operation {} failed: {}", failure.index, failure.error);
//!             }
//!         }
//!         DataApiError::Response(response) => {
//!             println!("{}", response.to_info().to_json().unwrap_or_default());
//!         }
//!         other => println!("{other}"),
//!     }
//! }
//! ```

pub mod aggregate;
pub mod kinds;
pub mod response;

// Re-export commonly used types
pub use aggregate::{
    BulkWriteError, DeleteManyError, InsertManyError, OperationFailure, UpdateManyError,
};
pub use kinds::{ConfigError, CursorError, DataApiError, Result, TimeoutError};
pub use response::{DataApiResponseError, ErrorInfo};
