//! Errors for operations that span several requests.
//!
//! Each error keeps everything that succeeded before (or despite) the failure,
//! so callers can decide whether to retry only the failed subset.

use std::fmt;

use super::kinds::DataApiError;
use crate::bulk::{BulkWriteResult, InsertManyResult};
use crate::collection::{DeleteResult, UpdateResult};
use crate::executor::{Command, RawResponse};

/// One failed unit of a bulk run
#[derive(Debug)]
pub struct OperationFailure {
    /// Index of the operation (or chunk) in the caller's input
    pub index: usize,

    /// The command that failed
    pub command: Command,

    /// Why it failed: an operational error or a timeout
    pub error: DataApiError,
}

impl OperationFailure {
    pub fn new(index: usize, command: Command, error: DataApiError) -> Self {
        Self {
            index,
            command,
            error,
        }
    }

    /// Raw failure response, absent for timeouts
    pub fn raw_response(&self) -> Option<&RawResponse> {
        self.error.raw_response()
    }
}

/// A bulk write where at least one operation failed
#[derive(Debug)]
pub struct BulkWriteError {
    /// Effects of every operation that succeeded
    pub partial_result: BulkWriteResult,

    /// Failed operations, ordered by index
    pub failures: Vec<OperationFailure>,
}

/// An insert-many where at least one chunk failed
#[derive(Debug)]
pub struct InsertManyError {
    /// Documents inserted before or despite the failures
    pub partial_result: InsertManyResult,

    /// Failed chunks, ordered by chunk index
    pub failures: Vec<OperationFailure>,
}

/// An update-many that failed part way through its pages
#[derive(Debug)]
pub struct UpdateManyError {
    pub partial_result: UpdateResult,
    pub cause: Box<DataApiError>,
}

/// A delete-many that failed part way through its pages
#[derive(Debug)]
pub struct DeleteManyError {
    pub partial_result: DeleteResult,
    pub cause: Box<DataApiError>,
}

fn write_first_failure(f: &mut fmt::Formatter<'_>, failures: &[OperationFailure]) -> fmt::Result {
    if let Some(first) = failures.first() {
        write!(f, "; first failure at index {}: {}", first.index, first.error)?;
    }
    Ok(())
}

impl fmt::Display for BulkWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bulk write failed for {} operation(s)", self.failures.len())?;
        write_first_failure(f, &self.failures)
    }
}

impl fmt::Display for InsertManyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Insert many failed for {} chunk(s) after inserting {} document(s)",
            self.failures.len(),
            self.partial_result.inserted_count
        )?;
        write_first_failure(f, &self.failures)
    }
}

impl fmt::Display for UpdateManyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Update many failed after modifying {} document(s): {}",
            self.partial_result.modified_count, self.cause
        )
    }
}

impl fmt::Display for DeleteManyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Delete many failed after deleting {} document(s): {}",
            self.partial_result.deleted_count, self.cause
        )
    }
}

impl std::error::Error for BulkWriteError {}
impl std::error::Error for InsertManyError {}
impl std::error::Error for UpdateManyError {}
impl std::error::Error for DeleteManyError {}
