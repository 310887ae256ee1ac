use std::time::Duration;

use crate::executor::Document;

/// Query options carried by a find cursor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Maximum number of documents to yield; `0` means unbounded
    pub limit: u64,

    /// Number of leading documents the service should skip
    pub skip: Option<u64>,

    /// Sort specification, forwarded verbatim
    pub sort: Option<Document>,

    /// Projection specification, forwarded verbatim
    pub projection: Option<Document>,

    /// Ask the service to attach `$similarity` scores to vector-sorted results
    pub include_similarity: bool,
}

/// Options for a single-document query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneOptions {
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub include_similarity: bool,

    /// Request timeout, overriding the collection default
    pub timeout: Option<Duration>,
}
