//! Bulk mutation orchestration
//!
//! This module runs batches of independent writes:
//! - `bulk_write`: arbitrary insert / update / replace / delete operations
//! - `insert_many`: documents split into fixed-size chunks, one request per chunk
//!
//! Both go through the same [`orchestrator`], so ordered and unordered
//! semantics are identical for operations and chunks. Partial failures come
//! back as a single aggregated error carrying everything that succeeded.
//!
//! Unordered runs give no ordering guarantee between operations. An insert and
//! a delete of the same document queued in one unordered batch race.

use std::time::Duration;

use tracing::debug;

use crate::error::{BulkWriteError, DataApiError, InsertManyError, Result};
use crate::executor::{Command, CommandExecutor, CommandOptions, Document};

mod accumulator;
mod operation;
pub(crate) mod orchestrator;

pub use accumulator::{BulkWriteResult, InsertManyResult};
pub use operation::BulkOperation;
pub use orchestrator::ExecutionMode;

use orchestrator::{Orchestrator, Unit};

/// Default number of workers for unordered runs
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default number of documents per insert-many request, the service's batch limit
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Options for [`bulk_write`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteOptions {
    /// Execute sequentially and stop at the first failure
    pub ordered: bool,

    /// Worker count for unordered runs; defaults to [`DEFAULT_CONCURRENCY`]
    pub concurrency: Option<usize>,

    /// Timeout applied to each request
    pub timeout: Option<Duration>,
}

/// Options for [`insert_many`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertManyOptions {
    /// Execute chunks sequentially and stop at the first failure
    pub ordered: bool,

    /// Documents per request; defaults to [`DEFAULT_CHUNK_SIZE`]
    pub chunk_size: Option<usize>,

    /// Worker count for unordered runs; defaults to [`DEFAULT_CONCURRENCY`]
    pub concurrency: Option<usize>,

    /// Timeout applied to each request
    pub timeout: Option<Duration>,
}

/// Resolve the execution mode, rejecting contradictory options
fn execution_mode(ordered: bool, concurrency: Option<usize>) -> Result<ExecutionMode> {
    match (ordered, concurrency) {
        (_, Some(0)) => Err(DataApiError::InvalidArgument(
            "concurrency must be at least 1".to_string(),
        )),
        (true, Some(n)) if n > 1 => Err(DataApiError::InvalidArgument(
            "ordered execution cannot use a concurrency greater than 1".to_string(),
        )),
        (true, _) => Ok(ExecutionMode::Ordered),
        (false, concurrency) => Ok(ExecutionMode::Unordered {
            concurrency: concurrency.unwrap_or(DEFAULT_CONCURRENCY),
        }),
    }
}

/// Execute a batch of write operations
///
/// # Arguments
/// * `executor` - Transport implementation
/// * `namespace` - Target collection
/// * `operations` - Operations in caller order; indices in the result refer to this slice
/// * `options` - Mode, concurrency and per-request timeout
///
/// # Returns
/// * `Result<BulkWriteResult>` - Totals, or [`DataApiError::BulkWrite`] with the
///   partial result when at least one operation failed
pub async fn bulk_write(
    executor: &dyn CommandExecutor,
    namespace: &str,
    operations: &[BulkOperation],
    options: &BulkWriteOptions,
) -> Result<BulkWriteResult> {
    let mode = execution_mode(options.ordered, options.concurrency)?;

    // Every operation is validated before anything is sent
    let units = operations
        .iter()
        .enumerate()
        .map(|(index, op)| {
            op.to_command().map(|command| Unit {
                index,
                command,
                upsert: op.is_upsert(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if units.is_empty() {
        return Ok(BulkWriteResult::default());
    }

    let command_options = CommandOptions {
        timeout: options.timeout,
    };
    let outcome = Orchestrator::new(executor, namespace, &command_options)
        .run::<BulkWriteResult>(units, mode)
        .await?;

    if outcome.failures.is_empty() {
        Ok(outcome.result)
    } else {
        Err(BulkWriteError {
            partial_result: outcome.result,
            failures: outcome.failures,
        }
        .into())
    }
}

/// Insert documents in chunks
///
/// Each chunk is one `insertMany` request and one unit for orchestration
/// purposes: in unordered mode a failed chunk does not block the others, in
/// ordered mode it stops the remaining chunks.
///
/// # Returns
/// * `Result<InsertManyResult>` - Inserted ids, or [`DataApiError::InsertMany`]
///   with the partial result
pub async fn insert_many(
    executor: &dyn CommandExecutor,
    namespace: &str,
    documents: Vec<Document>,
    options: &InsertManyOptions,
) -> Result<InsertManyResult> {
    let mode = execution_mode(options.ordered, options.concurrency)?;
    let chunk_size = options.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
    if chunk_size == 0 {
        return Err(DataApiError::InvalidArgument(
            "chunk size must be at least 1".to_string(),
        ));
    }

    if documents.is_empty() {
        return Ok(InsertManyResult::default());
    }

    let units = documents
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, chunk)| {
            Command::insert_many(chunk.to_vec(), options.ordered)
                .map(|command| Unit::new(index, command))
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "Inserting {} document(s) into '{}' as {} chunk(s) of up to {}",
        documents.len(),
        namespace,
        units.len(),
        chunk_size
    );

    let command_options = CommandOptions {
        timeout: options.timeout,
    };
    let outcome = Orchestrator::new(executor, namespace, &command_options)
        .run::<InsertManyResult>(units, mode)
        .await?;

    if outcome.failures.is_empty() {
        Ok(outcome.result)
    } else {
        Err(InsertManyError {
            partial_result: outcome.result,
            failures: outcome.failures,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::test_support::InMemoryExecutor;
    use serde_json::json;

    fn insert(id: &str) -> BulkOperation {
        BulkOperation::InsertOne {
            document: doc!({ "_id": id, "name": id }),
        }
    }

    fn bulk_error(err: DataApiError) -> BulkWriteError {
        match err {
            DataApiError::BulkWrite(e) => e,
            other => panic!("expected bulk write error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ordered_stops_at_first_failure() {
        let executor = InMemoryExecutor::new();
        let ops = vec![insert("A"), insert("A"), insert("B")];
        let options = BulkWriteOptions {
            ordered: true,
            ..BulkWriteOptions::default()
        };

        let err = bulk_error(
            bulk_write(&executor, "users", &ops, &options)
                .await
                .unwrap_err(),
        );

        assert_eq!(err.partial_result.inserted_count, 1);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].index, 1);
        assert!(err.failures[0].raw_response().is_some());
        assert_eq!(executor.calls("insertOne"), 2);
        assert_eq!(executor.count("users"), 1);
    }

    #[tokio::test]
    async fn test_unordered_records_failures_and_continues() {
        let executor = InMemoryExecutor::new();
        let ops = vec![insert("A"), insert("A"), insert("B")];
        let options = BulkWriteOptions {
            concurrency: Some(2),
            ..BulkWriteOptions::default()
        };

        let err = bulk_error(
            bulk_write(&executor, "users", &ops, &options)
                .await
                .unwrap_err(),
        );

        assert_eq!(err.partial_result.inserted_count, 2);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(executor.count("users"), 2);
        assert_eq!(executor.calls("insertOne"), 3);
    }

    #[tokio::test]
    async fn test_mixed_operations_merge_counters() {
        let executor = InMemoryExecutor::new();
        executor.seed(
            "users",
            vec![
                doc!({ "_id": 1, "group": "x" }),
                doc!({ "_id": 2, "group": "x" }),
                doc!({ "_id": 3, "group": "y" }),
            ],
        );
        let ops = vec![
            BulkOperation::UpdateMany {
                filter: doc!({ "group": "x" }),
                update: doc!({ "$set": { "seen": true } }),
                upsert: false,
            },
            BulkOperation::UpdateOne {
                filter: doc!({ "_id": 99 }),
                update: doc!({ "$set": { "group": "z" } }),
                upsert: true,
            },
            BulkOperation::DeleteOne {
                filter: doc!({ "_id": 3 }),
            },
            insert("new"),
        ];

        let result = bulk_write(&executor, "users", &ops, &BulkWriteOptions::default())
            .await
            .unwrap();

        assert_eq!(result.matched_count, 2);
        assert_eq!(result.modified_count, 2);
        assert_eq!(result.deleted_count, 1);
        assert_eq!(result.inserted_count, 1);
        assert_eq!(result.upserted_count, 1);
        assert_eq!(result.upserted_ids.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(result.inserted_ids.get(&3), Some(&json!("new")));
        assert_eq!(result.responses.len(), 4);
    }

    #[tokio::test]
    async fn test_unordered_respects_concurrency_bound() {
        let executor = InMemoryExecutor::new().with_latency(std::time::Duration::from_millis(10));
        let ops: Vec<_> = (0..12).map(|i| insert(&format!("doc-{i}"))).collect();
        let options = BulkWriteOptions {
            concurrency: Some(3),
            ..BulkWriteOptions::default()
        };

        let result = bulk_write(&executor, "users", &ops, &options).await.unwrap();

        assert_eq!(result.inserted_count, 12);
        assert!(executor.max_in_flight() <= 3);
        assert!(executor.max_in_flight() >= 2);
    }

    #[tokio::test]
    async fn test_transport_error_aborts_unordered_run() {
        let executor = InMemoryExecutor::new();
        executor.fail_next("insertOne");
        let ops = vec![insert("A"), insert("B")];

        let err = bulk_write(
            &executor,
            "users",
            &ops,
            &BulkWriteOptions {
                concurrency: Some(1),
                ..BulkWriteOptions::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DataApiError::Http { .. }));
    }

    #[tokio::test]
    async fn test_timeouts_recorded_in_unordered_mode() {
        let executor = InMemoryExecutor::new().with_latency(std::time::Duration::from_millis(200));
        let ops = vec![insert("A"), insert("B")];
        let options = BulkWriteOptions {
            timeout: Some(std::time::Duration::from_millis(5)),
            ..BulkWriteOptions::default()
        };

        let err = bulk_error(bulk_write(&executor, "users", &ops, &options).await.unwrap_err());
        assert_eq!(err.failures.len(), 2);
        assert!(err.failures.iter().all(|f| f.error.is_timeout()));
        assert!(err.failures.iter().all(|f| f.raw_response().is_none()));
    }

    #[tokio::test]
    async fn test_timeout_aborts_ordered_mode() {
        let executor = InMemoryExecutor::new().with_latency(std::time::Duration::from_millis(200));
        let ops = vec![insert("A"), insert("B")];
        let options = BulkWriteOptions {
            ordered: true,
            timeout: Some(std::time::Duration::from_millis(5)),
            ..BulkWriteOptions::default()
        };

        let err = bulk_write(&executor, "users", &ops, &options).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(executor.calls("insertOne"), 1);
    }

    #[tokio::test]
    async fn test_invalid_operation_fails_before_sending() {
        let executor = InMemoryExecutor::new();
        let ops = vec![
            insert("A"),
            BulkOperation::UpdateOne {
                filter: doc!({}),
                update: doc!({ "plain": 1 }),
                upsert: false,
            },
        ];

        let err = bulk_write(&executor, "users", &ops, &BulkWriteOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DataApiError::InvalidArgument(_)));
        assert_eq!(executor.total_calls(), 0);
    }

    #[test]
    fn test_execution_mode_resolution() {
        assert_eq!(execution_mode(true, None).unwrap(), ExecutionMode::Ordered);
        assert_eq!(execution_mode(true, Some(1)).unwrap(), ExecutionMode::Ordered);
        assert!(execution_mode(true, Some(4)).is_err());
        assert!(execution_mode(false, Some(0)).is_err());
        assert_eq!(
            execution_mode(false, None).unwrap(),
            ExecutionMode::Unordered {
                concurrency: DEFAULT_CONCURRENCY
            }
        );
    }

    #[tokio::test]
    async fn test_insert_many_chunks_unordered() {
        let executor = InMemoryExecutor::new();
        executor.seed("users", vec![doc!({ "_id": 7 })]);
        let docs: Vec<Document> = (0..25).map(|i| doc!({ "_id": i })).collect();
        let options = InsertManyOptions {
            chunk_size: Some(10),
            concurrency: Some(2),
            ..InsertManyOptions::default()
        };

        let err = match insert_many(&executor, "users", docs, &options).await {
            Err(DataApiError::InsertMany(e)) => e,
            other => panic!("expected insert many error, got {other:?}"),
        };

        assert_eq!(executor.calls("insertMany"), 3);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].index, 0);
        // The failing chunk still inserted its other nine documents
        assert_eq!(err.partial_result.inserted_count, 24);
        assert_eq!(executor.count("users"), 25);
    }

    #[tokio::test]
    async fn test_insert_many_ordered_stops_subsequent_chunks() {
        let executor = InMemoryExecutor::new();
        executor.seed("users", vec![doc!({ "_id": 12 })]);
        let docs: Vec<Document> = (0..30).map(|i| doc!({ "_id": i })).collect();
        let options = InsertManyOptions {
            ordered: true,
            chunk_size: Some(10),
            ..InsertManyOptions::default()
        };

        let err = match insert_many(&executor, "users", docs, &options).await {
            Err(DataApiError::InsertMany(e)) => e,
            other => panic!("expected insert many error, got {other:?}"),
        };

        assert_eq!(executor.calls("insertMany"), 2);
        assert_eq!(err.failures[0].index, 1);
        assert_eq!(err.partial_result.inserted_count, 12);
        let expected: Vec<_> = (0..12).map(|i| json!(i)).collect();
        assert_eq!(err.partial_result.inserted_ids, expected);
    }

    #[tokio::test]
    async fn test_insert_many_success_and_validation() {
        let executor = InMemoryExecutor::new();
        let docs: Vec<Document> = (0..120).map(|i| doc!({ "_id": i })).collect();

        let result = insert_many(&executor, "users", docs, &InsertManyOptions::default())
            .await
            .unwrap();
        assert_eq!(result.inserted_count, 120);
        assert_eq!(executor.calls("insertMany"), 3);

        let err = insert_many(
            &executor,
            "users",
            vec![doc!({})],
            &InsertManyOptions {
                chunk_size: Some(0),
                ..InsertManyOptions::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DataApiError::InvalidArgument(_)));
    }
}
