//! Ordered and unordered execution of independent write units
//!
//! A unit is one command: a single bulk operation or one chunk of an
//! insert-many. Units are executed either:
//! - ordered: one after another, stopping at the first operational failure
//! - unordered: by a fixed pool of workers pulling the next unit index from a
//!   shared counter; operational failures and timeouts are recorded and the
//!   worker moves on
//!
//! In both modes a transport error aborts the whole run immediately.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::try_join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::accumulator::Accumulator;
use crate::error::{DataApiError, OperationFailure, Result};
use crate::executor::{Command, CommandExecutor, CommandOptions, run_command};

/// How a run schedules its units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Sequential, stop at the first failure
    Ordered,

    /// Up to `concurrency` units in flight, failures do not stop the run
    Unordered { concurrency: usize },
}

/// One command of a run, tagged with its index in the caller's input
#[derive(Debug, Clone)]
pub(crate) struct Unit {
    pub index: usize,
    pub command: Command,
    pub upsert: bool,
}

impl Unit {
    pub fn new(index: usize, command: Command) -> Self {
        let upsert = command.is_upsert();
        Self {
            index,
            command,
            upsert,
        }
    }
}

/// Accumulated result plus the failures recorded along the way
#[derive(Debug)]
pub(crate) struct RunOutcome<A> {
    pub result: A,
    pub failures: Vec<OperationFailure>,
}

impl<A: Accumulator> RunOutcome<A> {
    fn new() -> Self {
        Self {
            result: A::default(),
            failures: Vec::new(),
        }
    }
}

pub(crate) struct Orchestrator<'a> {
    executor: &'a dyn CommandExecutor,
    namespace: &'a str,
    options: &'a CommandOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        executor: &'a dyn CommandExecutor,
        namespace: &'a str,
        options: &'a CommandOptions,
    ) -> Self {
        Self {
            executor,
            namespace,
            options,
        }
    }

    /// Execute every unit according to `mode`
    ///
    /// # Returns
    /// * `Result<RunOutcome<A>>` - Merged result and recorded failures, or the
    ///   first transport error
    pub async fn run<A: Accumulator>(
        &self,
        units: Vec<Unit>,
        mode: ExecutionMode,
    ) -> Result<RunOutcome<A>> {
        let run_id = Uuid::new_v4();
        debug!(
            "Run {} on '{}': {} unit(s), mode {:?}",
            run_id,
            self.namespace,
            units.len(),
            mode
        );

        let total = units.len();
        let outcome = match mode {
            ExecutionMode::Ordered => self.run_ordered(units).await,
            ExecutionMode::Unordered { concurrency } => {
                self.run_unordered(units, concurrency).await
            }
        };

        match &outcome {
            Ok(outcome) => info!(
                "Run {} on '{}' finished: {} unit(s), {} failure(s)",
                run_id,
                self.namespace,
                total,
                outcome.failures.len()
            ),
            Err(e) => warn!("Run {} on '{}' aborted: {}", run_id, self.namespace, e),
        }
        outcome
    }

    async fn run_ordered<A: Accumulator>(&self, units: Vec<Unit>) -> Result<RunOutcome<A>> {
        let mut outcome = RunOutcome::<A>::new();

        for unit in units {
            match run_command(self.executor, self.namespace, &unit.command, self.options).await {
                Ok(response) => {
                    outcome
                        .result
                        .merge_status(unit.index, unit.upsert, &response);
                    outcome.result.record_response(response);
                }
                Err(DataApiError::Response(err)) => {
                    warn!(
                        "Unit {} ({}) failed, stopping ordered run: {}",
                        unit.index,
                        unit.command.name(),
                        err
                    );
                    outcome
                        .result
                        .merge_status(unit.index, unit.upsert, err.raw_response());
                    outcome.failures.push(OperationFailure::new(
                        unit.index,
                        unit.command,
                        DataApiError::Response(err),
                    ));
                    break;
                }
                Err(other) => return Err(other),
            }
        }

        Ok(outcome)
    }

    async fn run_unordered<A: Accumulator>(
        &self,
        units: Vec<Unit>,
        concurrency: usize,
    ) -> Result<RunOutcome<A>> {
        if concurrency == 0 {
            return Err(DataApiError::InvalidArgument(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let workers = concurrency.min(units.len());
        let cursor = AtomicUsize::new(0);
        let shared = Mutex::new(RunOutcome::<A>::new());

        {
            let units = &units;
            let cursor = &cursor;
            let shared = &shared;

            let worker = move |worker_id: usize| async move {
                loop {
                    let position = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(unit) = units.get(position) else {
                        break;
                    };

                    match run_command(self.executor, self.namespace, &unit.command, self.options)
                        .await
                    {
                        Ok(response) => {
                            let mut guard = shared.lock().await;
                            guard.result.merge_status(unit.index, unit.upsert, &response);
                            guard.result.record_response(response);
                        }
                        Err(e) if e.is_response_error() || e.is_timeout() => {
                            warn!(
                                "Worker {} recorded failure of unit {} ({}): {}",
                                worker_id,
                                unit.index,
                                unit.command.name(),
                                e
                            );
                            let mut guard = shared.lock().await;
                            if let Some(raw) = e.raw_response() {
                                guard.result.merge_status(unit.index, unit.upsert, raw);
                            }
                            guard.failures.push(OperationFailure::new(
                                unit.index,
                                unit.command.clone(),
                                e,
                            ));
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok::<(), DataApiError>(())
            };

            try_join_all((0..workers).map(worker)).await?;
        }

        let mut outcome = shared.into_inner();
        outcome.failures.sort_by_key(|failure| failure.index);
        Ok(outcome)
    }
}
