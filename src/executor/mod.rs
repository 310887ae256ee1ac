//! Command execution contract
//!
//! The transport that actually talks to the service lives outside this crate.
//! It is plugged in through [`CommandExecutor`], which receives one typed
//! [`Command`] and answers with a [`RawResponse`] or a classified error.
//!
//! Everything in the core goes through [`run_command`], which:
//! - enforces the per-call timeout on the client side
//! - turns responses carrying an `errors` array into operational errors
//! - logs each exchange at debug level

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{DataApiError, DataApiResponseError, Result, TimeoutError};

pub mod command;
pub mod response;
pub mod status;

pub use command::Command;
pub use response::{ErrorDescriptor, RawResponse, ResponseData, ResponseStatus};
pub use status::{StatusSource, wait_for_status};

/// A JSON document as exchanged with the service
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Per-call options threaded through to the executor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    /// Maximum time to wait for the response; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl CommandOptions {
    /// Options with the given timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Sends commands to the remote service
///
/// Implementations are expected to:
/// - return `Ok` with the raw envelope whenever the service answered with a
///   well-formed response, including responses that carry an `errors` array
/// - return [`DataApiError::Http`], [`DataApiError::Transport`] or
///   [`DataApiError::Timeout`] for anything that prevented a well-formed answer
///
/// No retries happen at this layer.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute one command against the collection identified by `namespace`
    async fn execute(
        &self,
        namespace: &str,
        command: &Command,
        options: &CommandOptions,
    ) -> Result<RawResponse>;
}

/// Execute a command and classify its outcome
///
/// # Arguments
/// * `executor` - Transport implementation
/// * `namespace` - Target collection
/// * `command` - Command to send
/// * `options` - Per-call options (timeout)
///
/// # Returns
/// * `Result<RawResponse>` - Error-free response, or an operational / transport / timeout error
pub async fn run_command(
    executor: &dyn CommandExecutor,
    namespace: &str,
    command: &Command,
    options: &CommandOptions,
) -> Result<RawResponse> {
    debug!("Executing {} on '{}'", command.name(), namespace);

    let pending = executor.execute(namespace, command, options);
    let response = match options.timeout {
        Some(limit) => match tokio::time::timeout(limit, pending).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                debug!("{} on '{}' timed out after {:?}", command.name(), namespace, limit);
                return Err(TimeoutError::new(command.name(), limit).into());
            }
        },
        None => pending.await?,
    };

    if response.has_errors() {
        debug!(
            "{} on '{}' reported {} error(s)",
            command.name(),
            namespace,
            response.error_descriptors().len()
        );
        return Err(DataApiError::Response(DataApiResponseError::new(
            command.to_json(),
            response,
        )));
    }

    Ok(response)
}
