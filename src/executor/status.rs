//! Waiting for a remote resource to reach a status
//!
//! Lifecycle operations (creating a keyspace, a collection, ...) complete
//! asynchronously on the service. The administrative layer that issues them is
//! out of this crate; it only supplies a [`StatusSource`] that reports the
//! current status string of a resource.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{DataApiError, Result, TimeoutError};

/// Reports the current status of a remote resource
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch the status of `resource`, e.g. `"PENDING"` or `"ACTIVE"`
    async fn fetch_status(&self, resource: &str) -> Result<String>;
}

/// Poll `source` until `resource` reports `target`
///
/// # Arguments
/// * `source` - Status provider
/// * `resource` - Resource identifier
/// * `target` - Status to wait for
/// * `poll_interval` - Delay between polls
/// * `timeout` - Overall deadline
///
/// # Returns
/// * `Result<()>` - Ok once the target is reached, a timeout error otherwise
pub async fn wait_for_status(
    source: &dyn StatusSource,
    resource: &str,
    target: &str,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<()> {
    if poll_interval.is_zero() {
        return Err(DataApiError::InvalidArgument(
            "poll interval must be greater than zero".to_string(),
        ));
    }

    let deadline = Instant::now() + timeout;
    let mut polls = 0u32;

    loop {
        let status = source.fetch_status(resource).await?;
        polls += 1;
        debug!("Resource '{}' is {} (poll #{})", resource, status, polls);

        if status == target {
            return Ok(());
        }

        if Instant::now() + poll_interval > deadline {
            return Err(TimeoutError::new("waitForStatus", timeout).into());
        }
        tokio::time::sleep(poll_interval).await;
    }
}
