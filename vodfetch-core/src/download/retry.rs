use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::config::DownloadSection;

use super::{FetchError, FetchResult};

/// Shared retry settings for both the single-file and per-segment fetch
/// paths. Delay is fixed between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

impl From<&DownloadSection> for RetryPolicy {
    fn from(section: &DownloadSection) -> Self {
        Self {
            max_attempts: section.max_retries.max(1),
            delay: section.retry_delay(),
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or the policy is
/// exhausted. Only transient errors are retried.
pub(crate) async fn run_with_retry<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> FetchResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = FetchResult<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                if attempt >= attempts {
                    return Err(FetchError::Exhausted {
                        attempts,
                        last: Box::new(err),
                    });
                }
                warn!(attempt, max = attempts, error = %err, "retrying transient fetch failure");
                if !policy.delay.is_zero() {
                    sleep(policy.delay).await;
                }
            }
        }
    }
}
