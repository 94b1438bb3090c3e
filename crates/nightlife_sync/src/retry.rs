//! Bounded retry around a single backend call.

use crate::config::RetryConfig;
use crate::error::{DataError, DataResult};
use std::future::Future;
use std::time::Duration;

/// Runs `op` until it succeeds, fails with a non-retryable error or the
/// attempt budget is spent. Each attempt is bounded by `timeout`; a timeout
/// counts as a retryable network error.
///
/// Returns the final result and the number of attempts made.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryConfig,
    timeout: Duration,
    mut op: F,
    mut on_retry: impl FnMut(u32, &DataError),
) -> (DataResult<T>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DataResult<T>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        let result = match tokio::time::timeout(timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(DataError::network_retryable(format!(
                "request timed out after {}ms",
                timeout.as_millis()
            ))),
        };
        match result {
            Err(err) if err.is_retryable() && policy.allows_another(attempts) => {
                on_retry(attempts, &err);
                tokio::time::sleep(policy.delay_for_attempt(attempts)).await;
            }
            other => return (other, attempts),
        }
    }
}
