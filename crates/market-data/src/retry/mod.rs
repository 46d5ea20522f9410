//! Retry/backoff executor shared by every adapter.
//!
//! [`retry_with_backoff`] drives one outbound operation with the owning
//! provider's [`RetryConfig`](crate::provider::RetryConfig) and classifier.
//! [`with_timeout_retry`] is a second, coarser layer for long-running remote
//! operations that need a hard per-attempt timeout.

mod coarse;

pub use coarse::{with_timeout_retry, CoarseRetryPolicy};

use std::future::Future;

use log::{error, warn};

use crate::errors::{ProviderError, UpstreamError};
use crate::provider::PortfolioProvider;

/// Run `op` until it succeeds, the failure is non-retryable, or the retry
/// budget is spent.
///
/// Failures are classified by `provider.classify_error`. `INVALID_SYMBOL` and
/// `AUTH_ERROR` are never retried, whatever the classifier's `retryable`
/// flag says. Retryable failures sleep for
/// `min(initial * multiplier^(attempt-1), max)` before the next attempt, for
/// at most `max_retries + 1` attempts in total. The last classified error is
/// returned unchanged.
pub async fn retry_with_backoff<P, T, F, Fut>(
    provider: &P,
    operation: &str,
    mut op: F,
) -> Result<T, ProviderError>
where
    P: PortfolioProvider + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let config = provider.retry_config();
    let mut attempt: u32 = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(raw) => {
                let classified = provider.classify_error(&raw);
                attempt += 1;

                let retryable = classified.retryable && !classified.code.is_terminal();
                if !retryable || attempt > config.max_retries {
                    error!(
                        "[{}] {} failed after {} attempt(s) [{}]: {}",
                        provider.id(),
                        operation,
                        attempt,
                        classified.code,
                        classified.message
                    );
                    return Err(classified);
                }

                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "[{}] {} failed (attempt {}/{}) [{}], retrying in {:?}",
                    provider.id(),
                    operation,
                    attempt,
                    config.max_retries,
                    classified.code,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
