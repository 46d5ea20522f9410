use std::future::Future;
use std::time::Duration;

use log::{info, warn};

use crate::errors::{ErrorCode, ProviderError};

/// Per-attempt timeout plus a fixed delay schedule for whole remote operations.
///
/// Sits above [`retry_with_backoff`](super::retry_with_backoff) for upstreams whose
/// work is asynchronous on their side and can take minutes to settle.
#[derive(Clone, Debug, PartialEq)]
pub struct CoarseRetryPolicy {
    pub attempt_timeout: Duration,
    /// Delay before each retry; total attempts = `delays.len() + 1`.
    pub delays: Vec<Duration>,
}

impl Default for CoarseRetryPolicy {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(30),
            delays: vec![
                Duration::from_secs(60),
                Duration::from_secs(120),
                Duration::from_secs(240),
            ],
        }
    }
}

/// Run `op` under `policy`, aborting any attempt that exceeds the timeout.
///
/// `INVALID_SYMBOL` and `AUTH_ERROR` failures end the loop immediately.
/// There is no external cancellation; only the timeout stops an attempt.
pub async fn with_timeout_retry<T, F, Fut>(
    provider: &str,
    policy: &CoarseRetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let total = policy.delays.len() + 1;
    let mut last_error = None;

    for attempt in 1..=total {
        let error = match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(Ok(value)) => {
                if attempt > 1 {
                    info!("[{}] {} succeeded on attempt {}", provider, operation, attempt);
                }
                return Ok(value);
            }
            Ok(Err(e)) if e.code.is_terminal() => return Err(e),
            Ok(Err(e)) => e,
            Err(_) => ProviderError::new(
                provider,
                ErrorCode::NetworkError,
                true,
                format!(
                    "{} timed out after {}s",
                    operation,
                    policy.attempt_timeout.as_secs()
                ),
            ),
        };

        if let Some(delay) = policy.delays.get(attempt - 1) {
            warn!(
                "[{}] {} attempt {}/{} failed: {}. Retrying in {}s",
                provider,
                operation,
                attempt,
                total,
                error.message,
                delay.as_secs()
            );
            tokio::time::sleep(*delay).await;
        }
        last_error = Some(error);
    }

    Err(last_error.unwrap_or_else(|| {
        ProviderError::not_configured(provider, format!("{} never ran", operation))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy() -> CoarseRetryPolicy {
        CoarseRetryPolicy {
            attempt_timeout: Duration::from_secs(30),
            delays: vec![
                Duration::from_secs(60),
                Duration::from_secs(120),
                Duration::from_secs(240),
            ],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_attempts_time_out_and_follow_schedule() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), _> = with_timeout_retry("SNAPTRADE", &policy(), "Holdings Fetch", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.code, ErrorCode::NetworkError);
        assert!(err.message.contains("timed out"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 4 timeouts of 30s plus 60 + 120 + 240 of waiting
        assert_eq!(start.elapsed(), Duration::from_secs(4 * 30 + 420));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_later_attempt() {
        let calls = AtomicU32::new(0);

        let result = with_timeout_retry("SNAPTRADE", &policy(), "Holdings Fetch", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ProviderError::new(
                        "SNAPTRADE",
                        ErrorCode::ServerError,
                        true,
                        "sync in progress",
                    ))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_error_stops_immediately() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_timeout_retry("SNAPTRADE", &policy(), "Holdings Fetch", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ProviderError::new(
                    "SNAPTRADE",
                    ErrorCode::AuthError,
                    false,
                    "bad signature",
                ))
            }
        })
        .await;

        assert_eq!(result.unwrap_err().code, ErrorCode::AuthError);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
