//! Retry with exponential backoff and jitter for gRPC calls.
//!
//! One logical RPC makes up to `max_attempts` physical attempts. Between
//! attempts it waits `min(cap, base * 2^(attempt-1)) * (1 + jitter)` where
//! jitter is uniform in [0, 0.5]. Only transient conditions are retried;
//! logical errors pass through untouched.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tonic::{Code, Status};
use tracing::{info, warn};

/// Retry behavior for one client target.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum attempts including the original call.
    pub max_attempts: u32,
    /// Backoff base; the wait before retry n is `base * 2^(n-1)`.
    pub base: Duration,
    /// Backoff cap applied before jitter.
    pub cap: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(1),
            cap: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Backoff before the retry following the `attempt`-th failure
    /// (1-based), jitter included.
    fn backoff_duration(&self, attempt: u32) -> Duration {
        let exp = self.base.as_secs_f64() * 2f64.powi(attempt.saturating_sub(1) as i32);
        let capped = exp.min(self.cap.as_secs_f64());
        let jitter: f64 = rand::thread_rng().gen_range(0.0..=0.5);
        Duration::from_secs_f64(capped * (1.0 + jitter))
    }
}

/// Whether a status is a transient condition worth retrying: transport
/// failures, deadline expiry, and unavailable / resource-exhausted-class
/// server responses. Logical errors (not-found, invalid-argument,
/// failed-precondition, auth) are never retried.
pub fn is_retryable(status: &Status) -> bool {
    matches!(
        status.code(),
        Code::Unavailable | Code::ResourceExhausted | Code::DeadlineExceeded | Code::Unknown
    )
}

/// Execute a gRPC call with retry.
pub async fn retry_rpc<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    f: F,
) -> Result<T, Status>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, Status>>,
{
    let mut attempt: u32 = 1;

    loop {
        match f().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        operation = operation_name,
                        attempt, "RPC succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(status) => {
                if !is_retryable(&status) {
                    return Err(status);
                }

                if attempt >= config.max_attempts {
                    warn!(
                        operation = operation_name,
                        attempt,
                        code = ?status.code(),
                        message = status.message(),
                        "RPC failed after max attempts"
                    );
                    return Err(status);
                }

                let backoff = config.backoff_duration(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    code = ?status.code(),
                    backoff_ms = backoff.as_millis() as u64,
                    "RPC failed, retrying after backoff"
                );

                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn retryable_codes() {
        assert!(is_retryable(&Status::unavailable("down")));
        assert!(is_retryable(&Status::resource_exhausted("rate limited")));
        assert!(is_retryable(&Status::deadline_exceeded("timeout")));
        assert!(!is_retryable(&Status::not_found("missing")));
        assert!(!is_retryable(&Status::failed_precondition("shortfall")));
        assert!(!is_retryable(&Status::unauthenticated("bad secret")));
    }

    #[test]
    fn backoff_grows_exponentially_within_bounds() {
        let config = RetryConfig::default();

        let first = config.backoff_duration(1);
        assert!(first >= Duration::from_secs(1) && first <= Duration::from_millis(1500));

        let second = config.backoff_duration(2);
        assert!(second >= Duration::from_secs(2) && second <= Duration::from_secs(3));
    }

    #[test]
    fn backoff_respects_the_cap() {
        let config = RetryConfig::default();
        // 2^9 seconds would be far past the 10s cap.
        let late = config.backoff_duration(10);
        assert!(late <= Duration::from_secs(15));
        assert!(late >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn first_attempt_success_needs_no_retry() {
        let result =
            retry_rpc(&RetryConfig::default(), "op", || async move { Ok::<_, Status>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn logical_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = retry_rpc(&RetryConfig::default(), "op", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Status::not_found("missing"))
        })
        .await;
        assert_eq!(result.unwrap_err().code(), Code::NotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_retry_up_to_max_attempts() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = retry_rpc(&RetryConfig::default(), "op", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Status::unavailable("down"))
        })
        .await;
        assert_eq!(result.unwrap_err().code(), Code::Unavailable);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_when_a_later_attempt_succeeds() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = retry_rpc(&RetryConfig::default(), "op", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Status::unavailable("down"))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
