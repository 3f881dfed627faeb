//! Per-target circuit breaker.
//!
//! Three states: closed (calls pass, consecutive failures counted), open
//! (calls fail immediately for `reset_timeout`), half-open (exactly one
//! probe allowed; its outcome closes or re-opens the breaker).
//!
//! The breaker wraps the retry wrapper, never the other way around: one
//! logical RPC — retries included — is one attempt from the breaker's
//! perspective. Only transient (unavailable-class) outcomes count as
//! breaker failures; a logical error means the dependency answered and
//! resets the failure counter like a success.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tonic::Status;
use tracing::{info, warn};

use super::retry::is_retryable;

#[derive(Debug, Clone, Copy)]
enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant },
    HalfOpen,
}

/// Circuit breaker guarding one dependency.
pub struct CircuitBreaker {
    name: String,
    threshold: u32,
    reset_timeout: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            threshold,
            reset_timeout,
            state: Mutex::new(BreakerState::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    /// Execute one logical call through the breaker.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T, Status>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        self.admit()?;

        let result = f().await;
        self.record(&result);
        result
    }

    /// Gate keeping: constant-time check-and-transition under the lock.
    fn admit(&self) -> Result<(), Status> {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        match *state {
            BreakerState::Closed { .. } => Ok(()),
            BreakerState::Open { opened_at } => {
                if opened_at.elapsed() >= self.reset_timeout {
                    // This caller becomes the single half-open probe.
                    *state = BreakerState::HalfOpen;
                    info!(breaker = %self.name, "Circuit breaker half-open, probing");
                    Ok(())
                } else {
                    Err(self.open_status())
                }
            }
            // A probe is already in flight; everyone else fails fast.
            BreakerState::HalfOpen => Err(self.open_status()),
        }
    }

    fn record<T>(&self, result: &Result<T, Status>) {
        let mut state = self.state.lock().expect("breaker lock poisoned");

        let failed_transiently = matches!(result, Err(status) if is_retryable(status));

        match (*state, failed_transiently) {
            // The dependency answered: logical errors reset like successes.
            (BreakerState::Closed { .. }, false) => {
                *state = BreakerState::Closed {
                    consecutive_failures: 0,
                };
            }
            (BreakerState::Closed {
                consecutive_failures,
            }, true) => {
                let failures = consecutive_failures + 1;
                if failures >= self.threshold {
                    warn!(
                        breaker = %self.name,
                        failures,
                        "Circuit breaker opened"
                    );
                    *state = BreakerState::Open {
                        opened_at: Instant::now(),
                    };
                } else {
                    *state = BreakerState::Closed {
                        consecutive_failures: failures,
                    };
                }
            }
            (BreakerState::HalfOpen, false) => {
                info!(breaker = %self.name, "Circuit breaker closed after successful probe");
                *state = BreakerState::Closed {
                    consecutive_failures: 0,
                };
            }
            (BreakerState::HalfOpen, true) => {
                warn!(breaker = %self.name, "Probe failed, circuit breaker re-opened");
                *state = BreakerState::Open {
                    opened_at: Instant::now(),
                };
            }
            // record() only runs for admitted calls, so Open is unreachable;
            // keep it inert rather than panic.
            (BreakerState::Open { .. }, _) => {}
        }
    }

    fn open_status(&self) -> Status {
        Status::unavailable(format!("circuit breaker for {} is open", self.name))
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        matches!(
            *self.state.lock().unwrap(),
            BreakerState::Open { .. } | BreakerState::HalfOpen
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("test", 5, Duration::from_secs(30))
    }

    async fn fail(b: &CircuitBreaker, calls: &AtomicU32) -> Result<(), Status> {
        b.call(|| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Status::unavailable("down"))
        })
        .await
    }

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let b = breaker();
        let calls = AtomicU32::new(0);

        for _ in 0..5 {
            let _ = fail(&b, &calls).await;
        }
        assert!(b.is_open());
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        // Sixth call fails immediately without reaching the operation.
        let result = fail(&b, &calls).await;
        assert_eq!(result.unwrap_err().code(), tonic::Code::Unavailable);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn success_resets_the_failure_counter() {
        let b = breaker();
        let calls = AtomicU32::new(0);

        for _ in 0..4 {
            let _ = fail(&b, &calls).await;
        }
        b.call(|| async move { Ok::<_, Status>(()) }).await.unwrap();

        // Four more failures still do not open (counter was reset).
        for _ in 0..4 {
            let _ = fail(&b, &calls).await;
        }
        assert!(!b.is_open());
    }

    #[tokio::test]
    async fn logical_errors_do_not_trip_the_breaker() {
        let b = breaker();
        for _ in 0..10 {
            let result = b
                .call(|| async move { Err::<(), _>(Status::not_found("missing")) })
                .await;
            assert_eq!(result.unwrap_err().code(), tonic::Code::NotFound);
        }
        assert!(!b.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_probe_closes_on_success() {
        let b = breaker();
        let calls = AtomicU32::new(0);

        for _ in 0..5 {
            let _ = fail(&b, &calls).await;
        }
        assert!(b.is_open());

        tokio::time::advance(Duration::from_secs(30)).await;

        // Exactly one probe is admitted and succeeds; breaker closes.
        b.call(|| async move { Ok::<_, Status>(()) }).await.unwrap();
        assert!(!b.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_probe_failure_reopens() {
        let b = breaker();
        let calls = AtomicU32::new(0);

        for _ in 0..5 {
            let _ = fail(&b, &calls).await;
        }
        tokio::time::advance(Duration::from_secs(30)).await;

        let _ = fail(&b, &calls).await;
        assert!(b.is_open());

        // Still open: the failed probe restarted the reset clock.
        let result = fail(&b, &calls).await;
        assert_eq!(result.unwrap_err().code(), tonic::Code::Unavailable);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }
}
