use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::PriceError;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// Bounded retry with a fixed pause between attempts.
///
/// Only [`PriceError::TransientNetwork`] is retried. The pause is a
/// `tokio::time::sleep`, so a caller running on a shared executor yields
/// while waiting. Worst case sleeping time is `(max_attempts - 1) * delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or the budget is spent.
    pub async fn execute<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, PriceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PriceError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(what, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    if attempt >= max_attempts {
                        warn!(what, attempts = attempt, error = %e, "retry budget exhausted");
                        return Err(PriceError::Exhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }

                    debug!(
                        what,
                        attempt,
                        max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;

    fn flaky(calls: &AtomicU32, failures: u32) -> Result<&'static str, PriceError> {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < failures {
            Err(PriceError::TransientNetwork("reset".into()))
        } else {
            Ok("ok")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_last_attempt_after_max_minus_one_delays() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let started = Instant::now();

        let out = policy
            .execute("flaky", move || async move { flaky(counter, 2) })
            .await
            .unwrap();

        assert_eq!(out, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_permanent() {
        let policy = RetryPolicy::new(2, Duration::from_secs(1));
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let started = Instant::now();

        let err = policy
            .execute("down", move || async move { flaky(counter, u32::MAX) })
            .await
            .unwrap_err();

        assert!(matches!(err, PriceError::Exhausted { attempts: 2, .. }));
        assert!(!err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let started = Instant::now();

        let err = policy
            .execute("bad", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(PriceError::UpstreamMalformed("html".into()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PriceError::UpstreamMalformed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
