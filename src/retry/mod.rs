/// Retry executor with exponential backoff and jitter
///
/// Wraps a fallible async operation with bounded retries. The delay after
/// failed attempt n is `base_delay * 2^(n-1)`, capped at `max_delay`, plus
/// uniform jitter in `[0, delay * jitter_fraction]` so that many concurrent
/// callers do not retry in lockstep.
///
/// Only the calling task suspends between attempts. Dropping the returned
/// future cancels the sequence; no further attempts are issued.
use crate::config::RetrySettings;
use crate::errors::{MiddlewareError, MiddlewareResult};
use crate::logger::{self, LogTag};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

// Exponent clamp keeps the shift well-defined; max_delay caps the result
// long before this matters for any sane configuration.
const MAX_BACKOFF_EXPONENT: u32 = 20;

pub struct RetryExecutor {
    settings: RetrySettings,
}

impl RetryExecutor {
    /// Create an executor, validating the backoff parameters up front
    pub fn new(settings: RetrySettings) -> MiddlewareResult<Self> {
        if settings.max_attempts == 0 {
            return Err(MiddlewareError::Configuration(
                "retry max_attempts must be greater than 0".to_string(),
            ));
        }
        if settings.base_delay_ms == 0 {
            return Err(MiddlewareError::Configuration(
                "retry base_delay must be greater than 0".to_string(),
            ));
        }
        if settings.max_delay_ms < settings.base_delay_ms {
            return Err(MiddlewareError::Configuration(
                "retry max_delay must be at least base_delay".to_string(),
            ));
        }
        if !settings.jitter_fraction.is_finite() || settings.jitter_fraction < 0.0 {
            return Err(MiddlewareError::Configuration(
                "retry jitter_fraction must be a finite value >= 0".to_string(),
            ));
        }
        Ok(Self { settings })
    }

    pub fn max_attempts(&self) -> u32 {
        self.settings.max_attempts
    }

    /// Run the operation, retrying on failure up to `max_attempts` times
    ///
    /// On terminal failure the last underlying error is returned, never
    /// swallowed. `max_attempts = 1` performs no retry at all.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> MiddlewareResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.settings.max_attempts {
                        logger::warning(
                            LogTag::Retry,
                            &format!(
                                "retries exhausted after {} attempt(s): {}",
                                attempt, err
                            ),
                        );
                        return Err(MiddlewareError::FetchFailed {
                            attempts: attempt,
                            source: err,
                        });
                    }

                    let delay = self.jittered_delay(attempt);
                    logger::debug(
                        LogTag::Retry,
                        &format!(
                            "attempt {}/{} failed ({}), retrying in {:?}",
                            attempt, self.settings.max_attempts, err, delay
                        ),
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Run the operation with an overall deadline spanning all attempts
    ///
    /// Deadline expiry yields [`MiddlewareError::Timeout`], distinct from
    /// exhausted retries.
    pub async fn execute_with_timeout<T, F, Fut>(
        &self,
        operation: F,
        overall: Duration,
    ) -> MiddlewareResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(overall, self.execute(operation)).await {
            Ok(result) => result,
            Err(_) => {
                logger::warning(
                    LogTag::Retry,
                    &format!("operation timed out after {:?}", overall),
                );
                Err(MiddlewareError::Timeout(overall))
            }
        }
    }

    /// Backoff delay for the given failed attempt, before jitter
    fn base_backoff(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        let multiplier = 1u32 << exponent;
        std::cmp::min(
            self.settings.base_delay().saturating_mul(multiplier),
            self.settings.max_delay(),
        )
    }

    /// Backoff delay with multiplicative jitter applied
    fn jittered_delay(&self, failed_attempt: u32) -> Duration {
        let delay = self.base_backoff(failed_attempt);
        if self.settings.jitter_fraction == 0.0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0.0..=self.settings.jitter_fraction);
        delay + delay.mul_f64(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn executor(max_attempts: u32, base_delay_ms: u64) -> RetryExecutor {
        RetryExecutor::new(RetrySettings {
            max_attempts,
            base_delay_ms,
            max_delay_ms: 60_000,
            jitter_fraction: 0.0,
        })
        .expect("valid settings")
    }

    #[test]
    fn test_invalid_settings_fail_at_construction() {
        let zero_attempts = RetrySettings {
            max_attempts: 0,
            ..RetrySettings::default()
        };
        assert!(RetryExecutor::new(zero_attempts).is_err());

        let zero_base = RetrySettings {
            base_delay_ms: 0,
            ..RetrySettings::default()
        };
        assert!(RetryExecutor::new(zero_base).is_err());

        let negative_jitter = RetrySettings {
            jitter_fraction: -1.0,
            ..RetrySettings::default()
        };
        assert!(RetryExecutor::new(negative_jitter).is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let executor = RetryExecutor::new(RetrySettings {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 500,
            jitter_fraction: 0.0,
        })
        .expect("valid settings");

        assert_eq!(executor.base_backoff(1), Duration::from_millis(100));
        assert_eq!(executor.base_backoff(2), Duration::from_millis(200));
        assert_eq!(executor.base_backoff(3), Duration::from_millis(400));
        // Capped at max_delay from here on
        assert_eq!(executor.base_backoff(4), Duration::from_millis(500));
        assert_eq!(executor.base_backoff(60), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let executor = RetryExecutor::new(RetrySettings {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 60_000,
            jitter_fraction: 0.5,
        })
        .expect("valid settings");

        for attempt in 1..=4u32 {
            let base = executor.base_backoff(attempt);
            for _ in 0..100 {
                let delay = executor.jittered_delay(attempt);
                assert!(delay >= base, "jitter must never shorten the delay");
                assert!(delay <= base + base.mul_f64(0.5));
            }
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt_calls_once() {
        let executor = executor(3, 5);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result: MiddlewareResult<u32> = executor
            .execute(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fails_twice_then_succeeds() {
        let executor = executor(3, 5);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result = executor
            .execute(move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(anyhow::anyhow!("transient failure {}", n))
                    } else {
                        Ok("recovered")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let executor = executor(3, 5);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result: MiddlewareResult<u32> = executor
            .execute(move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(anyhow::anyhow!("failure {}", n))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(MiddlewareError::FetchFailed { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert!(source.to_string().contains("failure 3"));
            }
            other => panic!("expected FetchFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_attempt_never_retries() {
        let executor = executor(1, 5);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result: MiddlewareResult<u32> = executor
            .execute(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("nope"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(MiddlewareError::FetchFailed { attempts: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_dropped_future_stops_further_attempts() {
        let executor = executor(5, 50);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let sequence = executor.execute(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(anyhow::anyhow!("still failing"))
            }
        });

        // Drop the sequence during the first backoff sleep
        let cut_short = tokio::time::timeout(Duration::from_millis(20), sequence).await;
        assert!(cut_short.is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "no attempts may run after the future is dropped"
        );
    }

    #[tokio::test]
    async fn test_overall_timeout_is_distinct_from_exhaustion() {
        // 10 attempts with 50ms backoff would take ~450ms; the 80ms deadline
        // cuts the sequence short.
        let executor = executor(10, 50);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result: MiddlewareResult<u32> = executor
            .execute_with_timeout(
                move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(anyhow::anyhow!("still failing"))
                    }
                },
                Duration::from_millis(80),
            )
            .await;

        assert!(matches!(result, Err(MiddlewareError::Timeout(_))));
        let made = calls.load(Ordering::SeqCst);
        assert!(made >= 1 && made < 10, "deadline should cut retries short");
    }
}
