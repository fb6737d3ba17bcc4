//! Bounded retries with exponential backoff and jitter

use crate::config::RetryConfig;
use crate::error::{ConfigError, GuardError, ProviderError};
use crate::shutdown::Shutdown;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff after failed attempt `attempt` (1-based), before jitter:
    /// `min(max_delay, base_delay * 2^(attempt - 1))`
    pub fn backoff(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt.saturating_sub(1))
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Backoff plus uniform jitter in `[0, base_delay)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff(attempt).saturating_add(jitter(self.base_delay))
    }

    /// Run `call` until it succeeds, fails permanently, or runs out of attempts
    pub async fn execute<T, F, Fut>(&self, call: F) -> Result<T, GuardError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.execute_cancellable(call, &Shutdown::never()).await
    }

    /// Like [`execute`](Self::execute), but a shutdown during backoff ends with `Cancelled`
    pub async fn execute_cancellable<T, F, Fut>(
        &self,
        mut call: F,
        shutdown: &Shutdown,
    ) -> Result<T, GuardError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut shutdown = shutdown.clone();
        let mut attempt = 1;

        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err @ ProviderError::Permanent(_)) => return Err(GuardError::Provider(err)),
                Err(err) => err,
            };

            if attempt >= self.max_attempts {
                warn!(attempts = attempt, error = %err, "Provider call failed, attempts exhausted");
                return Err(GuardError::AttemptsExhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.delay_for(attempt);
            warn!(
                attempt,
                max_attempts = self.max_attempts,
                error = %err,
                "Provider call failed, retrying in {:?}",
                delay
            );

            tokio::select! {
                _ = shutdown.wait() => return Err(GuardError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

fn jitter(base: Duration) -> Duration {
    let nanos = u64::try_from(base.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..nanos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn policy(max_attempts: u32, base_ms: u64, max_ms: u64) -> RetryPolicy {
        RetryPolicy::new(&RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
        })
        .unwrap()
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let policy = policy(10, 100, 1000);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(5), Duration::from_millis(1000));
        assert_eq!(policy.backoff(64), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_bounded_by_base() {
        let policy = policy(3, 100, 1000);
        for _ in 0..200 {
            let delay = policy.delay_for(2);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay < Duration::from_millis(300));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let policy = policy(3, 100, 1000);
        let attempts = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&attempts);
        let result = policy
            .execute(|| {
                let seen = Arc::clone(&seen);
                async move {
                    let mut seen = seen.lock().unwrap();
                    seen.push(Instant::now());
                    if seen.len() < 3 {
                        Err(ProviderError::transient("connection reset"))
                    } else {
                        Ok("quote")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "quote");
        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts.len(), 3);

        let first_gap = attempts[1] - attempts[0];
        assert!(first_gap >= Duration::from_millis(100));
        assert!(first_gap < Duration::from_millis(200));

        let final_gap = attempts[2] - attempts[1];
        assert!(final_gap >= Duration::from_millis(200));
        assert!(final_gap < Duration::from_millis(1000) + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_stops_immediately() {
        let policy = policy(5, 100, 1000);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::permanent("invalid api key")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match result {
            Err(GuardError::Provider(err)) => {
                assert!(!err.is_transient());
                assert_eq!(
                    format!("{}", err),
                    "Permanent provider failure: invalid api key"
                );
            }
            other => panic!("expected permanent failure, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_exhausted_carries_last_cause() {
        let policy = policy(3, 10, 100);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(ProviderError::transient(format!("timeout #{n}"))) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(GuardError::AttemptsExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(format!("{}", last).contains("timeout #3"));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_never_sleeps() {
        let policy = policy(1, 1000, 1000);
        let start = Instant::now();

        let result: Result<(), _> = policy
            .execute(|| async { Err(ProviderError::transient("down")) })
            .await;

        assert!(matches!(
            result,
            Err(GuardError::AttemptsExhausted { attempts: 1, .. })
        ));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_backoff() {
        let policy = policy(3, 60_000, 60_000);
        let (trigger, shutdown) = Shutdown::channel();
        let calls = AtomicU32::new(0);

        let call = || {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                trigger.trigger();
            }
            async { Err::<(), _>(ProviderError::transient("down")) }
        };
        let result = policy.execute_cancellable(call, &shutdown).await;

        assert!(matches!(result, Err(GuardError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
