//! Per-provider circuit breaker
//!
//! Closed -> Open after `failure_threshold` consecutive failures.
//! Open -> HalfOpen on the first call attempt once `recovery_timeout` has passed.
//! HalfOpen lets exactly one trial call through: success closes the
//! circuit, failure reopens it with a fresh `opened_at`.

use crate::config::BreakerConfig;
use crate::error::ConfigError;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    status: CircuitState,
    consecutive_failures: u32,
    /// Only meaningful while Open
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            status: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }
}

/// Owned by a single call-site; never shared between providers
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &BreakerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            failure_threshold: config.failure_threshold,
            recovery_timeout: config.recovery_timeout,
            state: Mutex::new(BreakerState::closed()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> CircuitState {
        self.state.lock().await.status
    }

    pub async fn consecutive_failures(&self) -> u32 {
        self.state.lock().await.consecutive_failures
    }

    /// Ask to let a call through
    ///
    /// `Err` carries how long until the circuit is eligible for a trial.
    pub async fn try_pass(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let status = state.status;

        match status {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let opened_at = state.opened_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed >= self.recovery_timeout {
                    state.status = CircuitState::HalfOpen;
                    state.trial_in_flight = true;
                    info!(provider = %self.name, "Circuit half-open, allowing trial call");
                    Ok(())
                } else {
                    Err(self.recovery_timeout - elapsed)
                }
            }
            CircuitState::HalfOpen => {
                if state.trial_in_flight {
                    Err(Duration::ZERO)
                } else {
                    state.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        if state.status == CircuitState::HalfOpen {
            info!(provider = %self.name, "Circuit closed after successful trial");
        }
        *state = BreakerState::closed();
    }

    pub async fn record_failure(&self) {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        let status = state.status;

        match status {
            CircuitState::HalfOpen => {
                state.status = CircuitState::Open;
                state.opened_at = Some(now);
                state.trial_in_flight = false;
                warn!(provider = %self.name, "Trial call failed, circuit reopened");
            }
            CircuitState::Closed if state.consecutive_failures >= self.failure_threshold => {
                state.status = CircuitState::Open;
                state.opened_at = Some(now);
                warn!(
                    provider = %self.name,
                    failures = state.consecutive_failures,
                    recovery_secs = self.recovery_timeout.as_secs(),
                    "Circuit opened"
                );
            }
            _ => {}
        }
    }

    /// Give back a half-open trial slot whose call never reached the provider
    pub async fn release_trial(&self) {
        let mut state = self.state.lock().await;
        if state.status == CircuitState::HalfOpen {
            state.trial_in_flight = false;
        }
    }

    /// Force the circuit closed
    pub async fn reset(&self) {
        *self.state.lock().await = BreakerState::closed();
        info!(provider = %self.name, "Circuit manually reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, recovery_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "twelve_data",
            &BreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: Duration::from_secs(recovery_secs),
            },
        )
        .unwrap()
    }

    async fn open(breaker: &CircuitBreaker, threshold: u32) {
        for _ in 0..threshold {
            breaker.try_pass().await.unwrap();
            breaker.record_failure().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold() {
        let breaker = breaker(3, 60);

        breaker.record_failure().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);

        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert_eq!(breaker.consecutive_failures().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_count() {
        let breaker = breaker(3, 60);
        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_success().await;
        breaker.record_failure().await;

        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_until_recovery() {
        let breaker = breaker(2, 60);
        open(&breaker, 2).await;

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(breaker.try_pass().await, Err(Duration::from_secs(40)));

        tokio::time::advance(Duration::from_secs(40)).await;
        assert_eq!(breaker.try_pass().await, Ok(()));
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_allows_single_trial() {
        let breaker = breaker(1, 10);
        open(&breaker, 1).await;
        tokio::time::advance(Duration::from_secs(10)).await;

        assert!(breaker.try_pass().await.is_ok());
        assert!(breaker.try_pass().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_success_closes() {
        let breaker = breaker(2, 10);
        open(&breaker, 2).await;
        tokio::time::advance(Duration::from_secs(10)).await;

        breaker.try_pass().await.unwrap();
        breaker.record_success().await;

        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures().await, 0);
        assert!(breaker.try_pass().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens_with_fresh_timer() {
        let breaker = breaker(2, 10);
        open(&breaker, 2).await;
        tokio::time::advance(Duration::from_secs(15)).await;

        breaker.try_pass().await.unwrap();
        breaker.record_failure().await;

        assert_eq!(breaker.state().await, CircuitState::Open);
        assert_eq!(breaker.try_pass().await, Err(Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_trial_allows_another_attempt() {
        let breaker = breaker(1, 10);
        open(&breaker, 1).await;
        tokio::time::advance(Duration::from_secs(10)).await;

        breaker.try_pass().await.unwrap();
        breaker.release_trial().await;
        assert!(breaker.try_pass().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset() {
        let breaker = breaker(1, 600);
        open(&breaker, 1).await;
        breaker.reset().await;

        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert!(breaker.try_pass().await.is_ok());
    }
}
