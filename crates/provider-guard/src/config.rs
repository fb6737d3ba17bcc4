//! Guard configuration
//!
//! Supplied once at startup and never mutated. Every constructor in this
//! crate validates its slice of the configuration and refuses to build on
//! nonsense values.

use crate::error::ConfigError;
use std::time::Duration;
use tokio::time::Instant;

/// Longest duration any setting may hold (one year)
///
/// Every deadline is `now + setting`, which must stay representable on the clock.
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// `from + after`, with `after` clamped to [`MAX_DURATION`]
///
/// Falls back to `from` on a clock that cannot reach a year ahead.
pub(crate) fn deadline_after(from: Instant, after: Duration) -> Instant {
    from.checked_add(after.min(MAX_DURATION)).unwrap_or(from)
}

fn ensure_bounded(value: Duration, name: &str) -> Result<(), ConfigError> {
    if value <= MAX_DURATION {
        Ok(())
    } else {
        Err(ConfigError(format!(
            "{} must not exceed {} seconds",
            name,
            MAX_DURATION.as_secs()
        )))
    }
}

fn ensure(condition: bool, msg: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError(msg.to_string()))
    }
}

/// Sliding-window admission for one provider
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_calls: usize,
    pub window: Duration,
    /// How long a call may wait for a free slot; zero denies immediately
    pub max_wait: Duration,
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.max_calls > 0, "rate limit max_calls must be positive")?;
        ensure(!self.window.is_zero(), "rate limit window must be positive")?;
        ensure_bounded(self.window, "rate limit window")?;
        ensure_bounded(self.max_wait, "rate limit max_wait")
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: 8,
            window: Duration::from_secs(60),
            max_wait: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl BreakerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(
            self.failure_threshold > 0,
            "circuit breaker failure_threshold must be positive",
        )?;
        ensure_bounded(self.recovery_timeout, "circuit breaker recovery_timeout")
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.max_attempts > 0, "retry max_attempts must be positive")?;
        ensure(
            self.base_delay <= self.max_delay,
            "retry base_delay must not exceed max_delay",
        )?;
        ensure_bounded(self.max_delay, "retry max_delay")
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Thermal hysteresis and memory pressure thresholds
#[derive(Debug, Clone)]
pub struct ResourceConfig {
    /// Pause once the CPU goes above this
    pub thermal_high_c: f64,
    /// Resume once the CPU drops below this
    pub thermal_low_c: f64,
    pub memory_warning_bytes: u64,
    pub memory_critical_bytes: u64,
    /// Longest a single call waits for the CPU to cool down
    pub max_pause: Duration,
    pub poll_interval: Duration,
}

impl ResourceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(
            self.thermal_low_c < self.thermal_high_c,
            "thermal low-water mark must be below the high-water mark",
        )?;
        ensure(
            self.memory_warning_bytes < self.memory_critical_bytes,
            "memory warning threshold must be below the critical threshold",
        )?;
        ensure(
            !self.poll_interval.is_zero(),
            "resource poll_interval must be positive",
        )?;
        ensure_bounded(self.max_pause, "resource max_pause")?;
        ensure_bounded(self.poll_interval, "resource poll_interval")
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            thermal_high_c: 80.0,
            thermal_low_c: 70.0,
            memory_warning_bytes: 3 * 1024 * 1024 * 1024, // 3 GiB
            memory_critical_bytes: 3584 * 1024 * 1024,     // 3.5 GiB
            max_pause: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Everything an [`ExecutionWrapper`](crate::ExecutionWrapper) owns for one provider
///
/// Resource limits live on the shared [`ResourceMonitor`](crate::ResourceMonitor).
#[derive(Debug, Clone, Default)]
pub struct GuardConfig {
    pub rate_limit: RateLimitConfig,
    pub breaker: BreakerConfig,
    pub retry: RetryConfig,
}

impl GuardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit.validate()?;
        self.breaker.validate()?;
        self.retry.validate()
    }
}
