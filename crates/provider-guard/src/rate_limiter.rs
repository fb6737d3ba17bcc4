//! Sliding-window rate limiter
//!
//! Keeps the timestamp of every admitted call within the trailing window.
//! A call is admitted only while fewer than `max_calls` timestamps fall in
//! `[now - window, now]`, so no two adjacent windows can together admit a
//! burst of `2 * max_calls`.

use crate::config::{deadline_after, RateLimitConfig};
use crate::error::ConfigError;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Slack added to a computed wait so the oldest call has left the window on wake-up
const WAKE_SLACK: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    /// Denied calls consume no quota
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted)
    }
}

pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            max_calls: config.max_calls,
            window: config.window,
            calls: Mutex::new(VecDeque::with_capacity(config.max_calls)),
        })
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit the call now if the window has room
    pub async fn try_acquire(&self) -> Admission {
        let now = Instant::now();
        let mut calls = self.calls.lock().await;

        while calls
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) > self.window)
        {
            calls.pop_front();
        }

        if calls.len() < self.max_calls {
            calls.push_back(now);
            return Admission::Granted;
        }

        // Full window: the oldest call decides when a slot frees up
        let retry_after = calls
            .front()
            .map(|&oldest| {
                deadline_after(oldest, self.window).saturating_duration_since(now) + WAKE_SLACK
            })
            .unwrap_or(WAKE_SLACK);
        Admission::Denied { retry_after }
    }

    /// Wait up to `max_wait` for a slot, then answer as [`try_acquire`](Self::try_acquire)
    pub async fn acquire_blocking(&self, max_wait: Duration) -> Admission {
        let deadline = deadline_after(Instant::now(), max_wait);

        loop {
            let retry_after = match self.try_acquire().await {
                Admission::Granted => return Admission::Granted,
                Admission::Denied { retry_after } => retry_after,
            };

            let now = Instant::now();
            if now >= deadline {
                return Admission::Denied { retry_after };
            }

            let wake = deadline_after(now, retry_after).min(deadline);
            debug!(wait = ?(wake - now), "Waiting for rate limit slot");
            sleep_until(wake).await;
        }
    }

    /// Calls currently counted against the window
    pub async fn in_window(&self) -> usize {
        let now = Instant::now();
        self.calls
            .lock()
            .await
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) <= self.window)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_calls: usize, window_secs: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_calls,
            window: Duration::from_secs(window_secs),
            max_wait: Duration::ZERO,
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = RateLimitConfig {
            max_calls: 0,
            ..Default::default()
        };
        assert!(RateLimiter::new(&config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_eight_per_minute() {
        let limiter = limiter(8, 60);

        for _ in 0..8 {
            assert_eq!(limiter.try_acquire().await, Admission::Granted);
        }
        assert!(!limiter.try_acquire().await.is_granted());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.try_acquire().await, Admission::Granted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_calls_consume_no_quota() {
        let limiter = limiter(2, 60);
        limiter.try_acquire().await;
        limiter.try_acquire().await;

        for _ in 0..5 {
            assert!(!limiter.try_acquire().await.is_granted());
        }
        assert_eq!(limiter.in_window().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_double_burst_across_boundary() {
        let limiter = limiter(4, 60);

        // Two calls early in the window, two just before its end
        limiter.try_acquire().await;
        limiter.try_acquire().await;
        tokio::time::advance(Duration::from_secs(58)).await;
        limiter.try_acquire().await;
        limiter.try_acquire().await;

        // A fixed bucket would reset here and admit another 4
        tokio::time::advance(Duration::from_secs(3)).await;
        let mut granted = 0;
        for _ in 0..4 {
            if limiter.try_acquire().await.is_granted() {
                granted += 1;
            }
        }
        assert_eq!(granted, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_points_at_oldest_call() {
        let limiter = limiter(1, 10);
        limiter.try_acquire().await;
        tokio::time::advance(Duration::from_secs(4)).await;

        match limiter.try_acquire().await {
            Admission::Denied { retry_after } => {
                assert!(retry_after > Duration::from_secs(6));
                assert!(retry_after <= Duration::from_secs(6) + WAKE_SLACK);
            }
            Admission::Granted => panic!("expected denial"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_blocking_waits_for_slot() {
        let limiter = limiter(1, 10);
        limiter.try_acquire().await;

        let start = Instant::now();
        let admission = limiter.acquire_blocking(Duration::from_secs(30)).await;

        assert_eq!(admission, Admission::Granted);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(10));
        assert!(waited < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_blocking_survives_unbounded_wait() {
        let limiter = limiter(1, 10);
        limiter.try_acquire().await;

        let start = Instant::now();
        let admission = limiter.acquire_blocking(Duration::from_secs(u64::MAX)).await;

        assert_eq!(admission, Admission::Granted);
        assert!(start.elapsed() < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_blocking_gives_up_at_max_wait() {
        let limiter = limiter(1, 60);
        limiter.try_acquire().await;

        let start = Instant::now();
        let admission = limiter.acquire_blocking(Duration::from_secs(5)).await;

        assert!(!admission.is_granted());
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }
}
