//! Execution wrapper: the single entry point for guarded provider calls

use crate::circuit_breaker::CircuitBreaker;
use crate::config::{deadline_after, GuardConfig};
use crate::error::{ConfigError, GuardError, ProviderError, ResourceReason, Result};
use crate::rate_limiter::{Admission, RateLimiter};
use crate::resource::{MemoryPressure, ResourceMonitor};
use crate::retry::RetryPolicy;
use crate::shutdown::Shutdown;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use ttl_lru_cache::{CacheRegistry, PersistentCache};

/// Guards every call to one provider
///
/// Owns that provider's rate limiter and circuit breaker. The cache and
/// resource monitor are shared with other wrappers.
pub struct ExecutionWrapper<V> {
    provider: String,
    cache: Arc<PersistentCache<V>>,
    registry: Option<Arc<CacheRegistry<V>>>,
    monitor: Arc<ResourceMonitor>,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    rate_limit_wait: Duration,
    shutdown: Shutdown,
}

impl<V> ExecutionWrapper<V>
where
    V: Clone + Serialize + DeserializeOwned + Send,
{
    pub fn new(
        provider: impl Into<String>,
        config: &GuardConfig,
        cache: Arc<PersistentCache<V>>,
        monitor: Arc<ResourceMonitor>,
        shutdown: Shutdown,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let provider = provider.into();

        Ok(Self {
            limiter: RateLimiter::new(&config.rate_limit)?,
            breaker: CircuitBreaker::new(provider.clone(), &config.breaker)?,
            retry: RetryPolicy::new(&config.retry)?,
            rate_limit_wait: config.rate_limit.max_wait,
            provider,
            cache,
            registry: None,
            monitor,
            shutdown,
        })
    }

    /// Sweep every registered cache, not just this one, under memory pressure
    pub fn with_registry(mut self, registry: Arc<CacheRegistry<V>>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn cache(&self) -> &Arc<PersistentCache<V>> {
        &self.cache
    }

    /// Return the cached value for `cache_key`, or fetch it through every gate
    ///
    /// Order: cache, thermal gate, rate limiter, circuit breaker, retried call.
    /// Only successful results are cached, with `ttl`.
    pub async fn run<F, Fut>(&self, cache_key: &str, ttl: Duration, provider_call: F) -> Result<V>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<V, ProviderError>>,
    {
        if let Some(hit) = self.cache.get(cache_key).await {
            debug!(provider = %self.provider, key = %cache_key, "Cache hit");
            return Ok(hit);
        }
        debug!(provider = %self.provider, key = %cache_key, "Cache miss");

        if self.shutdown.is_triggered() {
            return Err(GuardError::Cancelled);
        }

        self.wait_for_resources().await?;
        self.relieve_memory_pressure().await;
        self.admit().await?;

        if let Err(retry_in) = self.breaker.try_pass().await {
            debug!(provider = %self.provider, key = %cache_key, "Circuit open, skipping call");
            return Err(GuardError::CircuitOpen {
                provider: self.provider.clone(),
                retry_in,
            });
        }

        match self
            .retry
            .execute_cancellable(provider_call, &self.shutdown)
            .await
        {
            Ok(value) => {
                self.breaker.record_success().await;
                // Pressure can rise during the wait and the call itself
                if self.monitor.memory_pressure().await == MemoryPressure::Critical {
                    warn!(
                        provider = %self.provider,
                        key = %cache_key,
                        "Memory critical, not caching result"
                    );
                } else {
                    self.cache
                        .put_with_ttl(cache_key, value.clone(), ttl)
                        .await;
                }
                Ok(value)
            }
            Err(GuardError::Cancelled) => {
                self.breaker.release_trial().await;
                Err(GuardError::Cancelled)
            }
            Err(err) => {
                self.breaker.record_failure().await;
                Err(err)
            }
        }
    }

    /// Block while the CPU is too hot, up to the monitor's pause ceiling
    async fn wait_for_resources(&self) -> Result<()> {
        if !self.monitor.should_pause().await {
            return Ok(());
        }

        let limits = self.monitor.config();
        let start = Instant::now();
        let deadline = deadline_after(start, limits.max_pause);
        let mut shutdown = self.shutdown.clone();

        loop {
            let now = Instant::now();
            if now >= deadline {
                let celsius = self.monitor.cpu_temperature_celsius().await;
                warn!(provider = %self.provider, celsius, "Still too hot after pausing, giving up");
                return Err(GuardError::ResourceExhausted(ResourceReason::Thermal {
                    celsius,
                    waited: now - start,
                }));
            }

            let wake = deadline_after(now, limits.poll_interval).min(deadline);
            tokio::select! {
                _ = shutdown.wait() => return Err(GuardError::Cancelled),
                _ = tokio::time::sleep_until(wake) => {}
            }

            if !self.monitor.should_pause().await {
                return Ok(());
            }
        }
    }

    /// Sweep expired cache entries when memory is tight
    async fn relieve_memory_pressure(&self) {
        let pressure = self.monitor.memory_pressure().await;
        if pressure == MemoryPressure::Normal {
            return;
        }

        let removed = match &self.registry {
            Some(registry) => registry.evict_expired_all().await.values().sum::<usize>(),
            None => self.cache.evict_expired().await,
        };
        info!(provider = %self.provider, ?pressure, removed, "Swept caches under memory pressure");
    }

    async fn admit(&self) -> Result<()> {
        let admission = if self.rate_limit_wait.is_zero() {
            self.limiter.try_acquire().await
        } else {
            let mut shutdown = self.shutdown.clone();
            tokio::select! {
                _ = shutdown.wait() => return Err(GuardError::Cancelled),
                admission = self.limiter.acquire_blocking(self.rate_limit_wait) => admission,
            }
        };

        match admission {
            Admission::Granted => Ok(()),
            Admission::Denied { retry_after } => {
                debug!(provider = %self.provider, ?retry_after, "Rate limited");
                Err(GuardError::RateLimited {
                    provider: self.provider.clone(),
                    retry_after,
                })
            }
        }
    }
}
