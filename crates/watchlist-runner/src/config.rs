//! Runner configuration, read once from the environment

use crate::error::{Result, RunnerError};
use provider_guard::{BreakerConfig, GuardConfig, RateLimitConfig, ResourceConfig, RetryConfig};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use ttl_lru_cache::CacheSettings;

const DEFAULT_WATCHLIST: &[&str] = &["NVDA", "AAPL", "MSFT", "AMZN", "GOOGL", "META"];
const DEFAULT_CACHE_DIR: &str = "runtime_data/cache";
const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 60;
const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub api_key: String,
    pub watchlist: Vec<String>,
    pub cache_dir: PathBuf,
    pub quote_cache: CacheSettings,
    pub guard: GuardConfig,
    pub resource: ResourceConfig,
    pub flush_interval: Duration,
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset or empty variables take defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let watchlist = match var("WATCHLIST") {
            Some(raw) => parse_watchlist(&raw),
            None => DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect(),
        };
        if watchlist.is_empty() {
            return Err(RunnerError::Config("WATCHLIST has no symbols".to_string()));
        }

        let cache_defaults = CacheSettings::default();
        let quote_cache = CacheSettings::new(
            parse_or(&var, "QUOTE_CACHE_SIZE", cache_defaults.capacity)?,
            secs_or(&var, "QUOTE_TTL_SECS", cache_defaults.default_ttl)?,
        );

        let rate = RateLimitConfig::default();
        let breaker = BreakerConfig::default();
        let retry = RetryConfig::default();
        let resource = ResourceConfig::default();

        let guard = GuardConfig {
            rate_limit: RateLimitConfig {
                max_calls: parse_or(&var, "RATE_LIMIT_CALLS", rate.max_calls)?,
                window: secs_or(&var, "RATE_LIMIT_WINDOW_SECS", rate.window)?,
                max_wait: secs_or(&var, "RATE_LIMIT_MAX_WAIT_SECS", rate.max_wait)?,
            },
            breaker: BreakerConfig {
                failure_threshold: parse_or(&var, "BREAKER_THRESHOLD", breaker.failure_threshold)?,
                recovery_timeout: secs_or(&var, "BREAKER_RECOVERY_SECS", breaker.recovery_timeout)?,
            },
            retry: RetryConfig {
                max_attempts: parse_or(&var, "RETRY_ATTEMPTS", retry.max_attempts)?,
                base_delay: millis_or(&var, "RETRY_BASE_MS", retry.base_delay)?,
                max_delay: millis_or(&var, "RETRY_MAX_MS", retry.max_delay)?,
            },
        };

        let resource = ResourceConfig {
            thermal_high_c: parse_or(&var, "THERMAL_HIGH_C", resource.thermal_high_c)?,
            thermal_low_c: parse_or(&var, "THERMAL_LOW_C", resource.thermal_low_c)?,
            memory_warning_bytes: mebibytes_or(
                &var,
                "MEMORY_WARNING_MB",
                resource.memory_warning_bytes,
            )?,
            memory_critical_bytes: mebibytes_or(
                &var,
                "MEMORY_CRITICAL_MB",
                resource.memory_critical_bytes,
            )?,
            ..resource
        };

        let config = Self {
            api_key: var("TWELVEDATA_API_KEY").unwrap_or_default(),
            watchlist,
            cache_dir: var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
            quote_cache,
            guard,
            resource,
            flush_interval: secs_or(
                &var,
                "FLUSH_INTERVAL_SECS",
                Duration::from_secs(DEFAULT_FLUSH_INTERVAL_SECS),
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.quote_cache.validate()?;
        self.guard.validate()?;
        self.resource.validate()?;
        if self.flush_interval.is_zero() {
            return Err(RunnerError::Config(
                "FLUSH_INTERVAL_SECS must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn quote_cache_path(&self) -> PathBuf {
        self.cache_dir.join("market_quotes.json")
    }
}

/// Comma or whitespace separated symbols, upper-cased, duplicates dropped
fn parse_watchlist(raw: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        let symbol = symbol.trim().to_uppercase();
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T> {
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RunnerError::Config(format!("{} has invalid value {:?}", name, raw))),
        None => Ok(default),
    }
}

fn secs_or(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
) -> Result<Duration> {
    parse_or(var, name, default.as_secs()).map(Duration::from_secs)
}

fn millis_or(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
) -> Result<Duration> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(var, name, default_ms).map(Duration::from_millis)
}

fn mebibytes_or(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default_bytes: u64,
) -> Result<u64> {
    parse_or(var, name, default_bytes / MIB)?
        .checked_mul(MIB)
        .ok_or_else(|| RunnerError::Config(format!("{} is too large", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<RunnerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RunnerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.watchlist.len(), DEFAULT_WATCHLIST.len());
        assert_eq!(config.quote_cache.capacity, 50);
        assert_eq!(config.quote_cache.default_ttl, Duration::from_secs(300));
        assert_eq!(config.guard.rate_limit.max_calls, 8);
        assert_eq!(config.guard.breaker.failure_threshold, 5);
        assert_eq!(config.guard.retry.base_delay, Duration::from_secs(2));
        assert_eq!(config.resource.memory_warning_bytes, 3 * 1024 * MIB);
        assert_eq!(config.flush_interval, Duration::from_secs(60));
        assert_eq!(
            config.quote_cache_path(),
            PathBuf::from("runtime_data/cache/market_quotes.json")
        );
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("TWELVEDATA_API_KEY", "secret"),
            ("WATCHLIST", "aapl, MSFT  sap.de,AAPL"),
            ("CACHE_DIR", "/var/cache/quotes"),
            ("QUOTE_TTL_SECS", "120"),
            ("RATE_LIMIT_CALLS", "4"),
            ("RETRY_BASE_MS", "500"),
            ("MEMORY_CRITICAL_MB", "3800"),
            ("THERMAL_HIGH_C", "75.5"),
        ])
        .unwrap();

        assert_eq!(config.api_key, "secret");
        assert_eq!(config.watchlist, vec!["AAPL", "MSFT", "SAP.DE"]);
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/quotes"));
        assert_eq!(config.quote_cache.default_ttl, Duration::from_secs(120));
        assert_eq!(config.guard.rate_limit.max_calls, 4);
        assert_eq!(config.guard.retry.base_delay, Duration::from_millis(500));
        assert_eq!(config.resource.memory_critical_bytes, 3800 * MIB);
        assert_eq!(config.resource.thermal_high_c, 75.5);
    }

    #[test]
    fn test_unparseable_value_is_rejected() {
        let err = config(&[("RATE_LIMIT_CALLS", "eight")]).unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT_CALLS"));
    }

    #[test]
    fn test_invalid_combination_is_rejected() {
        assert!(config(&[("THERMAL_LOW_C", "90")]).is_err());
        assert!(config(&[("QUOTE_CACHE_SIZE", "0")]).is_err());
        assert!(config(&[("RETRY_BASE_MS", "120000")]).is_err());
        assert!(config(&[("FLUSH_INTERVAL_SECS", "0")]).is_err());
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let max = u64::MAX.to_string();
        for name in [
            "RATE_LIMIT_MAX_WAIT_SECS",
            "RATE_LIMIT_WINDOW_SECS",
            "BREAKER_RECOVERY_SECS",
            "MEMORY_CRITICAL_MB",
        ] {
            assert!(config(&[(name, max.as_str())]).is_err(), "{} accepted", name);
        }
    }

    #[test]
    fn test_empty_watchlist_is_rejected() {
        assert!(config(&[("WATCHLIST", " , ,")]).is_err());
    }
}
