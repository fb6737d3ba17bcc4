//! Error types for the watchlist runner

use std::fmt;

/// Failures that stop the runner before or between cycles
///
/// Per-symbol failures never surface here; they are logged by the cycle.
#[derive(Debug)]
pub enum RunnerError {
    Config(String),
    Guard(provider_guard::ConfigError),
    Cache(ttl_lru_cache::CacheError),
    Provider(twelve_data_client::TwelveDataError),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            RunnerError::Guard(err) => write!(f, "Guard setup failed: {}", err),
            RunnerError::Cache(err) => write!(f, "Cache setup failed: {}", err),
            RunnerError::Provider(err) => write!(f, "Provider setup failed: {}", err),
        }
    }
}

impl std::error::Error for RunnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunnerError::Config(_) => None,
            RunnerError::Guard(err) => Some(err),
            RunnerError::Cache(err) => Some(err),
            RunnerError::Provider(err) => Some(err),
        }
    }
}

impl From<provider_guard::ConfigError> for RunnerError {
    fn from(err: provider_guard::ConfigError) -> Self {
        RunnerError::Guard(err)
    }
}

impl From<ttl_lru_cache::CacheError> for RunnerError {
    fn from(err: ttl_lru_cache::CacheError) -> Self {
        RunnerError::Cache(err)
    }
}

impl From<twelve_data_client::TwelveDataError> for RunnerError {
    fn from(err: twelve_data_client::TwelveDataError) -> Self {
        RunnerError::Provider(err)
    }
}

impl From<tracing_subscriber::filter::ParseError> for RunnerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        RunnerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;
