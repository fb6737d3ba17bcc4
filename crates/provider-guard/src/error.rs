//! Error types for guarded provider calls

use std::fmt;
use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Nonsensical configuration, rejected at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid configuration: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// What a provider call reports when it fails
///
/// Only `Transient` failures (network, timeout, upstream overload) are retried.
#[derive(Debug)]
pub enum ProviderError {
    Transient(BoxError),
    Permanent(BoxError),
}

impl ProviderError {
    pub fn transient(err: impl Into<BoxError>) -> Self {
        ProviderError::Transient(err.into())
    }

    pub fn permanent(err: impl Into<BoxError>) -> Self {
        ProviderError::Permanent(err.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Transient(err) => write!(f, "Transient provider failure: {}", err),
            ProviderError::Permanent(err) => write!(f, "Permanent provider failure: {}", err),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProviderError::Transient(err) | ProviderError::Permanent(err) => Some(err.as_ref()),
        }
    }
}

/// Why the resource gate refused to let a call through
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceReason {
    /// Still above the thermal low-water mark after the pause ceiling
    Thermal { celsius: f64, waited: Duration },
}

impl fmt::Display for ResourceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceReason::Thermal { celsius, waited } => write!(
                f,
                "CPU at {:.1}°C after pausing {:?}",
                celsius, waited
            ),
        }
    }
}

/// Typed failure of a guarded call
#[derive(Debug)]
pub enum GuardError {
    RateLimited {
        provider: String,
        retry_after: Duration,
    },
    /// Rejected without touching the provider
    CircuitOpen {
        provider: String,
        retry_in: Duration,
    },
    /// Non-retryable failure, surfaced unmodified
    Provider(ProviderError),
    AttemptsExhausted {
        attempts: u32,
        last: ProviderError,
    },
    ResourceExhausted(ResourceReason),
    /// Shutdown interrupted a wait; the call was skipped
    Cancelled,
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardError::RateLimited {
                provider,
                retry_after,
            } => write!(
                f,
                "Rate limit reached for {} (retry after {:?})",
                provider, retry_after
            ),
            GuardError::CircuitOpen { provider, retry_in } => write!(
                f,
                "Circuit open for {} (retry in {:?})",
                provider, retry_in
            ),
            GuardError::Provider(err) => write!(f, "{}", err),
            GuardError::AttemptsExhausted { attempts, last } => {
                write!(f, "Gave up after {} attempts: {}", attempts, last)
            }
            GuardError::ResourceExhausted(reason) => write!(f, "Resources exhausted: {}", reason),
            GuardError::Cancelled => write!(f, "Cancelled by shutdown"),
        }
    }
}

impl std::error::Error for GuardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GuardError::Provider(err) => Some(err),
            GuardError::AttemptsExhausted { last, .. } => Some(last),
            _ => None,
        }
    }
}

impl From<ProviderError> for GuardError {
    fn from(err: ProviderError) -> Self {
        GuardError::Provider(err)
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;
