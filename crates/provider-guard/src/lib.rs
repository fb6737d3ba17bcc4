//! Resource-aware execution core for external provider calls
//!
//! Every outbound call is composed, in a fixed order, from:
//! - a cache lookup (hits never touch the provider)
//! - a resource gate pausing on thermal pressure
//! - a sliding-window rate limiter
//! - a per-provider circuit breaker
//! - a retry policy with exponential backoff and jitter
//!
//! [`ExecutionWrapper::run`] is the single entry point; failures come back
//! as a typed [`GuardError`] and are never cached.

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod maintenance;
pub mod rate_limiter;
pub mod resource;
pub mod retry;
pub mod shutdown;
pub mod wrapper;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use config::{
    BreakerConfig, GuardConfig, RateLimitConfig, ResourceConfig, RetryConfig, MAX_DURATION,
};
pub use error::{ConfigError, GuardError, ProviderError, ResourceReason, Result};
pub use maintenance::{run_maintenance_pass, spawn_maintenance, MaintenanceReport};
pub use rate_limiter::{Admission, RateLimiter};
pub use resource::{MemoryPressure, ResourceMonitor, ResourceProbe, ResourceSnapshot, SystemProbe};
pub use retry::RetryPolicy;
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use wrapper::ExecutionWrapper;
