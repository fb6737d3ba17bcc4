//! TTL + LRU cache with on-disk persistence
//!
//! Provides an in-memory cache bounded by entry count, with per-entry
//! time-to-live expiration and least-recently-used eviction. Caches can be
//! snapshotted atomically to disk and reloaded on restart, and grouped under
//! a named registry so independent call-sites share one instance.

mod cache;
mod error;
mod persist;
mod persistent;
mod registry;
mod store;
mod types;

pub use cache::TtlCache;
pub use error::{CacheError, Result};
pub use persist::{PersistedEntry, PersistedImage, SnapshotFile, FORMAT_VERSION};
pub use persistent::PersistentCache;
pub use registry::CacheRegistry;
pub use store::EntryStore;
pub use types::{CacheEntry, CacheSettings, CacheStats};
