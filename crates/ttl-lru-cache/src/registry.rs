//! Named collection of persistent caches

use crate::error::Result;
use crate::persistent::PersistentCache;
use crate::types::{CacheSettings, CacheStats};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Owns every persistent cache in the process, keyed by logical name
pub struct CacheRegistry<V> {
    caches: Mutex<HashMap<String, Arc<PersistentCache<V>>>>,
}

impl<V> CacheRegistry<V>
where
    V: Clone + Serialize + DeserializeOwned + Send,
{
    pub fn new() -> Self {
        Self {
            caches: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cache registered under `name`, opening it on first use
    ///
    /// Later calls with the same name get the same instance; their
    /// capacity, TTL and path arguments are ignored.
    pub async fn get_or_create(
        &self,
        name: &str,
        capacity: usize,
        default_ttl: Duration,
        path: impl Into<PathBuf>,
    ) -> Result<Arc<PersistentCache<V>>> {
        let mut caches = self.caches.lock().await;

        if let Some(existing) = caches.get(name) {
            debug!(cache = %name, "Reusing registered cache");
            return Ok(Arc::clone(existing));
        }

        let settings = CacheSettings::new(capacity, default_ttl);
        let cache = Arc::new(PersistentCache::open(name, &settings, path).await?);
        caches.insert(name.to_string(), Arc::clone(&cache));
        info!(cache = %name, capacity, ttl_secs = default_ttl.as_secs(), "Registered cache");

        Ok(cache)
    }

    pub async fn get(&self, name: &str) -> Option<Arc<PersistentCache<V>>> {
        self.caches.lock().await.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of the registered caches, so callers never hold the registry lock
    async fn all(&self) -> Vec<Arc<PersistentCache<V>>> {
        self.caches.lock().await.values().cloned().collect()
    }

    /// Sweep expired entries from every cache, returning removed counts per cache
    pub async fn evict_expired_all(&self) -> BTreeMap<String, usize> {
        let mut removed = BTreeMap::new();
        for cache in self.all().await {
            let count = cache.evict_expired().await;
            if count > 0 {
                debug!(cache = %cache.name(), removed = count, "Swept expired entries");
            }
            removed.insert(cache.name().to_string(), count);
        }
        removed
    }

    /// Flush every cache, logging failures; returns how many flushed successfully
    pub async fn flush_all(&self) -> usize {
        let mut flushed = 0;
        for cache in self.all().await {
            match cache.flush().await {
                Ok(_) => flushed += 1,
                Err(e) => {
                    warn!(
                        cache = %cache.name(),
                        path = ?cache.path(),
                        error = %e,
                        "Failed to flush cache"
                    );
                }
            }
        }
        flushed
    }

    pub async fn clear_all(&self) {
        for cache in self.all().await {
            cache.clear().await;
        }
        info!("All caches cleared");
    }

    pub async fn stats(&self) -> BTreeMap<String, CacheStats> {
        let mut stats = BTreeMap::new();
        for cache in self.all().await {
            stats.insert(cache.name().to_string(), cache.stats().await);
        }
        stats
    }
}

impl<V> Default for CacheRegistry<V>
where
    V: Clone + Serialize + DeserializeOwned + Send,
{
    fn default() -> Self {
        Self::new()
    }
}
