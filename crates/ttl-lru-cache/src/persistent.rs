//! Cache that survives restarts through snapshot files

use crate::cache::TtlCache;
use crate::error::Result;
use crate::persist::{PersistedEntry, PersistedImage, SnapshotFile};
use crate::types::{CacheEntry, CacheSettings, CacheStats};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A [`TtlCache`] bound to a snapshot file
///
/// Persistence is best effort: an unreadable snapshot starts the cache
/// empty, and a failed flush leaves the in-memory contents untouched.
pub struct PersistentCache<V> {
    name: String,
    inner: Mutex<TtlCache<V>>,
    snapshot: SnapshotFile,
    /// Serializes flushes so two writers never share the temporary file
    flush_lock: Mutex<()>,
}

impl<V> PersistentCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send,
{
    /// Open a cache, restoring any live entries from `path`
    ///
    /// Only invalid settings fail; snapshot problems are logged and ignored.
    pub async fn open(
        name: impl Into<String>,
        settings: &CacheSettings,
        path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let name = name.into();
        let mut cache = TtlCache::from_settings(settings)?;
        let snapshot = SnapshotFile::new(path);

        match snapshot.load::<V>().await {
            Ok(Some(image)) => {
                let (restored, dropped) = restore_image(&mut cache, image);
                info!(cache = %name, restored, dropped, "Restored cache from snapshot");
            }
            Ok(None) => {
                debug!(cache = %name, path = ?snapshot.path(), "No cache snapshot found");
            }
            Err(e) => {
                warn!(
                    cache = %name,
                    path = ?snapshot.path(),
                    error = %e,
                    "Ignoring unreadable cache snapshot"
                );
            }
        }

        Ok(Self {
            name,
            inner: Mutex::new(cache),
            snapshot,
            flush_lock: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        self.snapshot.path()
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.inner.lock().await.get(key).cloned()
    }

    pub async fn put(&self, key: impl Into<String>, value: V) {
        self.inner.lock().await.put(key, value);
    }

    pub async fn put_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.inner.lock().await.put_with_ttl(key, value, ttl);
    }

    pub async fn remove(&self, key: &str) -> Option<V> {
        self.inner.lock().await.remove(key)
    }

    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    pub async fn evict_expired(&self) -> usize {
        self.inner.lock().await.evict_expired()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.lock().await.stats()
    }

    /// Write every live entry to the snapshot file, returning how many were written
    ///
    /// The entry set is copied under the cache lock, then written without it,
    /// so readers and writers are only blocked for the copy.
    pub async fn flush(&self) -> Result<usize> {
        let _guard = self.flush_lock.lock().await;

        let image = {
            let cache = self.inner.lock().await;
            snapshot_image(&cache, Instant::now(), Utc::now())
        };
        let count = image.entries.len();

        self.snapshot.store(&image).await?;
        debug!(cache = %self.name, entries = count, "Flushed cache");
        Ok(count)
    }
}

fn snapshot_image<V: Clone>(
    cache: &TtlCache<V>,
    now: Instant,
    wall_now: DateTime<Utc>,
) -> PersistedImage<V> {
    let entries = cache
        .entries()
        .filter(|entry| !entry.is_expired(now))
        .map(|entry| {
            let age = now.saturating_duration_since(entry.created_at);
            let age = chrono::Duration::from_std(age).unwrap_or_else(|_| chrono::Duration::zero());
            PersistedEntry {
                key: entry.key.clone(),
                value: entry.value.clone(),
                created_at: wall_now - age,
                ttl_ms: entry.ttl.as_millis() as u64,
            }
        })
        .collect();

    PersistedImage::new(entries)
}

/// Re-insert snapshot entries in their saved recency order; returns (restored, dropped)
fn restore_image<V>(cache: &mut TtlCache<V>, image: PersistedImage<V>) -> (usize, usize) {
    let now = Instant::now();
    let wall_now = Utc::now();
    let mut restored = 0;
    let mut dropped = 0;

    for persisted in image.entries {
        let ttl = Duration::from_millis(persisted.ttl_ms);
        // A timestamp in the future (clock step) counts as brand new
        let age = (wall_now - persisted.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);

        if age > ttl {
            dropped += 1;
            continue;
        }

        let (created_at, ttl) = match now.checked_sub(age) {
            Some(created_at) => (created_at, ttl),
            None => (now, ttl - age),
        };

        cache.restore(CacheEntry {
            key: persisted.key,
            value: persisted.value,
            created_at,
            ttl,
            last_accessed: now,
        });
        restored += 1;
    }

    (restored, dropped)
}
