//! In-memory cache with TTL expiration and LRU eviction

use crate::error::Result;
use crate::store::EntryStore;
use crate::types::{CacheEntry, CacheSettings, CacheStats};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// A bounded cache keyed by string
///
/// Expired entries are never returned, even while still stored. When an
/// insert of a new key would exceed `capacity`, expired entries are swept
/// first; if that frees nothing, the least-recently-accessed entry goes.
pub struct TtlCache<V> {
    store: EntryStore<V>,
    capacity: usize,
    default_ttl: Duration,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<V> TtlCache<V> {
    /// Create a new cache, rejecting a zero capacity or TTL
    pub fn new(capacity: usize, default_ttl: Duration) -> Result<Self> {
        Self::from_settings(&CacheSettings::new(capacity, default_ttl))
    }

    pub fn from_settings(settings: &CacheSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            store: EntryStore::new(),
            capacity: settings.capacity,
            default_ttl: settings.default_ttl,
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Get a live value, refreshing its recency
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let now = Instant::now();

        let expired = match self.store.peek(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.misses += 1;
                return None;
            }
        };

        if expired {
            debug!(key = %key, "Cache entry expired");
            self.store.remove(key);
            self.expirations += 1;
            self.misses += 1;
            return None;
        }

        self.hits += 1;
        self.store.touch(key, now).map(|entry| &entry.value)
    }

    /// Check for a live entry without touching recency or counters
    pub fn contains(&self, key: &str) -> bool {
        self.store
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now()))
    }

    /// Insert with the default TTL
    pub fn put(&mut self, key: impl Into<String>, value: V) {
        let ttl = self.default_ttl;
        self.put_with_ttl(key, value, ttl);
    }

    /// Insert or overwrite, resetting the entry's creation time
    pub fn put_with_ttl(&mut self, key: impl Into<String>, value: V, ttl: Duration) {
        let now = Instant::now();
        self.insert_entry(CacheEntry::new(key.into(), value, ttl, now), now);
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.store.remove(key).map(|entry| entry.value)
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn evict_expired(&mut self) -> usize {
        self.sweep(Instant::now())
    }

    /// Entries from least to most recently accessed
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry<V>> + '_ {
        self.store.iter_by_recency()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.store.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            expirations: self.expirations,
        }
    }

    /// Insert an entry whose timestamps were already decided (snapshot reload)
    pub(crate) fn restore(&mut self, entry: CacheEntry<V>) {
        let now = Instant::now();
        if entry.is_expired(now) {
            return;
        }
        self.insert_entry(entry, now);
    }

    fn insert_entry(&mut self, entry: CacheEntry<V>, now: Instant) {
        if !self.store.contains(&entry.key) && self.store.len() >= self.capacity {
            self.make_room(now);
        }
        self.store.insert(entry);
    }

    fn make_room(&mut self, now: Instant) {
        self.sweep(now);

        while self.store.len() >= self.capacity {
            let Some(key) = self.store.least_recent().map(|e| e.key.clone()) else {
                break;
            };
            self.store.remove(&key);
            self.evictions += 1;
            debug!(key = %key, "Evicted least recently used cache entry");
        }
    }

    fn sweep(&mut self, now: Instant) -> usize {
        let expired = self.store.expired_keys(now);
        for key in &expired {
            self.store.remove(key);
        }
        self.expirations += expired.len() as u64;
        expired.len()
    }
}
