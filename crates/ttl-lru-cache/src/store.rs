//! Entry storage with recency ordering
//!
//! Pure data structure: no expiry policy and no capacity bound. Every insert
//! and every `touch` moves the entry to the most-recent end; iteration and
//! `least_recent` walk from the least-recent end.

use crate::types::CacheEntry;
use std::collections::{BTreeMap, HashMap};
use tokio::time::Instant;

struct Slot<V> {
    entry: CacheEntry<V>,
    tick: u64,
}

pub struct EntryStore<V> {
    entries: HashMap<String, Slot<V>>,
    /// Access tick -> key, oldest first
    recency: BTreeMap<u64, String>,
    next_tick: u64,
}

impl<V> EntryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            next_tick: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Look at an entry without changing its recency
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key).map(|slot| &slot.entry)
    }

    /// Mark an entry as accessed at `now` and move it to the most-recent end
    pub fn touch(&mut self, key: &str, now: Instant) -> Option<&CacheEntry<V>> {
        let slot = self.entries.get_mut(key)?;
        self.recency.remove(&slot.tick);
        self.next_tick += 1;
        slot.tick = self.next_tick;
        slot.entry.last_accessed = now;
        self.recency.insert(slot.tick, key.to_string());
        Some(&slot.entry)
    }

    /// Insert or replace an entry; the entry becomes the most recent
    pub fn insert(&mut self, entry: CacheEntry<V>) -> Option<CacheEntry<V>> {
        let previous = self.remove(&entry.key);
        self.next_tick += 1;
        let tick = self.next_tick;
        self.recency.insert(tick, entry.key.clone());
        self.entries.insert(entry.key.clone(), Slot { entry, tick });
        previous
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let slot = self.entries.remove(key)?;
        self.recency.remove(&slot.tick);
        Some(slot.entry)
    }

    pub fn least_recent(&self) -> Option<&CacheEntry<V>> {
        self.recency
            .values()
            .next()
            .and_then(|key| self.peek(key))
    }

    pub fn expired_keys(&self, now: Instant) -> Vec<String> {
        self.entries
            .values()
            .filter(|slot| slot.entry.is_expired(now))
            .map(|slot| slot.entry.key.clone())
            .collect()
    }

    /// Entries from least to most recently accessed
    pub fn iter_by_recency(&self) -> impl Iterator<Item = &CacheEntry<V>> + '_ {
        self.recency.values().filter_map(|key| self.peek(key))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }
}

impl<V> Default for EntryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(key: &str, now: Instant) -> CacheEntry<u32> {
        CacheEntry::new(key.to_string(), 0, Duration::from_secs(60), now)
    }

    fn order(store: &EntryStore<u32>) -> Vec<String> {
        store.iter_by_recency().map(|e| e.key.clone()).collect()
    }

    #[test]
    fn test_insert_orders_by_recency() {
        let now = Instant::now();
        let mut store = EntryStore::new();
        store.insert(entry("a", now));
        store.insert(entry("b", now));
        store.insert(entry("c", now));

        assert_eq!(order(&store), vec!["a", "b", "c"]);
        assert_eq!(store.least_recent().map(|e| e.key.as_str()), Some("a"));
    }

    #[test]
    fn test_touch_moves_to_most_recent() {
        let now = Instant::now();
        let mut store = EntryStore::new();
        store.insert(entry("a", now));
        store.insert(entry("b", now));

        let later = now + Duration::from_secs(5);
        let touched = store.touch("a", later).unwrap();
        assert_eq!(touched.last_accessed, later);
        assert_eq!(order(&store), vec!["b", "a"]);
        assert!(store.touch("missing", later).is_none());
    }

    #[test]
    fn test_replace_keeps_single_entry() {
        let now = Instant::now();
        let mut store = EntryStore::new();
        store.insert(entry("a", now));
        store.insert(entry("b", now));
        let previous = store.insert(entry("a", now));

        assert!(previous.is_some());
        assert_eq!(store.len(), 2);
        assert_eq!(order(&store), vec!["b", "a"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let now = Instant::now();
        let mut store = EntryStore::new();
        store.insert(entry("a", now));
        store.insert(entry("b", now));

        assert!(store.remove("a").is_some());
        assert!(store.remove("a").is_none());
        assert_eq!(order(&store), vec!["b"]);

        store.clear();
        assert!(store.is_empty());
        assert!(store.least_recent().is_none());
    }
}
