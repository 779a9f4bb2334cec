//! In-process memory cache (first tier).
//!
//! A strict-LRU map from request fingerprint to a realized buffered value.
//! Pending work never lives here — in-flight fetches are coordinated by the
//! single-flight registry — and streaming resolutions are never inserted, so
//! every hit is a complete response that can be served without touching the
//! network or the persistent tier.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use flowgate_core::{CachedValue, Fingerprint};

/// Default entry capacity.
pub const DEFAULT_CAPACITY: usize = 500;

/// Bounded strict-LRU cache of buffered responses.
///
/// `get` refreshes recency; `insert` on an existing key replaces the value
/// and refreshes; eviction removes the least recently used entry once size
/// exceeds capacity. The critical section never spans I/O.
#[derive(Debug)]
pub struct MemoryCache {
    entries: Mutex<LruCache<Fingerprint, Arc<CachedValue>>>,
}

impl MemoryCache {
    /// Creates a cache bounded to `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to 1");
        MemoryCache {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Looks up a fingerprint, refreshing its recency on hit.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<CachedValue>> {
        self.entries
            .lock()
            .expect("memory cache lock poisoned")
            .get(fingerprint)
            .cloned()
    }

    /// Inserts or replaces an entry, refreshing its recency.
    pub fn insert(&self, fingerprint: Fingerprint, value: Arc<CachedValue>) {
        self.entries
            .lock()
            .expect("memory cache lock poisoned")
            .put(fingerprint, value);
    }

    /// Removes an entry if present.
    pub fn remove(&self, fingerprint: &Fingerprint) {
        self.entries
            .lock()
            .expect("memory cache lock poisoned")
            .pop(fingerprint);
    }

    /// Changes the capacity, evicting LRU entries if the cache shrinks.
    pub fn resize(&self, capacity: usize) {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to 1");
        self.entries
            .lock()
            .expect("memory cache lock poisoned")
            .resize(capacity);
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries
            .lock()
            .expect("memory cache lock poisoned")
            .clear();
    }

    /// Current entry count.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("memory cache lock poisoned")
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};

    fn fp(path: &str) -> Fingerprint {
        Fingerprint::new(Method::GET, &format!("https://o/{path}"), None).unwrap()
    }

    fn value(body: &'static str) -> Arc<CachedValue> {
        Arc::new(CachedValue::new(
            StatusCode::OK,
            &HeaderMap::new(),
            Bytes::from_static(body.as_bytes()),
        ))
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = MemoryCache::new(2);
        cache.insert(fp("a"), value("a"));
        cache.insert(fp("b"), value("b"));
        cache.insert(fp("c"), value("c"));
        assert!(cache.get(&fp("a")).is_none());
        assert!(cache.get(&fp("b")).is_some());
        assert!(cache.get(&fp("c")).is_some());
    }

    #[test]
    fn get_refreshes_recency() {
        let cache = MemoryCache::new(2);
        cache.insert(fp("a"), value("a"));
        cache.insert(fp("b"), value("b"));
        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get(&fp("a")).is_some());
        cache.insert(fp("c"), value("c"));
        assert!(cache.get(&fp("a")).is_some());
        assert!(cache.get(&fp("b")).is_none());
    }

    #[test]
    fn insert_replaces_and_refreshes() {
        let cache = MemoryCache::new(2);
        cache.insert(fp("a"), value("old"));
        cache.insert(fp("b"), value("b"));
        cache.insert(fp("a"), value("new"));
        cache.insert(fp("c"), value("c"));
        assert_eq!(cache.get(&fp("a")).unwrap().body.as_ref(), b"new");
        assert!(cache.get(&fp("b")).is_none());
    }

    #[test]
    fn resize_shrink_evicts() {
        let cache = MemoryCache::new(3);
        cache.insert(fp("a"), value("a"));
        cache.insert(fp("b"), value("b"));
        cache.insert(fp("c"), value("c"));
        cache.resize(1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&fp("c")).is_some());
    }
}
