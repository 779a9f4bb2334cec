#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;

use flowgate_core::{EntryStore, Raw, StoreResult};

#[derive(Clone, Debug)]
enum Payload {
    Value(Bytes),
    List(Vec<Bytes>),
}

#[derive(Clone, Debug)]
struct Entry {
    payload: Payload,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// In-process entry store with lazy TTL expiry.
///
/// Expired entries are dropped when touched, not on a timer; `len()` may
/// briefly count entries that would read as absent.
///
/// A key holds either a plain value or a list. `set_ex` replaces whatever is
/// there; `rpush` onto a plain value replaces it with a fresh list (the
/// engine keeps the two key families disjoint, so this only matters for
/// direct store use).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries (may include not-yet-collected expired ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Reads an entry, dropping it when expired.
    fn live(&self, key: &str) -> Option<Entry> {
        let entry = self.entries.get(key)?;
        if entry.expired() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.clone())
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Raw>> {
        Ok(self.live(key).and_then(|entry| match entry.payload {
            Payload::Value(value) => Some(value),
            Payload::List(_) => None,
        }))
    }

    async fn set_ex(&self, key: &str, ttl: Duration, value: Raw) -> StoreResult<()> {
        self.entries.insert(
            key.to_owned(),
            Entry {
                payload: Payload::Value(value),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn llen(&self, key: &str) -> StoreResult<usize> {
        Ok(self
            .live(key)
            .map_or(0, |entry| match entry.payload {
                Payload::List(list) => list.len(),
                Payload::Value(_) => 0,
            }))
    }

    async fn lrange(&self, key: &str) -> StoreResult<Vec<Raw>> {
        Ok(self
            .live(key)
            .map_or_else(Vec::new, |entry| match entry.payload {
                Payload::List(list) => list,
                Payload::Value(_) => Vec::new(),
            }))
    }

    async fn rpush(&self, key: &str, value: Raw) -> StoreResult<()> {
        match self.entries.entry(key.to_owned()) {
            MapEntry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let expired = entry.expired();
                match &mut entry.payload {
                    Payload::List(list) if !expired => list.push(value),
                    _ => {
                        *entry = Entry {
                            payload: Payload::List(vec![value]),
                            expires_at: None,
                        };
                    }
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry {
                    payload: Payload::List(vec![value]),
                    expires_at: None,
                });
            }
        }
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryStore::new();
        store
            .set_ex("k", TTL, Bytes::from_static(b"v"))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap().as_ref(), b"v");
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let store = MemoryStore::new();
        store
            .set_ex("k", Duration::from_millis(5), Bytes::from_static(b"v"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn lists_keep_append_order() {
        let store = MemoryStore::new();
        for chunk in [b"a".as_slice(), b"b", b"c"] {
            store
                .rpush("list", Bytes::copy_from_slice(chunk))
                .await
                .unwrap();
        }
        assert_eq!(store.llen("list").await.unwrap(), 3);
        let chunks = store.lrange("list").await.unwrap();
        assert_eq!(
            chunks,
            vec![
                Bytes::from_static(b"a"),
                Bytes::from_static(b"b"),
                Bytes::from_static(b"c"),
            ]
        );
    }

    #[tokio::test]
    async fn del_removes_any_entry_kind() {
        let store = MemoryStore::new();
        store
            .set_ex("v", TTL, Bytes::from_static(b"x"))
            .await
            .unwrap();
        store.rpush("l", Bytes::from_static(b"x")).await.unwrap();
        store.del("v").await.unwrap();
        store.del("l").await.unwrap();
        store.del("missing").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn expire_bounds_a_list() {
        let store = MemoryStore::new();
        store.rpush("l", Bytes::from_static(b"x")).await.unwrap();
        store.expire("l", Duration::from_millis(5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.llen("l").await.unwrap(), 0);
        // Expiring a missing key is a no-op, not an error.
        store.expire("missing", TTL).await.unwrap();
    }

    #[tokio::test]
    async fn set_ex_replaces_a_list() {
        let store = MemoryStore::new();
        store.rpush("k", Bytes::from_static(b"old")).await.unwrap();
        store
            .set_ex("k", TTL, Bytes::from_static(b"new"))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap().as_ref(), b"new");
        assert_eq!(store.llen("k").await.unwrap(), 0);
    }
}
