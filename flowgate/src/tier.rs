//! Persistent cache tier: buffered entries and chunked stream mirrors.
//!
//! Two storage disciplines share one [`EntryStore`], keyed per fingerprint:
//!
//! - **Buffered** — the serialized [`CachedValue`] under the storage key,
//!   written with a TTL in one operation.
//! - **Chunked stream** — an ordered list of raw chunks under the stream
//!   key plus a [`ChunkedMeta`] record under the meta key, populated while
//!   the origin stream is live and replayed as a streaming response later.
//!
//! At most one discipline is meaningful per fingerprint at a time; readers
//! prefer the buffered entry when both exist (races across instances).
//!
//! Everything here is best-effort. Read failures degrade to cache misses,
//! write failures are logged and swallowed — the outbound response never
//! depends on the persistent tier cooperating.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use flowgate_core::{CachedValue, ChunkedMeta, EntryStore, Fingerprint};

fn encode<T: serde::Serialize>(value: &T) -> Option<Bytes> {
    match bincode::serde::encode_to_vec(value, bincode::config::standard()) {
        Ok(raw) => Some(Bytes::from(raw)),
        Err(err) => {
            warn!(error = %err, "failed to encode cache payload");
            None
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(raw: &[u8], what: &str) -> Option<T> {
    match bincode::serde::decode_from_slice(raw, bincode::config::standard()) {
        Ok((value, _)) => Some(value),
        Err(err) => {
            warn!(error = %err, what, "failed to decode cache payload, treating as miss");
            None
        }
    }
}

/// A successful read from the persistent tier.
#[derive(Debug)]
pub enum L2Hit {
    /// A fully buffered response.
    Buffered(CachedValue),
    /// A mirrored stream: metadata plus chunks in append order.
    Chunked {
        /// Status and headers captured before the first chunk.
        meta: ChunkedMeta,
        /// Body chunks in origin arrival order.
        chunks: Vec<Bytes>,
    },
}

/// Read/write facade over the shared persistent store.
#[derive(Clone)]
pub struct TieredStore {
    store: Arc<dyn EntryStore>,
}

impl TieredStore {
    /// Wraps a persistent store.
    pub fn new(store: Arc<dyn EntryStore>) -> Self {
        TieredStore { store }
    }

    /// Looks up a fingerprint, preferring the buffered entry.
    ///
    /// Store failures and undecodable payloads are logged and reported as
    /// misses.
    pub async fn read(&self, fingerprint: &Fingerprint) -> Option<L2Hit> {
        match self.store.get(fingerprint.storage_key()).await {
            Ok(Some(raw)) => {
                if let Some(value) = decode::<CachedValue>(&raw, "buffered entry") {
                    return Some(L2Hit::Buffered(value));
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, fingerprint = %fingerprint, "persistent cache read failed");
                return None;
            }
        }

        let chunks = match self.store.lrange(&fingerprint.stream_key()).await {
            Ok(chunks) if !chunks.is_empty() => chunks,
            Ok(_) => return None,
            Err(err) => {
                warn!(error = %err, fingerprint = %fingerprint, "stream replay read failed");
                return None;
            }
        };
        let meta = match self.store.get(&fingerprint.stream_meta_key()).await {
            Ok(Some(raw)) => decode::<ChunkedMeta>(&raw, "stream meta")?,
            Ok(None) => {
                debug!(fingerprint = %fingerprint, "stream chunks without meta, treating as miss");
                return None;
            }
            Err(err) => {
                warn!(error = %err, fingerprint = %fingerprint, "stream meta read failed");
                return None;
            }
        };
        Some(L2Hit::Chunked { meta, chunks })
    }

    /// Writes a buffered entry with the given TTL. Best-effort.
    pub async fn write_buffered(
        &self,
        fingerprint: &Fingerprint,
        value: &CachedValue,
        ttl: Duration,
    ) {
        let Some(payload) = encode(value) else {
            return;
        };
        if let Err(err) = self
            .store
            .set_ex(fingerprint.storage_key(), ttl, payload)
            .await
        {
            warn!(error = %err, fingerprint = %fingerprint, "persistent cache write failed");
        }
    }

    /// Opens a chunk sink for mirroring a live stream.
    pub fn chunk_sink(
        &self,
        fingerprint: &Fingerprint,
        meta: ChunkedMeta,
        ttl: Duration,
        max_total_bytes: usize,
        max_chunks: usize,
    ) -> ChunkSink {
        ChunkSink {
            store: Arc::clone(&self.store),
            stream_key: fingerprint.stream_key(),
            meta_key: fingerprint.stream_meta_key(),
            meta: Some(meta),
            ttl,
            max_total_bytes,
            max_chunks,
            appended_bytes: 0,
            appended_chunks: 0,
            capped: false,
            failed: false,
        }
    }
}

/// Append-side of a chunked stream mirror.
///
/// The first [`push`](ChunkSink::push) clears the chunk list and writes the
/// metadata record, so a replaced mirror can never interleave with stale
/// chunks. Appending stops silently once either cap is reached or the store
/// fails; [`finish`](ChunkSink::finish) refreshes both TTLs regardless, so a
/// partial mirror is still replayable until expiry.
pub struct ChunkSink {
    store: Arc<dyn EntryStore>,
    stream_key: String,
    meta_key: String,
    /// Consumed by the lazy open on first push.
    meta: Option<ChunkedMeta>,
    ttl: Duration,
    max_total_bytes: usize,
    max_chunks: usize,
    appended_bytes: usize,
    appended_chunks: usize,
    capped: bool,
    failed: bool,
}

impl ChunkSink {
    /// Appends a chunk, observing the byte and count caps.
    pub async fn push(&mut self, chunk: &Bytes) {
        if self.failed || self.capped {
            return;
        }
        if self.appended_chunks + 1 > self.max_chunks
            || self.appended_bytes + chunk.len() > self.max_total_bytes
        {
            self.capped = true;
            debug!(
                chunks = self.appended_chunks,
                bytes = self.appended_bytes,
                "stream mirror reached its cap, dropping remaining chunks"
            );
            return;
        }
        if let Some(meta) = self.meta.take() {
            if !self.open(meta).await {
                return;
            }
        }
        if let Err(err) = self.store.rpush(&self.stream_key, chunk.clone()).await {
            warn!(error = %err, "stream mirror append failed, abandoning mirror");
            self.failed = true;
            return;
        }
        self.appended_chunks += 1;
        self.appended_bytes += chunk.len();
    }

    /// Refreshes the TTLs on both keys. Call on stream end or abandonment.
    pub async fn finish(self) {
        if self.failed || self.appended_chunks == 0 {
            return;
        }
        for key in [&self.stream_key, &self.meta_key] {
            if let Err(err) = self.store.expire(key, self.ttl).await {
                warn!(error = %err, key, "failed to refresh mirror ttl");
            }
        }
    }

    /// Number of chunks appended so far.
    pub fn appended_chunks(&self) -> usize {
        self.appended_chunks
    }

    async fn open(&mut self, meta: ChunkedMeta) -> bool {
        if let Err(err) = self.store.del(&self.stream_key).await {
            warn!(error = %err, "failed to clear stream chunk list, abandoning mirror");
            self.failed = true;
            return false;
        }
        let Some(payload) = encode(&meta) else {
            self.failed = true;
            return false;
        };
        if let Err(err) = self.store.set_ex(&self.meta_key, self.ttl, payload).await {
            warn!(error = %err, "failed to write stream meta, abandoning mirror");
            self.failed = true;
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use flowgate_memory::MemoryStore;
    use flowgate_core::{StoreError, StoreResult};
    use http::{HeaderMap, HeaderValue, Method, StatusCode};

    const TTL: Duration = Duration::from_secs(60);

    fn fp(path: &str) -> Fingerprint {
        Fingerprint::new(Method::GET, &format!("https://o/{path}"), None).unwrap()
    }

    fn value(body: &'static str) -> CachedValue {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        CachedValue::new(StatusCode::OK, &headers, Bytes::from_static(body.as_bytes()))
    }

    fn meta() -> ChunkedMeta {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/event-stream"));
        ChunkedMeta::new(StatusCode::OK, &headers)
    }

    #[tokio::test]
    async fn buffered_round_trip() {
        let tier = TieredStore::new(Arc::new(MemoryStore::new()));
        let fingerprint = fp("buffered");
        let original = value("hello world");

        tier.write_buffered(&fingerprint, &original, TTL).await;
        match tier.read(&fingerprint).await.unwrap() {
            L2Hit::Buffered(read) => assert_eq!(read, original),
            L2Hit::Chunked { .. } => panic!("expected buffered hit"),
        }
    }

    #[tokio::test]
    async fn chunked_replay_preserves_append_order() {
        let tier = TieredStore::new(Arc::new(MemoryStore::new()));
        let fingerprint = fp("stream");

        let mut sink = tier.chunk_sink(&fingerprint, meta(), TTL, 1024, 16);
        for chunk in [b"a\n".as_slice(), b"b\n", b"c\n"] {
            sink.push(&Bytes::copy_from_slice(chunk)).await;
        }
        assert_eq!(sink.appended_chunks(), 3);
        sink.finish().await;

        match tier.read(&fingerprint).await.unwrap() {
            L2Hit::Chunked { meta, chunks } => {
                assert_eq!(meta.status, StatusCode::OK);
                let body: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
                assert_eq!(body, b"a\nb\nc\n");
            }
            L2Hit::Buffered(_) => panic!("expected chunked hit"),
        }
    }

    #[tokio::test]
    async fn first_push_clears_stale_chunks() {
        let store = Arc::new(MemoryStore::new());
        let tier = TieredStore::new(store.clone());
        let fingerprint = fp("stale");
        store
            .rpush(&fingerprint.stream_key(), Bytes::from_static(b"stale"))
            .await
            .unwrap();

        let mut sink = tier.chunk_sink(&fingerprint, meta(), TTL, 1024, 16);
        sink.push(&Bytes::from_static(b"fresh")).await;
        sink.finish().await;

        let chunks = store.lrange(&fingerprint.stream_key()).await.unwrap();
        assert_eq!(chunks, vec![Bytes::from_static(b"fresh")]);
    }

    #[tokio::test]
    async fn chunk_count_cap_stops_appending() {
        let tier = TieredStore::new(Arc::new(MemoryStore::new()));
        let fingerprint = fp("capped-count");

        let mut sink = tier.chunk_sink(&fingerprint, meta(), TTL, 1024, 2);
        for _ in 0..5 {
            sink.push(&Bytes::from_static(b"x")).await;
        }
        assert_eq!(sink.appended_chunks(), 2);
        sink.finish().await;

        match tier.read(&fingerprint).await.unwrap() {
            L2Hit::Chunked { chunks, .. } => assert_eq!(chunks.len(), 2),
            L2Hit::Buffered(_) => panic!("expected chunked hit"),
        }
    }

    #[tokio::test]
    async fn byte_cap_stops_appending() {
        let tier = TieredStore::new(Arc::new(MemoryStore::new()));
        let fingerprint = fp("capped-bytes");

        let mut sink = tier.chunk_sink(&fingerprint, meta(), TTL, 10, 16);
        sink.push(&Bytes::from_static(b"12345678")).await;
        // Would exceed the 10-byte cap; dropped.
        sink.push(&Bytes::from_static(b"456")).await;
        assert_eq!(sink.appended_chunks(), 1);
    }

    #[tokio::test]
    async fn buffered_entry_wins_over_chunks() {
        let tier = TieredStore::new(Arc::new(MemoryStore::new()));
        let fingerprint = fp("both");

        let mut sink = tier.chunk_sink(&fingerprint, meta(), TTL, 1024, 16);
        sink.push(&Bytes::from_static(b"chunked")).await;
        sink.finish().await;
        tier.write_buffered(&fingerprint, &value("buffered"), TTL).await;

        match tier.read(&fingerprint).await.unwrap() {
            L2Hit::Buffered(read) => assert_eq!(read.body.as_ref(), b"buffered"),
            L2Hit::Chunked { .. } => panic!("buffered entry must win"),
        }
    }

    fn down() -> StoreError {
        StoreError::Connection(Box::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "store is down",
        )))
    }

    struct BrokenStore;

    #[async_trait]
    impl EntryStore for BrokenStore {
        async fn get(&self, _key: &str) -> StoreResult<Option<Bytes>> {
            Err(down())
        }
        async fn set_ex(&self, _key: &str, _ttl: Duration, _value: Bytes) -> StoreResult<()> {
            Err(down())
        }
        async fn del(&self, _key: &str) -> StoreResult<()> {
            Err(down())
        }
        async fn llen(&self, _key: &str) -> StoreResult<usize> {
            Err(down())
        }
        async fn lrange(&self, _key: &str) -> StoreResult<Vec<Bytes>> {
            Err(down())
        }
        async fn rpush(&self, _key: &str, _value: Bytes) -> StoreResult<()> {
            Err(down())
        }
        async fn expire(&self, _key: &str, _ttl: Duration) -> StoreResult<()> {
            Err(down())
        }
    }

    #[tokio::test]
    async fn unreachable_store_reads_as_miss() {
        let tier = TieredStore::new(Arc::new(BrokenStore));
        let fingerprint = fp("down");
        assert!(tier.read(&fingerprint).await.is_none());
        // Writes are swallowed too.
        tier.write_buffered(&fingerprint, &value("x"), TTL).await;
        let mut sink = tier.chunk_sink(&fingerprint, meta(), TTL, 1024, 16);
        sink.push(&Bytes::from_static(b"x")).await;
        sink.finish().await;
    }
}
