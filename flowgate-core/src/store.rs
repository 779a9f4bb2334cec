//! Persistent store trait for the shared cache tier.
//!
//! The gateway mirrors responses into an external key/value and list store.
//! [`EntryStore`] is the minimal operation set the engine needs: plain values
//! with TTL for buffered entries, ordered lists for mirrored stream chunks.
//!
//! Every operation is fallible and every failure is survivable: the engine
//! treats read errors as cache misses and logs write errors without touching
//! the outbound response. Implementations should not retry internally.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::Raw;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error type for persistent store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network interaction error.
    ///
    /// Errors occurring during communication with remote stores (e.g. Redis).
    #[error(transparent)]
    Connection(Box<dyn std::error::Error + Send>),

    /// Internal store error, state or computation error.
    ///
    /// Any error not related to network interaction.
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send>),
}

/// Shared persistent store used as the gateway's second cache tier.
///
/// Keys are opaque strings derived from request fingerprints; values are
/// opaque [`Raw`] bytes. A key holds either a plain value or a list, never
/// both — the engine keeps the two families disjoint by key suffix.
///
/// The store is shared across instances: implementations must not assume
/// exclusive ownership of any key.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Reads a plain value. `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<Raw>>;

    /// Writes a plain value with a TTL, replacing any previous entry.
    async fn set_ex(&self, key: &str, ttl: Duration, value: Raw) -> StoreResult<()>;

    /// Deletes a key (value or list). Deleting an absent key is not an error.
    async fn del(&self, key: &str) -> StoreResult<()>;

    /// Returns the length of the list at `key` (0 when absent).
    async fn llen(&self, key: &str) -> StoreResult<usize>;

    /// Returns the full list at `key` in append order (empty when absent).
    async fn lrange(&self, key: &str) -> StoreResult<Vec<Raw>>;

    /// Appends a value to the tail of the list at `key`, creating it if needed.
    async fn rpush(&self, key: &str, value: Raw) -> StoreResult<()>;

    /// Sets the TTL of an existing key. A missing key is not an error.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()>;
}
