//! Redis entry store implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use flowgate_core::{EntryStore, Raw, StoreResult};
use redis::{Client, aio::ConnectionManager};
use tokio::sync::OnceCell;
use tracing::trace;

use crate::error::Error;

/// Distributed entry store powered by Redis.
///
/// Uses a multiplexed [`ConnectionManager`] so many concurrent gateway
/// requests share a single underlying connection. The connection is
/// established lazily on the first operation, not at construction time —
/// building a store never blocks, and a gateway whose persistent tier is
/// rarely reached pays nothing up front.
///
/// Buffered entries map to plain string values written with `SETEX`;
/// mirrored streams map to `RPUSH` lists whose TTL is set with `EXPIRE`
/// once the mirror completes. All values are binary-safe.
///
/// # Examples
///
/// ```no_run
/// use flowgate_redis::RedisStore;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RedisStore::builder()
///     .server("redis://localhost:6379/")
///     .build()?;
/// # let _ = store;
/// # Ok(())
/// # }
/// ```
///
/// [`ConnectionManager`]: redis::aio::ConnectionManager
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisStore {
    /// Creates a store connected to `redis://127.0.0.1/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Redis`] if the connection URL is invalid. Actual
    /// connection errors occur lazily on the first operation.
    pub fn new() -> Result<Self, Error> {
        Self::builder().build()
    }

    /// Creates a new builder with default settings.
    #[must_use]
    pub fn builder() -> RedisStoreBuilder {
        RedisStoreBuilder::default()
    }

    /// Returns the Redis connection manager, connecting on first call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Redis`] if the connection cannot be established.
    pub async fn connection(&self) -> Result<&ConnectionManager, Error> {
        trace!("get connection manager");
        let manager = self
            .connection
            .get_or_try_init(|| {
                trace!("initialize new redis connection manager");
                self.client.get_connection_manager()
            })
            .await?;
        Ok(manager)
    }
}

/// Builder for [`RedisStore`].
pub struct RedisStoreBuilder {
    connection_info: String,
}

impl Default for RedisStoreBuilder {
    fn default() -> Self {
        Self {
            connection_info: "redis://127.0.0.1/".to_owned(),
        }
    }
}

impl RedisStoreBuilder {
    /// Sets the Redis server connection URL.
    ///
    /// Format: `redis://[<username>][:<password>@]<host>[:<port>][/<database>]`.
    ///
    /// # Default
    ///
    /// `redis://127.0.0.1/`
    pub fn server(mut self, connection_info: impl Into<String>) -> Self {
        self.connection_info = connection_info.into();
        self
    }

    /// Builds the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Redis`] if the connection URL is invalid.
    pub fn build(self) -> Result<RedisStore, Error> {
        Ok(RedisStore {
            client: Client::open(self.connection_info)?,
            connection: OnceCell::new(),
        })
    }
}

#[async_trait]
impl EntryStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Raw>> {
        let mut con = self.connection().await?.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(value.map(Bytes::from))
    }

    async fn set_ex(&self, key: &str, ttl: Duration, value: Raw) -> StoreResult<()> {
        let mut con = self.connection().await?.clone();
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .arg(value.as_ref())
            .query_async::<()>(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn del(&self, key: &str) -> StoreResult<()> {
        let mut con = self.connection().await?.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn llen(&self, key: &str) -> StoreResult<usize> {
        let mut con = self.connection().await?.clone();
        let len: usize = redis::cmd("LLEN")
            .arg(key)
            .query_async(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(len)
    }

    async fn lrange(&self, key: &str) -> StoreResult<Vec<Raw>> {
        let mut con = self.connection().await?.clone();
        let chunks: Vec<Vec<u8>> = redis::cmd("LRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .query_async(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(chunks.into_iter().map(Bytes::from).collect())
    }

    async fn rpush(&self, key: &str, value: Raw) -> StoreResult<()> {
        let mut con = self.connection().await?.clone();
        redis::cmd("RPUSH")
            .arg(key)
            .arg(value.as_ref())
            .query_async::<()>(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        let mut con = self.connection().await?.clone();
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_fails_at_build_time() {
        let result = RedisStore::builder().server("not-a-valid-url").build();
        assert!(result.is_err());
    }

    #[test]
    fn valid_url_builds_without_connecting() {
        RedisStore::builder()
            .server("redis://localhost:6379/0")
            .build()
            .unwrap();
    }
}
