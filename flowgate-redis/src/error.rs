//! Error types for the Redis entry store.

use flowgate_core::StoreError;
use redis::RedisError;

/// Error type for Redis store operations.
///
/// Wraps errors from the underlying [`redis`] crate. In most cases this is
/// converted to [`StoreError`] and absorbed by the gateway's best-effort
/// cache policy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client.
    ///
    /// Includes connection failures, protocol errors, authentication
    /// failures, and command execution errors.
    #[error("redis store error: {0}")]
    Redis(#[from] RedisError),
}

impl From<Error> for StoreError {
    fn from(error: Error) -> Self {
        StoreError::Connection(Box::new(error))
    }
}
