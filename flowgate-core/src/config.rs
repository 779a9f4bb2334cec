//! Gateway configuration record and provider trait.
//!
//! Configuration is read through a [`ConfigSource`] — a synchronous, I/O-free
//! read of the full record. The engine snapshots the record once per request
//! and refreshes it lazily on a TTL (see the engine's refresher), so sources
//! backed by files or remote settings should cache internally and hand out
//! the latest loaded record.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Error type for configuration loading.
///
/// Configuration failures are never fatal: the engine logs them and keeps
/// the previous (or default) record.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The underlying source could not produce a record.
    #[error("failed to load gateway configuration: {0}")]
    Load(Box<dyn std::error::Error + Send>),

    /// The source produced a record that fails validation.
    #[error("invalid gateway configuration: {0}")]
    Invalid(String),
}

/// Runtime-tunable gateway configuration.
///
/// All thresholds have production defaults; a source only needs to override
/// what it cares about. `Deserialize` allows file- or environment-backed
/// sources to parse the record directly.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Master switch. When false the core is bypassed entirely and requests
    /// are delegated to the host transport.
    pub enhanced: bool,

    /// Admission limit: maximum concurrent origin requests. Live-resizable.
    pub concurrency: usize,

    /// TTL for both buffered and chunked persistent entries.
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Capacity of the in-process L1 cache (entries).
    pub cache_size: usize,

    /// When false, streaming responses are not mirrored into the
    /// persistent tier.
    pub stream_enabled: bool,

    /// Initial capacity of the early-buffer accumulator; bodies ending
    /// within it complete without reallocation.
    pub stream_detect_buffer: usize,

    /// Accumulation ceiling after which a bufferable response is promoted
    /// to a pass-through stream.
    pub stream_buffer_max: usize,

    /// Maximum number of chunks mirrored into the persistent tier.
    pub stream_max_chunks: usize,

    /// Maximum total bytes mirrored into the persistent tier.
    pub stream_max_total_bytes: usize,

    /// Hard ceiling for a buffered response body. Exceeding it without
    /// promotion fails the request.
    pub max_response_size: usize,

    /// Per-request timeout covering head and body reads.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            enhanced: true,
            concurrency: 10,
            cache_ttl: Duration::from_secs(300),
            cache_size: 500,
            stream_enabled: true,
            stream_detect_buffer: 4 * 1024,
            stream_buffer_max: 64 * 1024,
            stream_max_chunks: 256,
            stream_max_total_bytes: 1024 * 1024,
            max_response_size: 10 * 1024 * 1024,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `concurrency` or `cache_size`
    /// is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.cache_size == 0 {
            return Err(ConfigError::Invalid("cache_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Provider of the gateway configuration record.
///
/// `load` must be callable without I/O; it runs on the request path (behind
/// a TTL gate) and inside the refresher's background task.
pub trait ConfigSource: Send + Sync {
    /// Reads the full configuration record.
    fn load(&self) -> Result<GatewayConfig, ConfigError>;
}

/// A fixed configuration source.
///
/// Useful for tests and deployments without dynamic settings.
#[derive(Clone, Debug, Default)]
pub struct StaticSource {
    config: GatewayConfig,
}

impl StaticSource {
    /// Wraps a fixed record.
    pub fn new(config: GatewayConfig) -> Self {
        StaticSource { config }
    }
}

impl ConfigSource for StaticSource {
    fn load(&self) -> Result<GatewayConfig, ConfigError> {
        Ok(self.config.clone())
    }
}
