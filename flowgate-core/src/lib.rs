#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod config;
pub mod fingerprint;
pub mod store;
pub mod value;

pub use config::{ConfigError, ConfigSource, GatewayConfig, StaticSource};
pub use fingerprint::Fingerprint;
pub use store::{EntryStore, StoreError, StoreResult};
pub use value::{CachedValue, ChunkedMeta};

/// Raw byte data type used for serialized cache payloads and stream chunks.
/// Using `Bytes` provides cheap reference-counted cloning.
pub type Raw = bytes::Bytes;
