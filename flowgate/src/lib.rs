#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Admission control: bounded, live-resizable origin concurrency.
pub mod admission;

/// Response bodies: buffered values, live streams, and cache replays.
pub mod body;

/// Stream-versus-buffer response classification.
pub mod classify;

/// The gateway facade and the fetch pipeline.
pub mod client;

/// Error types for gateway operations.
pub mod error;

/// Single-flight coalescing of identical in-flight requests.
pub mod inflight;

/// In-process memory cache (first tier).
pub mod memory;

/// Metrics declaration and recording helpers.
///
/// Active only with the `metrics` cargo feature; otherwise every helper is
/// a no-op eliminated by the compiler.
pub mod metrics;

/// Persistent cache tier: buffered entries and chunked stream mirrors.
pub mod tier;

mod offload;
mod origin;
mod refresh;

pub use admission::{AdmissionController, AdmissionError, AdmissionPermit, AdmissionState};
pub use body::{FetchBody, FetchResponse};
pub use classify::{ResponseKind, classify};
pub use client::{FetchOptions, FetchTarget, Gateway, GatewayBuilder, GatewayOptions};
pub use error::FetchError;
pub use inflight::{Flight, FlightError, FlightOutcome, InflightRegistry};
pub use memory::MemoryCache;
pub use tier::{ChunkSink, L2Hit, TieredStore};

pub use flowgate_core::{
    CachedValue, ChunkedMeta, ConfigError, ConfigSource, EntryStore, Fingerprint, GatewayConfig,
    StaticSource, StoreError, StoreResult,
};
