//! Error types for gateway operations.
//!
//! Only request-fatal conditions surface through [`FetchError`]. Cache and
//! configuration failures are absorbed: the persistent tier degrades to a
//! miss and configuration reload keeps the previous record, both with a log
//! line (see `flowgate_core::StoreError` / `flowgate_core::ConfigError`).
//!
//! An origin status of 4xx/5xx is **not** an error — the response is
//! delivered (and cached) verbatim.

use std::time::Duration;

use thiserror::Error;

/// Error type for fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request input could not be understood: unparsable URL, relative
    /// URL without a configured base, invalid option value, or a call on a
    /// disposed gateway.
    #[error("invalid fetch input: {0}")]
    InvalidInput(String),

    /// Connection-level failure talking to the origin (DNS, TCP, TLS).
    #[error("origin network error: {0}")]
    OriginNetwork(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The origin produced a malformed response.
    #[error("origin protocol error: {0}")]
    OriginProtocol(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The per-request deadline elapsed before the response completed.
    #[error("origin request timed out after {0:?}")]
    Timeout(Duration),

    /// The request was canceled before completion.
    #[error("fetch canceled")]
    Canceled,

    /// A bufferable response exceeded the buffering ceiling without being
    /// promoted to streaming.
    #[error("response body exceeded the {limit}-byte buffering ceiling")]
    ResponseTooLarge {
        /// The configured `max_response_size`.
        limit: usize,
    },
}

impl FetchError {
    /// Short machine-readable name of the error kind, used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidInput(_) => "invalid_input",
            FetchError::OriginNetwork(_) => "origin_network",
            FetchError::OriginProtocol(_) => "origin_protocol",
            FetchError::Timeout(_) => "timeout",
            FetchError::Canceled => "canceled",
            FetchError::ResponseTooLarge { .. } => "response_too_large",
        }
    }
}
