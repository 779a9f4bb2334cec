//! Serialized cache entry shapes.
//!
//! Two records cover the persistent tier's storage disciplines:
//!
//! - [`CachedValue`] — a fully buffered response (status, headers, body),
//!   stored under the fingerprint's storage key.
//! - [`ChunkedMeta`] — status and headers of a mirrored stream, stored next
//!   to the ordered chunk list.
//!
//! Both serialize with serde. Headers are encoded as a sequence of
//! `(name, value-bytes)` pairs so the wire form stays fixed-shape for
//! non-self-describing binary formats; the binary encoding itself (bincode,
//! standard configuration) is chosen by the engine and is the compatibility
//! contract for a deployment.

use bytes::Bytes;
use http::StatusCode;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

/// A fully buffered cached response.
///
/// Header names are lowercased by construction (inherent to [`HeaderMap`]);
/// multi-valued headers are joined with `", "` so every name maps to exactly
/// one value. Bodies may be empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedValue {
    /// Origin status, preserved verbatim (including 4xx/5xx).
    #[serde(with = "http_serde::status_code")]
    pub status: StatusCode,
    /// Canonicalized response headers.
    #[serde(with = "header_pairs")]
    pub headers: HeaderMap,
    /// Response body bytes.
    pub body: Bytes,
}

impl CachedValue {
    /// Builds a cached value, canonicalizing the headers.
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        CachedValue {
            status,
            headers: canonical_headers(headers),
            body,
        }
    }
}

/// Status and headers of a mirrored chunked stream.
///
/// Written before the first chunk is appended so replay readers can emit the
/// response head without touching the chunk list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkedMeta {
    /// Origin status, preserved verbatim.
    #[serde(with = "http_serde::status_code")]
    pub status: StatusCode,
    /// Canonicalized response headers.
    #[serde(with = "header_pairs")]
    pub headers: HeaderMap,
}

impl ChunkedMeta {
    /// Builds stream metadata, canonicalizing the headers.
    pub fn new(status: StatusCode, headers: &HeaderMap) -> Self {
        ChunkedMeta {
            status,
            headers: canonical_headers(headers),
        }
    }
}

/// Collapses multi-valued headers into single comma-joined values.
///
/// `HeaderMap` already lowercases names; this folds repeated values for the
/// same name into one `", "`-joined value so the serialized form is a flat
/// name → value mapping.
pub fn canonical_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.keys_len());
    let mut joined: Vec<u8> = Vec::new();
    let names: Vec<HeaderName> = headers.keys().cloned().collect();
    for name in names {
        joined.clear();
        for (i, value) in headers.get_all(&name).iter().enumerate() {
            if i > 0 {
                joined.extend_from_slice(b", ");
            }
            joined.extend_from_slice(value.as_bytes());
        }
        if let Ok(value) = HeaderValue::from_bytes(&joined) {
            out.insert(name, value);
        }
    }
    out
}

/// Serde adapter encoding a [`HeaderMap`] as `Vec<(String, Vec<u8>)>`.
///
/// A fixed sequence-of-pairs shape round-trips through binary formats that
/// cannot represent "string or list" alternatives per key. Pairs keep their
/// insertion order. Unparsable names or values on decode are skipped rather
/// than failing the whole entry.
mod header_pairs {
    use super::*;
    use serde::de::Deserializer;
    use serde::ser::Serializer;

    pub fn serialize<S: Serializer>(headers: &HeaderMap, serializer: S) -> Result<S::Ok, S::Error> {
        let pairs: Vec<(&str, &[u8])> = headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_bytes()))
            .collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HeaderMap, D::Error> {
        let pairs: Vec<(String, Vec<u8>)> = Vec::deserialize(deserializer)?;
        let mut headers = HeaderMap::with_capacity(pairs.len());
        for (name, value) in pairs {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_bytes(&value),
            ) {
                headers.append(name, value);
            }
        }
        Ok(headers)
    }
}
