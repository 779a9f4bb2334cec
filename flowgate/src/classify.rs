//! Stream-versus-buffer response classification.
//!
//! Classification looks only at the response head, before any body byte is
//! consumed. It is deliberately one-way: a response classified as streaming
//! stays on the streaming path even if the body turns out to be short (short
//! streams just close promptly), and a bufferable response can still be
//! promoted to streaming later by the early-buffer loop.

use http::HeaderMap;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};

/// How the response handler should treat a response body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    /// Deliver chunks as they arrive; mirror into the chunked cache mode.
    Streaming,
    /// Accumulate in memory; cache as a buffered entry.
    Bufferable,
}

/// Classifies a response from its headers.
///
/// Streaming when any of the following holds:
/// - `Transfer-Encoding` contains `chunked`
/// - `Content-Type` begins with `text/event-stream` or `multipart/`
/// - no `Content-Length` is present while a transfer-encoding is declared
pub fn classify(headers: &HeaderMap) -> ResponseKind {
    let chunked = headers.get_all(TRANSFER_ENCODING).iter().any(|value| {
        value
            .to_str()
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false)
    });
    if chunked {
        return ResponseKind::Streaming;
    }

    if let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        let content_type = content_type.trim_start().to_ascii_lowercase();
        if content_type.starts_with("text/event-stream") || content_type.starts_with("multipart/")
        {
            return ResponseKind::Streaming;
        }
    }

    if headers.get(CONTENT_LENGTH).is_none() && headers.contains_key(TRANSFER_ENCODING) {
        return ResponseKind::Streaming;
    }

    ResponseKind::Bufferable
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn chunked_transfer_encoding_streams() {
        let map = headers(&[("transfer-encoding", "chunked"), ("content-length", "11")]);
        assert_eq!(classify(&map), ResponseKind::Streaming);
    }

    #[test]
    fn chunked_is_found_inside_a_list() {
        let map = headers(&[("transfer-encoding", "gzip, Chunked")]);
        assert_eq!(classify(&map), ResponseKind::Streaming);
    }

    #[test]
    fn event_stream_content_type_streams() {
        let map = headers(&[
            ("content-type", "text/event-stream; charset=utf-8"),
            ("content-length", "100"),
        ]);
        assert_eq!(classify(&map), ResponseKind::Streaming);
    }

    #[test]
    fn multipart_content_type_streams() {
        let map = headers(&[("content-type", "multipart/mixed; boundary=x")]);
        assert_eq!(classify(&map), ResponseKind::Streaming);
    }

    #[test]
    fn declared_encoding_without_length_streams() {
        let map = headers(&[("transfer-encoding", "gzip")]);
        assert_eq!(classify(&map), ResponseKind::Streaming);
    }

    #[test]
    fn plain_response_buffers() {
        let map = headers(&[("content-type", "text/plain"), ("content-length", "11")]);
        assert_eq!(classify(&map), ResponseKind::Bufferable);
    }

    #[test]
    fn headerless_response_buffers() {
        assert_eq!(classify(&HeaderMap::new()), ResponseKind::Bufferable);
    }
}
