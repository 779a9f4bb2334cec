//! Response body representations.
//!
//! A gateway response body is either fully buffered ([`FetchBody::Full`]) or
//! a live stream ([`FetchBody::Streaming`]). Cache hits on buffered entries
//! yield `Full` bodies; origin streams, promoted large responses, and
//! chunked-cache replays yield `Streaming` bodies.
//!
//! The streaming variants carry their resources with them: a pass-through
//! stream owns the admission permit for its origin connection and the sender
//! feeding the cache mirror, so abandoning the body (dropping it mid-read)
//! releases the permit and lets the mirror flush what it has. Mirroring is
//! fire-and-forget — a send to the mirror never blocks the caller's poll.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, Stream, StreamExt};
use http::{HeaderMap, StatusCode};
use tokio::sync::mpsc;

use flowgate_core::CachedValue;

use crate::admission::AdmissionPermit;
use crate::error::FetchError;

/// A response body.
pub enum FetchBody {
    /// Fully buffered body. The `Option` lets the body yield its bytes once
    /// when consumed as a stream.
    Full(Option<Bytes>),
    /// Live or replayed stream of body chunks.
    Streaming(BoxStream<'static, Result<Bytes, FetchError>>),
}

impl FetchBody {
    /// Collects the whole body into contiguous bytes.
    pub async fn bytes(self) -> Result<Bytes, FetchError> {
        match self {
            FetchBody::Full(data) => Ok(data.unwrap_or_default()),
            FetchBody::Streaming(mut stream) => {
                let mut collected = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    collected.extend_from_slice(&chunk?);
                }
                Ok(collected.freeze())
            }
        }
    }

    /// Whether this body is delivered as a stream.
    pub fn is_streaming(&self) -> bool {
        matches!(self, FetchBody::Streaming(_))
    }
}

impl Stream for FetchBody {
    type Item = Result<Bytes, FetchError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut() {
            FetchBody::Full(data) => Poll::Ready(data.take().map(Ok)),
            FetchBody::Streaming(stream) => stream.as_mut().poll_next(cx),
        }
    }
}

impl std::fmt::Debug for FetchBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchBody::Full(Some(bytes)) => f
                .debug_tuple("Full")
                .field(&format!("{} bytes", bytes.len()))
                .finish(),
            FetchBody::Full(None) => f.debug_tuple("Full").field(&"consumed").finish(),
            FetchBody::Streaming(_) => f.debug_tuple("Streaming").field(&"...").finish(),
        }
    }
}

/// A response delivered by the gateway.
///
/// Status and headers are always settled before any body byte; reading the
/// body of a streaming response drives the origin connection (and, for
/// cacheable responses, the mirror feeding the persistent tier).
#[derive(Debug)]
pub struct FetchResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: FetchBody,
}

impl FetchResponse {
    pub(crate) fn buffered(value: &CachedValue) -> Self {
        FetchResponse {
            status: value.status,
            headers: value.headers.clone(),
            body: FetchBody::Full(Some(value.body.clone())),
        }
    }

    pub(crate) fn streaming(
        status: StatusCode,
        headers: HeaderMap,
        body: BoxStream<'static, Result<Bytes, FetchError>>,
    ) -> Self {
        FetchResponse {
            status,
            headers,
            body: FetchBody::Streaming(body),
        }
    }

    /// Origin status, verbatim (4xx/5xx included).
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether the body is delivered as a stream.
    pub fn is_streaming(&self) -> bool {
        self.body.is_streaming()
    }

    /// Reads the next body chunk. `None` once the body is exhausted.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        self.body.next().await.transpose()
    }

    /// Collects the whole body.
    pub async fn bytes(self) -> Result<Bytes, FetchError> {
        self.body.bytes().await
    }

    /// Consumes the response, returning its parts.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, FetchBody) {
        (self.status, self.headers, self.body)
    }
}

/// Pass-through stream for live origin bodies.
///
/// Yields the buffered prefix first (present when a bufferable response was
/// promoted mid-buffer), then forwards the remaining origin chunks. Every
/// forwarded chunk is also offered to the mirror channel. The admission
/// permit is dropped on end, error, or abandonment — each path releases it
/// exactly once because the permit lives in this stream and nowhere else.
pub(crate) struct ForwardStream {
    prefix: VecDeque<Bytes>,
    inner: Option<BoxStream<'static, Result<Bytes, FetchError>>>,
    mirror: Option<mpsc::UnboundedSender<Bytes>>,
    permit: Option<AdmissionPermit>,
}

impl ForwardStream {
    pub(crate) fn new(
        prefix: Vec<Bytes>,
        inner: BoxStream<'static, Result<Bytes, FetchError>>,
        mirror: Option<mpsc::UnboundedSender<Bytes>>,
        permit: Option<AdmissionPermit>,
    ) -> Self {
        ForwardStream {
            prefix: prefix.into(),
            inner: Some(inner),
            mirror,
            permit,
        }
    }

    fn finish(&mut self) {
        self.inner = None;
        // Dropping the sender lets the mirror task flush and finish.
        self.mirror = None;
        self.permit = None;
    }
}

impl Stream for ForwardStream {
    type Item = Result<Bytes, FetchError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(chunk) = this.prefix.pop_front() {
            return Poll::Ready(Some(Ok(chunk)));
        }

        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if let Some(mirror) = &this.mirror {
                    // Best-effort: a closed mirror never affects delivery.
                    let _ = mirror.send(chunk.clone());
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.finish();
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::stream;

    #[tokio::test]
    async fn full_body_yields_once_as_a_stream() {
        let mut body = FetchBody::Full(Some(Bytes::from_static(b"abc")));
        assert_eq!(body.next().await.unwrap().unwrap().as_ref(), b"abc");
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn forward_stream_yields_prefix_then_inner() {
        let inner = stream::iter(vec![Ok(Bytes::from_static(b"3")), Ok(Bytes::from_static(b"4"))])
            .boxed();
        let forward = ForwardStream::new(
            vec![Bytes::from_static(b"1"), Bytes::from_static(b"2")],
            inner,
            None,
            None,
        );
        let collected: Vec<Bytes> = forward.map(|r| r.unwrap()).collect().await;
        assert_eq!(collected, vec![
            Bytes::from_static(b"1"),
            Bytes::from_static(b"2"),
            Bytes::from_static(b"3"),
            Bytes::from_static(b"4"),
        ]);
    }

    #[tokio::test]
    async fn forward_stream_mirrors_inner_chunks_only() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let inner = stream::iter(vec![Ok(Bytes::from_static(b"live"))]).boxed();
        let forward = ForwardStream::new(
            vec![Bytes::from_static(b"prefix")],
            inner,
            Some(tx),
            None,
        );
        let _ = forward.map(|r| r.unwrap()).collect::<Vec<_>>().await;
        // The prefix is seeded into the mirror by the caller, not the stream.
        assert_eq!(rx.recv().await.unwrap().as_ref(), b"live");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn error_terminates_the_stream() {
        let inner = stream::iter(vec![
            Ok(Bytes::from_static(b"a")),
            Err(FetchError::Canceled),
        ])
        .boxed();
        let mut forward = ForwardStream::new(Vec::new(), inner, None, None);
        assert_eq!(forward.next().await.unwrap().unwrap().as_ref(), b"a");
        assert!(matches!(
            forward.next().await.unwrap(),
            Err(FetchError::Canceled)
        ));
        assert!(forward.next().await.is_none());
    }
}
