//! Origin transport over a reqwest client.
//!
//! The transport contract the handler relies on: the response head (status
//! and headers) resolves before any body byte, then the body arrives as a
//! chunk stream. reqwest provides exactly this — `send()` resolves at the
//! head, `bytes_stream()` yields the body — and the per-request timeout
//! covers both phases.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::error::FetchError;

/// Head and body of an opened origin response.
pub(crate) struct OriginResponse {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: BoxStream<'static, Result<Bytes, FetchError>>,
}

/// Origin-side HTTP transport.
#[derive(Clone, Debug)]
pub(crate) struct Origin {
    http: reqwest::Client,
}

impl Origin {
    pub(crate) fn new(http: reqwest::Client) -> Self {
        Origin { http }
    }

    /// Opens a request and waits for the response head.
    ///
    /// The returned body stream shares the request's timeout: a stall while
    /// reading chunks surfaces as [`FetchError::Timeout`].
    pub(crate) async fn open(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<Bytes>,
        timeout: Duration,
    ) -> Result<OriginResponse, FetchError> {
        let mut request = self
            .http
            .request(method, url)
            .headers(headers)
            .timeout(timeout);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| map_transport_error(err, timeout))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|err| map_transport_error(err, timeout)))
            .boxed();

        Ok(OriginResponse {
            status,
            headers,
            body,
        })
    }
}

/// Maps a transport error onto the gateway taxonomy.
pub(crate) fn map_transport_error(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else if err.is_builder() {
        FetchError::InvalidInput(err.to_string())
    } else if err.is_decode() {
        FetchError::OriginProtocol(Box::new(err))
    } else {
        FetchError::OriginNetwork(Box::new(err))
    }
}
