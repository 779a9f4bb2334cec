//! The gateway facade and the fetch pipeline.
//!
//! A [`Gateway`] is an explicit instance with a create → configure → dispose
//! lifecycle: no globals, no background polling. A `GET` flows through the
//! tiers in order, short-circuiting at the first one that answers:
//!
//! ```text
//! fingerprint → L1 → single-flight → L2 (buffered | chunked replay)
//!             → admission → origin → classify → stream | buffer
//!             → L1/L2 write → release
//! ```
//!
//! Non-`GET` requests pass through admission only. When the `enhanced`
//! switch is off, requests are delegated to the transport untouched.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use url::Url;

use flowgate_core::{
    CachedValue, ChunkedMeta, ConfigSource, EntryStore, Fingerprint, GatewayConfig, Raw,
    StaticSource, StoreResult,
};

use crate::admission::{AdmissionController, AdmissionPermit, AdmissionState};
use crate::body::{FetchResponse, ForwardStream};
use crate::classify::{ResponseKind, classify};
use crate::error::FetchError;
use crate::inflight::{Flight, FlightGuard, FlightOutcome, InflightRegistry};
use crate::memory::MemoryCache;
use crate::metrics;
use crate::offload::TaskManager;
use crate::origin::{Origin, OriginResponse};
use crate::refresh::{ConfigState, DEFAULT_REFRESH_TTL};
use crate::tier::{L2Hit, TieredStore};

/// Attempts before a follower gives up on coalescing and goes to origin.
const MAX_COALESCE_ATTEMPTS: usize = 3;

/// A URL-like fetch target.
///
/// Strings may be absolute or relative to the gateway's configured base URL.
#[derive(Clone, Debug)]
pub enum FetchTarget {
    /// An already-parsed URL.
    Url(Url),
    /// A raw string, resolved at fetch time.
    Raw(String),
}

impl From<&str> for FetchTarget {
    fn from(value: &str) -> Self {
        FetchTarget::Raw(value.to_owned())
    }
}

impl From<String> for FetchTarget {
    fn from(value: String) -> Self {
        FetchTarget::Raw(value)
    }
}

impl From<Url> for FetchTarget {
    fn from(value: Url) -> Self {
        FetchTarget::Url(value)
    }
}

impl From<&Url> for FetchTarget {
    fn from(value: &Url) -> Self {
        FetchTarget::Url(value.clone())
    }
}

/// Per-call options for [`Gateway::fetch`].
#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
    /// Request method; `GET` when unset.
    pub method: Option<Method>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body for non-`GET` methods; opaque to the gateway.
    pub body: Option<Bytes>,
    /// Per-request timeout override.
    pub timeout: Option<Duration>,
}

impl FetchOptions {
    /// Empty options: a `GET` with default timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Appends a request header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Overrides the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Live-applied settings for [`Gateway::configure`].
///
/// Unset fields keep their current values.
#[derive(Clone, Debug, Default)]
pub struct GatewayOptions {
    /// New admission limit (minimum 1).
    pub concurrency: Option<usize>,
    /// New L1 capacity (minimum 1).
    pub cache_size: Option<usize>,
    /// New early-buffer size.
    pub stream_detect_buffer: Option<usize>,
    /// New promotion threshold.
    pub stream_buffer_max: Option<usize>,
    /// New buffering ceiling.
    pub max_response_size: Option<usize>,
    /// New default request timeout.
    pub request_timeout: Option<Duration>,
}

/// Builder for [`Gateway`].
pub struct GatewayBuilder {
    store: Option<Arc<dyn EntryStore>>,
    source: Option<Arc<dyn ConfigSource>>,
    transport: Option<reqwest::Client>,
    base_url: Option<Url>,
    refresh_ttl: Duration,
}

impl GatewayBuilder {
    fn new() -> Self {
        GatewayBuilder {
            store: None,
            source: None,
            transport: None,
            base_url: None,
            refresh_ttl: DEFAULT_REFRESH_TTL,
        }
    }

    /// Sets the persistent store backing the second cache tier.
    ///
    /// Without a store the persistent tier always misses and writes are
    /// discarded.
    pub fn store(mut self, store: Arc<dyn EntryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the configuration provider.
    pub fn config_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets a fixed configuration record.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.source = Some(Arc::new(StaticSource::new(config)));
        self
    }

    /// Sets the origin HTTP transport.
    pub fn transport(mut self, client: reqwest::Client) -> Self {
        self.transport = Some(client);
        self
    }

    /// Sets the base URL for resolving relative fetch targets.
    pub fn base_url(mut self, base: Url) -> Self {
        self.base_url = Some(base);
        self
    }

    /// Sets the interval between lazy configuration reloads.
    pub fn refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    /// Builds the gateway.
    ///
    /// An unreadable or invalid initial configuration is logged and replaced
    /// by the defaults; it never fails construction.
    pub fn build(self) -> Gateway {
        let source = self
            .source
            .unwrap_or_else(|| Arc::new(StaticSource::default()));
        let initial = source
            .load()
            .and_then(|config| {
                config.validate()?;
                Ok(config)
            })
            .unwrap_or_else(|err| {
                warn!(error = %err, "initial configuration unavailable, using defaults");
                GatewayConfig::default()
            });

        let admission = Arc::new(
            AdmissionController::new(initial.concurrency)
                .expect("validated configuration has concurrency >= 1"),
        );
        let l1 = Arc::new(MemoryCache::new(initial.cache_size));
        let store = self.store.unwrap_or_else(|| Arc::new(NullStore));
        let config = Arc::new(ConfigState::new(source, initial, self.refresh_ttl));

        Gateway {
            inner: Arc::new(GatewayInner {
                admission,
                l1,
                inflight: InflightRegistry::new(),
                l2: TieredStore::new(store),
                config,
                origin: Origin::new(self.transport.unwrap_or_default()),
                tasks: TaskManager::new(),
                base_url: self.base_url,
                disposed: AtomicBool::new(false),
            }),
        }
    }
}

/// Store stand-in used when no persistent tier is configured: reads always
/// miss, writes are accepted and discarded.
struct NullStore;

#[async_trait::async_trait]
impl EntryStore for NullStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<Raw>> {
        Ok(None)
    }
    async fn set_ex(&self, _key: &str, _ttl: Duration, _value: Raw) -> StoreResult<()> {
        Ok(())
    }
    async fn del(&self, _key: &str) -> StoreResult<()> {
        Ok(())
    }
    async fn llen(&self, _key: &str) -> StoreResult<usize> {
        Ok(0)
    }
    async fn lrange(&self, _key: &str) -> StoreResult<Vec<Raw>> {
        Ok(Vec::new())
    }
    async fn rpush(&self, _key: &str, _value: Raw) -> StoreResult<()> {
        Ok(())
    }
    async fn expire(&self, _key: &str, _ttl: Duration) -> StoreResult<()> {
        Ok(())
    }
}

struct GatewayInner {
    admission: Arc<AdmissionController>,
    l1: Arc<MemoryCache>,
    inflight: InflightRegistry,
    l2: TieredStore,
    config: Arc<ConfigState>,
    origin: Origin,
    tasks: TaskManager,
    base_url: Option<Url>,
    disposed: AtomicBool,
}

/// Accelerating HTTP client gateway.
///
/// Cheap to clone; clones share every tier and the admission pool.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl Gateway {
    /// Starts building a gateway.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Fetches a response through the cache tiers.
    ///
    /// Identical concurrent `GET` misses reach the origin at most once;
    /// repeated `GET`s are served from memory or the persistent tier while
    /// their entries live. Non-`GET` methods skip every cache and pass only
    /// through admission.
    #[instrument(level = "debug", skip_all)]
    pub async fn fetch(
        &self,
        target: impl Into<FetchTarget>,
        options: FetchOptions,
    ) -> Result<FetchResponse, FetchError> {
        let result = self.fetch_inner(target.into(), options).await;
        if let Err(err) = &result {
            metrics::record_error(err.kind());
        }
        result
    }

    /// Fetches a response as a stream, bypassing every cache tier.
    ///
    /// For callers that already know the response is a stream. Admission
    /// still applies.
    #[instrument(level = "debug", skip_all)]
    pub async fn fetch_stream(
        &self,
        target: impl Into<FetchTarget>,
        options: FetchOptions,
    ) -> Result<FetchResponse, FetchError> {
        self.ensure_live()?;
        let inner = &self.inner;
        let config = inner.config.snapshot();
        inner
            .config
            .clone()
            .maybe_refresh(&inner.admission, &inner.l1, &inner.tasks);

        let method = options.method.clone().unwrap_or(Method::GET);
        let url = inner.resolve(&target.into(), &method)?;
        let timeout = options.timeout.unwrap_or(config.request_timeout);

        if !config.enhanced {
            return inner.passthrough(method, url, options, timeout).await;
        }

        let permit = inner.admission.clone().acquire().await;
        let response = match inner
            .origin
            .open(method, url, options.headers, options.body, timeout)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                permit.release();
                return Err(err);
            }
        };
        metrics::record_streaming();
        Ok(inner.streaming_response(response, Some(permit), None, None))
    }

    /// Applies new settings to the live instance.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidInput`] for a zero `concurrency` or
    /// `cache_size`, or when the gateway is disposed.
    pub fn configure(&self, options: GatewayOptions) -> Result<(), FetchError> {
        self.ensure_live()?;
        if let Some(concurrency) = options.concurrency {
            self.inner
                .admission
                .resize(concurrency)
                .map_err(|err| FetchError::InvalidInput(err.to_string()))?;
        }
        if let Some(cache_size) = options.cache_size {
            if cache_size == 0 {
                return Err(FetchError::InvalidInput(
                    "cache_size must be at least 1".into(),
                ));
            }
            self.inner.l1.resize(cache_size);
        }
        self.inner.config.update(|config| {
            if let Some(concurrency) = options.concurrency {
                config.concurrency = concurrency;
            }
            if let Some(cache_size) = options.cache_size {
                config.cache_size = cache_size;
            }
            if let Some(detect) = options.stream_detect_buffer {
                config.stream_detect_buffer = detect;
            }
            if let Some(promote) = options.stream_buffer_max {
                config.stream_buffer_max = promote;
            }
            if let Some(ceiling) = options.max_response_size {
                config.max_response_size = ceiling;
            }
            if let Some(timeout) = options.request_timeout {
                config.request_timeout = timeout;
            }
        });
        Ok(())
    }

    /// Clears the in-process cache and the single-flight registry.
    ///
    /// Outstanding flights resolve into the void; their followers retry.
    pub fn reset(&self) {
        self.inner.l1.clear();
        self.inner.inflight.clear();
    }

    /// Shuts the instance down: clears process state, aborts background
    /// cache writes, and fails subsequent calls.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.reset();
        self.inner.tasks.abort_all();
    }

    /// Observability snapshot of the admission pool.
    pub fn admission_state(&self) -> AdmissionState {
        self.inner.admission.state()
    }

    fn ensure_live(&self) -> Result<(), FetchError> {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return Err(FetchError::InvalidInput(
                "gateway has been disposed".into(),
            ));
        }
        Ok(())
    }

    async fn fetch_inner(
        &self,
        target: FetchTarget,
        options: FetchOptions,
    ) -> Result<FetchResponse, FetchError> {
        self.ensure_live()?;
        let inner = &self.inner;
        // Thresholds are read once per request; the refresher only affects
        // later requests.
        let config = inner.config.snapshot();
        inner
            .config
            .clone()
            .maybe_refresh(&inner.admission, &inner.l1, &inner.tasks);

        let method = options.method.clone().unwrap_or(Method::GET);
        let url = inner.resolve(&target, &method)?;
        let timeout = options.timeout.unwrap_or(config.request_timeout);

        if !config.enhanced {
            return inner.passthrough(method, url, options, timeout).await;
        }

        if method != Method::GET {
            let permit = inner.admission.clone().acquire().await;
            let response = match inner
                .origin
                .open(method, url, options.headers, options.body, timeout)
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    permit.release();
                    return Err(err);
                }
            };
            return inner
                .handle_origin_response(response, permit, None, &config)
                .await;
        }

        let fingerprint = Fingerprint::from_url(Method::GET, url);
        let mut attempts = 0;
        loop {
            attempts += 1;
            match inner
                .fetch_cached(&fingerprint, &options.headers, &config, timeout)
                .await?
            {
                Some(response) => return Ok(response),
                None if attempts < MAX_COALESCE_ATTEMPTS => {
                    debug!(fingerprint = %fingerprint, attempts, "coalesced fetch unresolved, retrying");
                }
                None => {
                    // The flight we followed failed repeatedly; go to origin
                    // directly without coalescing.
                    debug!(fingerprint = %fingerprint, "coalescing exhausted, fetching origin directly");
                    let permit = inner.admission.clone().acquire().await;
                    let response = match inner
                        .origin
                        .open(
                            Method::GET,
                            fingerprint.url().clone(),
                            options.headers.clone(),
                            None,
                            timeout,
                        )
                        .await
                    {
                        Ok(response) => response,
                        Err(err) => {
                            permit.release();
                            return Err(err);
                        }
                    };
                    return inner
                        .handle_origin_response(response, permit, None, &config)
                        .await;
                }
            }
        }
    }
}

impl GatewayInner {
    fn resolve(&self, target: &FetchTarget, method: &Method) -> Result<Url, FetchError> {
        let fingerprint = match target {
            FetchTarget::Url(url) => Fingerprint::from_url(method.clone(), url.clone()),
            FetchTarget::Raw(raw) => Fingerprint::new(method.clone(), raw, self.base_url.as_ref())
                .map_err(|err| FetchError::InvalidInput(format!("{raw:?}: {err}")))?,
        };
        Ok(fingerprint.url().clone())
    }

    /// One pass through the cached `GET` pipeline.
    ///
    /// `Ok(None)` means a followed flight resolved without a usable
    /// artifact and the caller should retry.
    async fn fetch_cached(
        &self,
        fingerprint: &Fingerprint,
        headers: &HeaderMap,
        config: &GatewayConfig,
        timeout: Duration,
    ) -> Result<Option<FetchResponse>, FetchError> {
        if let Some(value) = self.l1.get(fingerprint) {
            debug!(fingerprint = %fingerprint, "memory cache hit");
            metrics::record_cache_hit();
            return Ok(Some(FetchResponse::buffered(&value)));
        }
        metrics::record_cache_miss();

        match self.inflight.begin(fingerprint) {
            Flight::Follower(follower) => {
                debug!(fingerprint = %fingerprint, "joining in-flight request");
                metrics::record_inflight_dedupe();
                match follower.outcome().await {
                    Ok(FlightOutcome::Buffered(value)) => {
                        Ok(Some(FetchResponse::buffered(&value)))
                    }
                    Ok(FlightOutcome::Streamed) => Ok(self.replay_from_l2(fingerprint).await),
                    Err(err) => {
                        debug!(fingerprint = %fingerprint, ?err, "flight failed before resolving");
                        Ok(None)
                    }
                }
            }
            Flight::Leader(guard) => {
                // A flight may have resolved between the L1 miss and our
                // install; its value would be in L1 by now.
                if let Some(value) = self.l1.get(fingerprint) {
                    metrics::record_cache_hit();
                    guard.resolve(FlightOutcome::Buffered(Arc::clone(&value)));
                    return Ok(Some(FetchResponse::buffered(&value)));
                }

                match self.l2.read(fingerprint).await {
                    Some(L2Hit::Buffered(value)) => {
                        debug!(fingerprint = %fingerprint, "persistent cache hit (buffered)");
                        metrics::record_l2_hit("buffered");
                        let value = Arc::new(value);
                        self.l1.insert(fingerprint.clone(), Arc::clone(&value));
                        guard.resolve(FlightOutcome::Buffered(Arc::clone(&value)));
                        Ok(Some(FetchResponse::buffered(&value)))
                    }
                    Some(L2Hit::Chunked { meta, chunks }) => {
                        debug!(fingerprint = %fingerprint, chunks = chunks.len(), "persistent cache hit (chunked replay)");
                        metrics::record_l2_hit("chunked");
                        guard.resolve(FlightOutcome::Streamed);
                        Ok(Some(replay_response(meta, chunks)))
                    }
                    None => {
                        let response = self
                            .fetch_origin(fingerprint, headers, config, timeout, guard)
                            .await?;
                        Ok(Some(response))
                    }
                }
            }
        }
    }

    /// Serves a follower of a streamed flight from the persistent replay.
    async fn replay_from_l2(&self, fingerprint: &Fingerprint) -> Option<FetchResponse> {
        match self.l2.read(fingerprint).await? {
            L2Hit::Buffered(value) => Some(FetchResponse::buffered(&value)),
            L2Hit::Chunked { meta, chunks } => Some(replay_response(meta, chunks)),
        }
    }

    /// The origin leg: admission, head, classification, delivery.
    async fn fetch_origin(
        &self,
        fingerprint: &Fingerprint,
        headers: &HeaderMap,
        config: &GatewayConfig,
        timeout: Duration,
        guard: FlightGuard,
    ) -> Result<FetchResponse, FetchError> {
        let permit = self.admission.clone().acquire().await;
        let response = match self
            .origin
            .open(
                Method::GET,
                fingerprint.url().clone(),
                headers.clone(),
                None,
                timeout,
            )
            .await
        {
            Ok(response) => response,
            Err(err) => {
                // Guard drops here: followers observe the closed flight and
                // retry instead of inheriting the failure.
                permit.release();
                return Err(err);
            }
        };
        self.handle_origin_response(response, permit, Some((fingerprint.clone(), guard)), config)
            .await
    }

    /// Classifies an opened response and delivers it, caching when a flight
    /// context is present.
    async fn handle_origin_response(
        &self,
        response: OriginResponse,
        permit: AdmissionPermit,
        flight: Option<(Fingerprint, FlightGuard)>,
        config: &GatewayConfig,
    ) -> Result<FetchResponse, FetchError> {
        match classify(&response.headers) {
            ResponseKind::Streaming => {
                metrics::record_streaming();
                Ok(self.deliver_streaming(response, permit, flight, config, Vec::new()))
            }
            ResponseKind::Bufferable => {
                self.buffer_or_promote(response, permit, flight, config).await
            }
        }
    }

    /// The early-buffer loop.
    ///
    /// Accumulates body chunks until the body ends (buffered response),
    /// accumulation passes the promotion threshold (pass-through stream), or
    /// the ceiling is hit (typed failure).
    async fn buffer_or_promote(
        &self,
        mut response: OriginResponse,
        permit: AdmissionPermit,
        flight: Option<(Fingerprint, FlightGuard)>,
        config: &GatewayConfig,
    ) -> Result<FetchResponse, FetchError> {
        // The accumulator starts at the detect-buffer size; responses that
        // end within it complete without reallocation.
        let mut buffered = BytesMut::with_capacity(config.stream_detect_buffer);

        loop {
            match response.body.next().await {
                Some(Ok(chunk)) => {
                    buffered.extend_from_slice(&chunk);
                    if buffered.len() > config.stream_buffer_max {
                        debug!(
                            bytes = buffered.len(),
                            "buffer passed promotion threshold, streaming"
                        );
                        metrics::record_streaming();
                        let prefix = buffered.freeze();
                        return Ok(self.deliver_streaming(
                            response,
                            permit,
                            flight,
                            config,
                            vec![prefix],
                        ));
                    }
                    if buffered.len() > config.max_response_size {
                        permit.release();
                        return Err(FetchError::ResponseTooLarge {
                            limit: config.max_response_size,
                        });
                    }
                }
                Some(Err(err)) => {
                    permit.release();
                    return Err(err);
                }
                None => break,
            }
        }

        let value = Arc::new(CachedValue::new(
            response.status,
            &response.headers,
            buffered.freeze(),
        ));

        if let Some((fingerprint, guard)) = flight {
            self.l1.insert(fingerprint.clone(), Arc::clone(&value));
            guard.resolve(FlightOutcome::Buffered(Arc::clone(&value)));
            let tier = self.l2.clone();
            let ttl = config.cache_ttl;
            let stored = Arc::clone(&value);
            // The response settles before this write runs; outbound latency
            // never includes the persistent tier.
            self.tasks.spawn("buffered-write", async move {
                tier.write_buffered(&fingerprint, &stored, ttl).await;
            });
        }
        permit.release();
        Ok(FetchResponse::buffered(&value))
    }

    /// Builds the outbound pass-through stream and, when caching applies,
    /// the mirror task that feeds the persistent tier.
    fn deliver_streaming(
        &self,
        response: OriginResponse,
        permit: AdmissionPermit,
        flight: Option<(Fingerprint, FlightGuard)>,
        config: &GatewayConfig,
        prefix: Vec<Bytes>,
    ) -> FetchResponse {
        let mirror = match flight {
            Some((fingerprint, guard)) if config.stream_enabled => {
                let meta = ChunkedMeta::new(response.status, &response.headers);
                let mut sink = self.l2.chunk_sink(
                    &fingerprint,
                    meta,
                    config.cache_ttl,
                    config.stream_max_total_bytes,
                    config.stream_max_chunks,
                );
                let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
                for chunk in &prefix {
                    let _ = tx.send(chunk.clone());
                }
                self.tasks.spawn("stream-mirror", async move {
                    while let Some(chunk) = rx.recv().await {
                        sink.push(&chunk).await;
                    }
                    sink.finish().await;
                    // Resolve only after the replay is complete so followers
                    // read a finished chunk list.
                    guard.resolve(FlightOutcome::Streamed);
                });
                Some(tx)
            }
            Some((_, guard)) => {
                // Mirroring disabled: there is no replay artifact to share.
                guard.resolve(FlightOutcome::Streamed);
                None
            }
            None => None,
        };
        self.streaming_response(response, Some(permit), mirror, Some(prefix))
    }

    fn streaming_response(
        &self,
        response: OriginResponse,
        permit: Option<AdmissionPermit>,
        mirror: Option<mpsc::UnboundedSender<Bytes>>,
        prefix: Option<Vec<Bytes>>,
    ) -> FetchResponse {
        let stream = ForwardStream::new(
            prefix.unwrap_or_default(),
            response.body,
            mirror,
            permit,
        );
        FetchResponse::streaming(response.status, response.headers, stream.boxed())
    }

    /// `enhanced = false`: hand the request to the transport untouched.
    async fn passthrough(
        &self,
        method: Method,
        url: Url,
        options: FetchOptions,
        timeout: Duration,
    ) -> Result<FetchResponse, FetchError> {
        debug!(%url, "enhanced mode disabled, delegating to transport");
        let response = self
            .origin
            .open(method, url, options.headers, options.body, timeout)
            .await?;
        Ok(self.streaming_response(response, None, None, None))
    }
}

/// Reconstructs a streaming response from mirrored chunks.
fn replay_response(meta: ChunkedMeta, chunks: Vec<Bytes>) -> FetchResponse {
    let body = stream::iter(chunks.into_iter().map(Ok)).boxed();
    FetchResponse::streaming(meta.status, meta.headers, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_targets_resolve_against_the_base() {
        let gateway = Gateway::builder()
            .base_url(Url::parse("https://origin.example/api/").unwrap())
            .build();
        let url = gateway
            .inner
            .resolve(&FetchTarget::from("users/1"), &Method::GET)
            .unwrap();
        assert_eq!(url.as_str(), "https://origin.example/api/users/1");
    }

    #[test]
    fn unresolvable_targets_are_invalid_input() {
        let gateway = Gateway::builder().build();
        let err = gateway
            .inner
            .resolve(&FetchTarget::from("/no/base"), &Method::GET)
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn disposed_gateway_rejects_calls() {
        let gateway = Gateway::builder().build();
        gateway.dispose();
        let err = gateway
            .fetch("https://o/x", FetchOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidInput(_)));
        assert!(gateway.configure(GatewayOptions::default()).is_err());
    }

    #[test]
    fn configure_rejects_zero_values() {
        let gateway = Gateway::builder().build();
        let err = gateway
            .configure(GatewayOptions {
                concurrency: Some(0),
                ..GatewayOptions::default()
            })
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidInput(_)));
        let err = gateway
            .configure(GatewayOptions {
                cache_size: Some(0),
                ..GatewayOptions::default()
            })
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidInput(_)));
    }
}
