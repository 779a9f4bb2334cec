//! Metrics declaration and recording helpers.
//!
//! All helpers compile to no-ops unless the `metrics` feature is enabled.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track number of L1 cache hits.
    pub static ref CACHE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "gateway_cache_hit_total",
            "Total number of requests served from the in-process cache."
        );
        "gateway_cache_hit_total"
    };
    /// Track number of cache misses reaching the miss pipeline.
    pub static ref CACHE_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "gateway_cache_miss_total",
            "Total number of requests that missed the in-process cache."
        );
        "gateway_cache_miss_total"
    };
    /// Track number of requests coalesced onto an in-flight origin call.
    pub static ref INFLIGHT_DEDUPE_COUNTER: &'static str = {
        metrics::describe_counter!(
            "gateway_inflight_dedupe_total",
            "Total number of requests deduplicated onto an in-flight origin call."
        );
        "gateway_inflight_dedupe_total"
    };
    /// Track number of persistent-tier hits by mode.
    pub static ref L2_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "gateway_l2_hit_total",
            "Total number of requests served from the persistent tier."
        );
        "gateway_l2_hit_total"
    };
    /// Track number of streaming deliveries.
    pub static ref STREAMING_COUNTER: &'static str = {
        metrics::describe_counter!(
            "gateway_streaming_total",
            "Total number of responses delivered as streams."
        );
        "gateway_streaming_total"
    };
    /// Track number of surfaced errors by kind.
    pub static ref ERROR_COUNTER: &'static str = {
        metrics::describe_counter!(
            "gateway_error_total",
            "Total number of fetch errors surfaced to callers."
        );
        "gateway_error_total"
    };
}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record_cache_hit() {
    metrics::counter!(*CACHE_HIT_COUNTER).increment(1);
}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record_cache_miss() {
    metrics::counter!(*CACHE_MISS_COUNTER).increment(1);
}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record_inflight_dedupe() {
    metrics::counter!(*INFLIGHT_DEDUPE_COUNTER).increment(1);
}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record_l2_hit(mode: &'static str) {
    metrics::counter!(*L2_HIT_COUNTER, "mode" => mode).increment(1);
}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record_streaming() {
    metrics::counter!(*STREAMING_COUNTER).increment(1);
}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record_error(kind: &'static str) {
    metrics::counter!(*ERROR_COUNTER, "kind" => kind).increment(1);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record_cache_hit() {}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record_cache_miss() {}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record_inflight_dedupe() {}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record_l2_hit(_mode: &'static str) {}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record_streaming() {}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record_error(_kind: &'static str) {}
