//! Request fingerprints and URL normalization.
//!
//! A [`Fingerprint`] identifies a cacheable request: the HTTP method paired
//! with a normalized URL. Two requests with equal fingerprints are served the
//! same cached entry, so normalization is deliberately conservative:
//!
//! - relative inputs are resolved against an optional base URL
//! - fragments are stripped (they never reach the origin)
//! - query parameter order is preserved as given
//!
//! ## Storage keys
//!
//! A fingerprint derives three storage keys for the persistent tier:
//!
//! | Key | Contents |
//! |---|---|
//! | [`storage_key`](Fingerprint::storage_key) | serialized buffered entry |
//! | [`stream_key`](Fingerprint::stream_key) | ordered list of stream chunks |
//! | [`stream_meta_key`](Fingerprint::stream_meta_key) | status + headers of the mirrored stream |
//!
//! ## Cheap cloning
//!
//! `Fingerprint` wraps its data in an [`Arc`], making `clone()` an O(1)
//! reference-count bump. Fingerprints are passed through every stage of the
//! fetch pipeline, so this matters.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use http::Method;
use url::Url;

/// Suffix appended to the storage key for the chunk-list entry.
const STREAM_SUFFIX: &str = ":stream";
/// Suffix appended to the storage key for the stream metadata entry.
const STREAM_META_SUFFIX: &str = ":stream:meta";

#[derive(Debug)]
struct FingerprintInner {
    method: Method,
    url: Url,
    /// Rendered `{method}:{url}` form, computed once at construction.
    rendered: String,
}

/// Canonical identity of a cacheable request.
///
/// # Example
///
/// ```
/// use http::Method;
/// use flowgate_core::Fingerprint;
///
/// let fp = Fingerprint::new(Method::GET, "https://origin.example/items?a=1&b=2", None).unwrap();
/// assert_eq!(fp.storage_key(), "GET:https://origin.example/items?a=1&b=2");
/// assert_eq!(fp.stream_key(), "GET:https://origin.example/items?a=1&b=2:stream");
/// assert!(fp.is_get());
/// ```
#[derive(Clone, Debug)]
pub struct Fingerprint {
    inner: Arc<FingerprintInner>,
}

impl Fingerprint {
    /// Builds a fingerprint from a method and a URL-like input.
    ///
    /// `input` may be absolute or, when `base` is provided, relative to it.
    /// The fragment is stripped; everything else (including query order) is
    /// preserved.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] when the input cannot be resolved into an
    /// absolute URL.
    pub fn new(method: Method, input: &str, base: Option<&Url>) -> Result<Self, url::ParseError> {
        let mut url = match Url::parse(input) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => match base {
                Some(base) => base.join(input)?,
                None => return Err(url::ParseError::RelativeUrlWithoutBase),
            },
            Err(err) => return Err(err),
        };
        url.set_fragment(None);
        Ok(Self::from_url(method, url))
    }

    /// Builds a fingerprint from an already-parsed URL.
    ///
    /// The fragment is stripped if present.
    pub fn from_url(method: Method, mut url: Url) -> Self {
        if url.fragment().is_some() {
            url.set_fragment(None);
        }
        let rendered = format!("{}:{}", method, url);
        Fingerprint {
            inner: Arc::new(FingerprintInner {
                method,
                url,
                rendered,
            }),
        }
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// Returns the normalized URL.
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Whether this fingerprint may enter the cache tiers.
    ///
    /// Only `GET` fingerprints are eligible for L1, L2, and single-flight.
    pub fn is_get(&self) -> bool {
        self.inner.method == Method::GET
    }

    /// Key for the buffered entry in the persistent store.
    pub fn storage_key(&self) -> &str {
        &self.inner.rendered
    }

    /// Key for the ordered chunk list of a mirrored stream.
    pub fn stream_key(&self) -> String {
        format!("{}{}", self.inner.rendered, STREAM_SUFFIX)
    }

    /// Key for the metadata record paired with the chunk list.
    pub fn stream_meta_key(&self) -> String {
        format!("{}{}", self.inner.rendered, STREAM_META_SUFFIX)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.rendered)
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        // Fast path: same Arc pointer
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.rendered == other.inner.rendered
    }
}

impl Eq for Fingerprint {}

impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.rendered.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_method_and_url() {
        let fp = Fingerprint::new(Method::GET, "https://o/x", None).unwrap();
        assert_eq!(fp.to_string(), "GET:https://o/x");
        assert_eq!(fp.storage_key(), "GET:https://o/x");
    }

    #[test]
    fn strips_fragment() {
        let fp = Fingerprint::new(Method::GET, "https://o/page#section-2", None).unwrap();
        assert_eq!(fp.storage_key(), "GET:https://o/page");
    }

    #[test]
    fn preserves_query_order() {
        let fp = Fingerprint::new(Method::GET, "https://o/q?z=1&a=2&z=3", None).unwrap();
        assert_eq!(fp.url().query(), Some("z=1&a=2&z=3"));
    }

    #[test]
    fn resolves_relative_against_base() {
        let base = Url::parse("https://origin.example/api/").unwrap();
        let fp = Fingerprint::new(Method::GET, "users?page=2", Some(&base)).unwrap();
        assert_eq!(
            fp.storage_key(),
            "GET:https://origin.example/api/users?page=2"
        );
    }

    #[test]
    fn relative_without_base_is_an_error() {
        let err = Fingerprint::new(Method::GET, "/just/a/path", None).unwrap_err();
        assert_eq!(err, url::ParseError::RelativeUrlWithoutBase);
    }

    #[test]
    fn derived_keys_share_the_prefix() {
        let fp = Fingerprint::new(Method::GET, "https://o/s", None).unwrap();
        assert_eq!(fp.stream_key(), "GET:https://o/s:stream");
        assert_eq!(fp.stream_meta_key(), "GET:https://o/s:stream:meta");
    }

    #[test]
    fn equality_ignores_arc_identity() {
        let a = Fingerprint::new(Method::GET, "https://o/x", None).unwrap();
        let b = Fingerprint::new(Method::GET, "https://o/x", None).unwrap();
        assert_eq!(a, b);
        let c = Fingerprint::new(Method::HEAD, "https://o/x", None).unwrap();
        assert_ne!(a, c);
    }
}
