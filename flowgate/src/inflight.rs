//! Single-flight registry for in-flight origin requests.
//!
//! Concurrent identical `GET` misses must reach the origin at most once. The
//! registry maps fingerprints to broadcast channels: the first miss installs
//! an entry and becomes the *leader*; later misses subscribe and become
//! *followers*, sharing the leader's outcome.
//!
//! Entries exist only between install and resolution. Resolution (success or
//! failure) removes the entry, so a failed flight never poisons the next
//! attempt — the next caller simply becomes a fresh leader.
//!
//! Followers hold nothing but a receiver: dropping one detaches it without
//! disturbing the leader, whose cache side effects always run to completion.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;

use flowgate_core::{CachedValue, Fingerprint};

/// Broadcast capacity. A flight sends exactly one message, but headroom
/// keeps slow followers from observing `Lagged` when entries are recycled.
const CHANNEL_CAPACITY: usize = 16;

/// Shared result of a completed flight.
#[derive(Clone, Debug)]
pub enum FlightOutcome {
    /// The origin response was buffered; followers reuse it directly.
    Buffered(Arc<CachedValue>),
    /// The origin response streamed. The mirror (if enabled) has finished
    /// populating the persistent chunk replay; followers read it from there.
    Streamed,
}

/// Errors a follower can observe while waiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlightError {
    /// The receiver lagged behind and missed the outcome.
    Lagged(u64),
    /// The leader finished without resolving (its request failed).
    Closed,
}

/// Decision returned by [`InflightRegistry::begin`].
pub enum Flight {
    /// No flight was in progress; the caller leads and must resolve the
    /// guard on every path.
    Leader(FlightGuard),
    /// Another caller leads; await its outcome.
    Follower(FlightFollower),
}

type FlightMap = DashMap<String, broadcast::Sender<FlightOutcome>>;

/// Registry of in-flight origin requests keyed by fingerprint.
///
/// Cheap to clone; clones share the same flight map.
#[derive(Clone, Debug, Default)]
pub struct InflightRegistry {
    in_flight: Arc<FlightMap>,
}

impl InflightRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins or starts the flight for `fingerprint`.
    ///
    /// The decision is atomic: between two concurrent calls for the same
    /// fingerprint, exactly one becomes the leader.
    pub fn begin(&self, fingerprint: &Fingerprint) -> Flight {
        let key = fingerprint.storage_key().to_owned();
        match self.in_flight.entry(key) {
            Entry::Occupied(entry) => Flight::Follower(FlightFollower {
                receiver: entry.get().subscribe(),
            }),
            Entry::Vacant(entry) => {
                let (sender, _receiver) = broadcast::channel(CHANNEL_CAPACITY);
                let key = entry.key().clone();
                entry.insert(sender.clone());
                Flight::Leader(FlightGuard {
                    entries: Arc::clone(&self.in_flight),
                    key,
                    sender,
                    resolved: false,
                })
            }
        }
    }

    /// Number of flights currently in progress.
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether no flight is in progress.
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Drops every entry. Outstanding leaders resolve into the void; their
    /// followers observe `Closed` and retry.
    pub fn clear(&self) {
        self.in_flight.clear();
    }
}

/// Leader-side handle for an installed flight.
///
/// Dropping the guard without [`resolve`](FlightGuard::resolve) removes the
/// entry and closes the channel, signalling followers to retry.
#[derive(Debug)]
pub struct FlightGuard {
    entries: Arc<FlightMap>,
    key: String,
    sender: broadcast::Sender<FlightOutcome>,
    resolved: bool,
}

impl FlightGuard {
    /// Completes the flight, removing the registry entry and broadcasting
    /// the outcome to every follower.
    pub fn resolve(mut self, outcome: FlightOutcome) {
        self.entries.remove(&self.key);
        // A send error just means nobody is waiting.
        let _ = self.sender.send(outcome);
        self.resolved = true;
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if !self.resolved {
            self.entries.remove(&self.key);
        }
    }
}

/// Follower-side handle awaiting the leader's outcome.
#[derive(Debug)]
pub struct FlightFollower {
    receiver: broadcast::Receiver<FlightOutcome>,
}

impl FlightFollower {
    /// Waits for the flight to resolve.
    pub async fn outcome(mut self) -> Result<FlightOutcome, FlightError> {
        self.receiver.recv().await.map_err(|err| match err {
            broadcast::error::RecvError::Lagged(n) => FlightError::Lagged(n),
            broadcast::error::RecvError::Closed => FlightError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};

    fn fp() -> Fingerprint {
        Fingerprint::new(Method::GET, "https://o/x", None).unwrap()
    }

    fn leader(registry: &InflightRegistry) -> FlightGuard {
        match registry.begin(&fp()) {
            Flight::Leader(guard) => guard,
            Flight::Follower(_) => panic!("expected leader"),
        }
    }

    fn follower(registry: &InflightRegistry) -> FlightFollower {
        match registry.begin(&fp()) {
            Flight::Follower(follower) => follower,
            Flight::Leader(_) => panic!("expected follower"),
        }
    }

    #[tokio::test]
    async fn followers_share_the_leader_outcome() {
        let registry = InflightRegistry::new();
        let guard = leader(&registry);
        let first = follower(&registry);
        let second = follower(&registry);

        let value = Arc::new(CachedValue::new(
            StatusCode::OK,
            &HeaderMap::new(),
            Bytes::from_static(b"hello"),
        ));
        guard.resolve(FlightOutcome::Buffered(value));

        for waiter in [first, second] {
            match waiter.outcome().await.unwrap() {
                FlightOutcome::Buffered(cached) => assert_eq!(cached.body.as_ref(), b"hello"),
                FlightOutcome::Streamed => panic!("expected buffered outcome"),
            }
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn dropped_leader_closes_the_flight() {
        let registry = InflightRegistry::new();
        let guard = leader(&registry);
        let waiter = follower(&registry);

        drop(guard);
        assert_eq!(waiter.outcome().await.unwrap_err(), FlightError::Closed);
        // The failed flight does not poison the next attempt.
        let _fresh = leader(&registry);
    }

    #[tokio::test]
    async fn streamed_outcome_reaches_followers() {
        let registry = InflightRegistry::new();
        let guard = leader(&registry);
        let waiter = follower(&registry);

        guard.resolve(FlightOutcome::Streamed);
        assert!(matches!(
            waiter.outcome().await.unwrap(),
            FlightOutcome::Streamed
        ));
    }

    #[tokio::test]
    async fn resolution_frees_the_key_for_new_leaders() {
        let registry = InflightRegistry::new();
        let guard = leader(&registry);
        guard.resolve(FlightOutcome::Streamed);
        let _next = leader(&registry);
        assert_eq!(registry.len(), 1);
    }
}
