//! Lazy, TTL-gated configuration refresh.
//!
//! There is no polling loop: refresh is driven by request arrivals. On every
//! fetch entry the gateway asks the refresher to reload if the deadline has
//! passed and no reload is already in flight; the reload itself runs on a
//! background task so the triggering request proceeds with the snapshot it
//! already took.
//!
//! On a successful reload the refresher applies side effects — admission
//! resize and L1 capacity — and swaps the snapshot. Thresholds are read once
//! per request at entry, so in-flight requests keep the values they started
//! with. Reload failures are logged and keep the previous record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use flowgate_core::{ConfigSource, GatewayConfig};

use crate::admission::AdmissionController;
use crate::memory::MemoryCache;
use crate::offload::TaskManager;

/// Default interval between configuration reloads.
pub(crate) const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(300);

/// Holder of the active configuration snapshot and its refresh state.
pub(crate) struct ConfigState {
    source: Arc<dyn ConfigSource>,
    current: RwLock<GatewayConfig>,
    deadline: Mutex<Instant>,
    refresh_ttl: Duration,
    refreshing: AtomicBool,
}

impl ConfigState {
    pub(crate) fn new(
        source: Arc<dyn ConfigSource>,
        initial: GatewayConfig,
        refresh_ttl: Duration,
    ) -> Self {
        ConfigState {
            source,
            current: RwLock::new(initial),
            deadline: Mutex::new(Instant::now() + refresh_ttl),
            refresh_ttl,
            refreshing: AtomicBool::new(false),
        }
    }

    /// Clones the active configuration record.
    pub(crate) fn snapshot(&self) -> GatewayConfig {
        self.current
            .read()
            .expect("config snapshot lock poisoned")
            .clone()
    }

    /// Applies an in-place mutation (used by `configure`).
    pub(crate) fn update(&self, apply: impl FnOnce(&mut GatewayConfig)) {
        let mut current = self.current.write().expect("config snapshot lock poisoned");
        apply(&mut current);
    }

    /// Kicks off a background reload when the deadline has passed.
    ///
    /// Never blocks: returns immediately whether or not a reload started.
    pub(crate) fn maybe_refresh(
        self: Arc<Self>,
        admission: &Arc<AdmissionController>,
        l1: &Arc<MemoryCache>,
        tasks: &TaskManager,
    ) {
        {
            let deadline = self.deadline.lock().expect("refresh deadline lock poisoned");
            if Instant::now() < *deadline {
                return;
            }
        }
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let admission = Arc::clone(admission);
        let l1 = Arc::clone(l1);
        let state = self;
        tasks.spawn("config-refresh", async move {
            state.reload(&admission, &l1);
            *state
                .deadline
                .lock()
                .expect("refresh deadline lock poisoned") = Instant::now() + state.refresh_ttl;
            state.refreshing.store(false, Ordering::SeqCst);
        });
    }

    fn reload(&self, admission: &AdmissionController, l1: &MemoryCache) {
        let loaded = self.source.load().and_then(|config| {
            config.validate()?;
            Ok(config)
        });
        let config = match loaded {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "configuration reload failed, keeping previous record");
                return;
            }
        };

        let previous = {
            let mut current = self.current.write().expect("config snapshot lock poisoned");
            std::mem::replace(&mut *current, config.clone())
        };

        if config.concurrency != previous.concurrency {
            debug!(
                from = previous.concurrency,
                to = config.concurrency,
                "applying concurrency change"
            );
            if let Err(err) = admission.resize(config.concurrency) {
                warn!(error = %err, "failed to apply concurrency change");
            }
        }
        if config.cache_size != previous.cache_size {
            l1.resize(config.cache_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use flowgate_core::ConfigError;

    struct CountingSource {
        loads: AtomicUsize,
        concurrency: usize,
    }

    impl ConfigSource for CountingSource {
        fn load(&self) -> Result<GatewayConfig, ConfigError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(GatewayConfig {
                concurrency: self.concurrency,
                ..GatewayConfig::default()
            })
        }
    }

    fn fixture(concurrency: usize) -> (Arc<ConfigState>, Arc<CountingSource>) {
        let source = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
            concurrency,
        });
        let state = Arc::new(ConfigState::new(
            source.clone(),
            GatewayConfig::default(),
            Duration::from_millis(10),
        ));
        (state, source)
    }

    #[tokio::test]
    async fn no_reload_before_the_deadline() {
        let (state, source) = fixture(4);
        let admission = Arc::new(AdmissionController::new(10).unwrap());
        let l1 = Arc::new(MemoryCache::default());
        let tasks = TaskManager::new();

        state.clone().maybe_refresh(&admission, &l1, &tasks);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(source.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reload_applies_concurrency_after_the_deadline() {
        let (state, source) = fixture(3);
        let admission = Arc::new(AdmissionController::new(10).unwrap());
        let l1 = Arc::new(MemoryCache::default());
        let tasks = TaskManager::new();

        tokio::time::sleep(Duration::from_millis(15)).await;
        state.clone().maybe_refresh(&admission, &l1, &tasks);
        tokio::time::timeout(Duration::from_secs(1), async {
            while source.loads.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(state.snapshot().concurrency, 3);
        assert_eq!(admission.state().max, 3);
    }

    #[tokio::test]
    async fn failed_reload_keeps_the_previous_record() {
        struct FailingSource;
        impl ConfigSource for FailingSource {
            fn load(&self) -> Result<GatewayConfig, ConfigError> {
                Err(ConfigError::Invalid("boom".into()))
            }
        }

        let state = Arc::new(ConfigState::new(
            Arc::new(FailingSource),
            GatewayConfig::default(),
            Duration::from_millis(1),
        ));
        let admission = Arc::new(AdmissionController::new(10).unwrap());
        let l1 = Arc::new(MemoryCache::default());
        let tasks = TaskManager::new();

        tokio::time::sleep(Duration::from_millis(5)).await;
        state.clone().maybe_refresh(&admission, &l1, &tasks);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(state.snapshot(), GatewayConfig::default());
        assert_eq!(admission.state().max, 10);
    }
}
