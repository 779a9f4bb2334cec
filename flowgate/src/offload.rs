//! Background task tracking for cache side effects.
//!
//! Persistent-tier writes and stream mirrors run off the request path so
//! outbound latency never includes them. The manager keeps handles to the
//! live tasks so `dispose()` can abort everything still in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
struct TaskManagerInner {
    tasks: DashMap<u64, JoinHandle<()>>,
    next_id: AtomicU64,
}

/// Tracker for fire-and-forget background tasks.
#[derive(Clone, Debug, Default)]
pub(crate) struct TaskManager {
    inner: Arc<TaskManagerInner>,
}

impl TaskManager {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Spawns a task and tracks it until completion.
    pub(crate) fn spawn<F>(&self, kind: &'static str, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.prune();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(kind, id, "spawning background task");
        let handle = tokio::spawn(task);
        self.inner.tasks.insert(id, handle);
    }

    /// Aborts every live task.
    pub(crate) fn abort_all(&self) {
        self.inner.tasks.retain(|_, handle| {
            handle.abort();
            false
        });
    }

    /// Number of tasks still running.
    #[cfg(test)]
    pub(crate) fn active(&self) -> usize {
        self.prune();
        self.inner.tasks.len()
    }

    fn prune(&self) {
        self.inner.tasks.retain(|_, handle| !handle.is_finished());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[tokio::test]
    async fn tasks_are_pruned_after_completion() {
        let manager = TaskManager::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        manager.spawn("test", async move {
            let _ = rx.await;
        });
        assert_eq!(manager.active(), 1);
        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(manager.active(), 0);
    }

    #[tokio::test]
    async fn abort_all_stops_live_tasks() {
        let manager = TaskManager::new();
        manager.spawn("test", async {
            tokio::time::sleep(Duration::from_secs(600)).await;
        });
        manager.abort_all();
        assert_eq!(manager.active(), 0);
    }
}
