//! Admission control for concurrent origin requests.
//!
//! The [`AdmissionController`] is the sole rate-limiting resource in the
//! gateway: every origin call holds exactly one permit for its lifetime.
//! Waiters queue FIFO, and the limit can be resized at runtime without
//! interrupting in-flight requests.
//!
//! ## Resize semantics
//!
//! Growing the limit releases the extra permits to waiters in queue order.
//! Shrinking never revokes held permits: idle permits are removed
//! immediately and the remainder is booked as *debt*, repaid by future
//! releases before any permit returns to the pool. Throughput converges on
//! the new limit as holders finish.
//!
//! ## Release discipline
//!
//! [`AdmissionPermit`] releases on drop, which makes the pairing invariant
//! (one release per acquire, on every termination path including
//! cancellation and stream abandonment) structural rather than
//! conventional. Permits travel with the work they admit: the fetch path
//! moves them into response bodies so a permit is held until the body is
//! fully delivered or abandoned.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::error;

/// Error type for admission operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    /// The requested limit is not a positive integer.
    #[error("admission limit must be at least 1, got {0}")]
    InvalidLimit(usize),
}

/// Observable snapshot of the admission pool.
///
/// Diagnostic only; no correctness decision may consume it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdmissionState {
    /// Current configured limit.
    pub max: usize,
    /// Permits available for immediate acquisition.
    pub available: usize,
    /// Permits currently held.
    pub active: usize,
    /// Callers queued in `acquire`.
    pub waiting: usize,
}

#[derive(Debug)]
struct Pool {
    max: usize,
    /// Permits owed back to the semaphore after a shrink. Releases repay
    /// debt before returning permits to the pool.
    debt: usize,
}

/// Counting semaphore with FIFO waiters and live resize.
#[derive(Debug)]
pub struct AdmissionController {
    semaphore: Semaphore,
    pool: Mutex<Pool>,
    active: AtomicUsize,
    waiting: AtomicUsize,
}

impl AdmissionController {
    /// Creates a controller with the given limit.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::InvalidLimit`] when `limit` is zero.
    pub fn new(limit: usize) -> Result<Self, AdmissionError> {
        if limit == 0 {
            return Err(AdmissionError::InvalidLimit(limit));
        }
        Ok(AdmissionController {
            semaphore: Semaphore::new(limit),
            pool: Mutex::new(Pool {
                max: limit,
                debt: 0,
            }),
            active: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
        })
    }

    /// Waits for a permit, FIFO across callers.
    ///
    /// Takes the controller by `Arc` so the permit can outlive the caller
    /// (it rides inside streaming response bodies). Cancelling the returned
    /// future while queued removes the waiter without consuming a permit.
    pub async fn acquire(self: Arc<Self>) -> AdmissionPermit {
        struct WaitCount<'a>(&'a AtomicUsize);
        impl Drop for WaitCount<'_> {
            fn drop(&mut self) {
                self.0.fetch_sub(1, Ordering::SeqCst);
            }
        }

        self.waiting.fetch_add(1, Ordering::SeqCst);
        let wait_count = WaitCount(&self.waiting);
        // The semaphore is never closed, so acquire cannot fail.
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("admission semaphore closed");
        // Ownership of the permit moves to the returned guard; releases go
        // through `release` so shrink debt is repaid first.
        permit.forget();
        drop(wait_count);
        self.active.fetch_add(1, Ordering::SeqCst);
        AdmissionPermit { controller: self }
    }

    /// Replaces the active limit with `n`.
    ///
    /// Held permits remain valid and waiters are serviced under the new
    /// limit.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::InvalidLimit`] when `n` is zero.
    pub fn resize(&self, n: usize) -> Result<(), AdmissionError> {
        if n == 0 {
            return Err(AdmissionError::InvalidLimit(n));
        }
        let mut pool = self.pool.lock().expect("admission pool lock poisoned");
        if n > pool.max {
            let mut grow = n - pool.max;
            let repaid = grow.min(pool.debt);
            pool.debt -= repaid;
            grow -= repaid;
            if grow > 0 {
                self.semaphore.add_permits(grow);
            }
        } else if n < pool.max {
            let shrink = pool.max - n;
            let forgotten = self.semaphore.forget_permits(shrink);
            pool.debt += shrink - forgotten;
        }
        pool.max = n;
        Ok(())
    }

    /// Returns an observability snapshot of the pool.
    pub fn state(&self) -> AdmissionState {
        let pool = self.pool.lock().expect("admission pool lock poisoned");
        AdmissionState {
            max: pool.max,
            available: self.semaphore.available_permits(),
            active: self.active.load(Ordering::SeqCst),
            waiting: self.waiting.load(Ordering::SeqCst),
        }
    }

    fn release(&self) {
        let prev = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if prev.is_err() {
            // Unbalanced release: permits are RAII guards, so this indicates
            // a bookkeeping bug rather than caller misuse.
            debug_assert!(false, "admission release without a matching acquire");
            error!("admission release without a matching acquire");
            return;
        }
        let mut pool = self.pool.lock().expect("admission pool lock poisoned");
        if pool.debt > 0 {
            pool.debt -= 1;
        } else {
            self.semaphore.add_permits(1);
        }
    }
}

/// A held admission permit.
///
/// Dropping the permit releases it. The permit keeps its controller alive,
/// so it may outlive the gateway call that acquired it (it rides inside
/// streaming response bodies).
#[derive(Debug)]
pub struct AdmissionPermit {
    controller: Arc<AdmissionController>,
}

impl AdmissionPermit {
    /// Releases the permit explicitly. Equivalent to dropping it.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.controller.release();
    }
}
