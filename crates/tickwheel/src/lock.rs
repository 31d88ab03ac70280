//! Per-job mutual-exclusion locks.
//!
//! Every job execution happens under a named, TTL-based lock so that at
//! most one holder per job id exists at any time, across every
//! scheduler instance sharing the same [`LockStore`]. Acquisition is
//! non-blocking: a busy job is skipped, never waited for. Release is
//! tied to a guard's `Drop`, so a lock is never leaked regardless of
//! how an execution ends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::registry::JobId;

/// A named mutual-exclusion lock with a time-to-live.
pub trait Lock: Send + Sync {
    /// Try to acquire the lock without blocking.
    ///
    /// Returns `false` if another holder currently owns it.
    fn try_acquire(&self) -> bool;

    /// Extend the lock's time-to-live.
    ///
    /// No effect when the lock is not currently held by this handle.
    fn refresh(&self, ttl: Duration);

    /// Release the lock.
    fn release(&self);

    /// Whether the lock's time-to-live has elapsed while held.
    fn is_expired(&self) -> bool;
}

/// Factory for named locks.
///
/// Multiple scheduler instances sharing one lock store is the intended
/// way to coordinate job execution across processes or machines.
pub trait LockStore: Send + Sync {
    /// Create a handle for the lock with the given name.
    ///
    /// Creating a handle does not acquire the lock.
    fn create_lock(&self, name: &str, ttl: Duration) -> Arc<dyn Lock>;
}

/// Deterministic lock name for a job id, stable across runs.
pub fn job_lock_name(id: &JobId) -> String {
    format!("scheduler/job/{id}")
}

/// Lock handle passed to a running job.
///
/// Exposes only the operations a job may use on its own lock: extending
/// the time-to-live mid-execution (for long-running work) and checking
/// expiry. Releasing stays with the scheduler.
#[derive(Clone)]
pub struct JobLock {
    lock: Arc<dyn Lock>,
}

impl JobLock {
    pub(crate) fn new(lock: Arc<dyn Lock>) -> Self {
        Self { lock }
    }

    /// Extend the lock's time-to-live.
    pub fn refresh(&self, ttl: Duration) {
        self.lock.refresh(ttl);
    }

    /// Whether the lock's time-to-live has elapsed.
    pub fn is_expired(&self) -> bool {
        self.lock.is_expired()
    }
}

/// RAII guard that releases an acquired lock when dropped.
///
/// Holding release in `Drop` guarantees the lock is returned on every
/// exit path: success, job failure, callback failure, or a panic
/// unwinding through the executing task.
pub(crate) struct LockGuard {
    lock: Arc<dyn Lock>,
}

impl LockGuard {
    pub(crate) fn new(lock: Arc<dyn Lock>) -> Self {
        Self { lock }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.lock.release();
    }
}

#[derive(Debug, Clone, Copy)]
struct Holding {
    token: u64,
    expires_at: Instant,
}

/// In-memory lock store.
///
/// Locks are scoped to the store instance: clones of the same
/// `Arc<LocalLockStore>` contend with each other, separate stores do
/// not. Suitable for single-process deployments and tests; distributed
/// setups should implement [`LockStore`] over shared storage.
#[derive(Default)]
pub struct LocalLockStore {
    held: Arc<Mutex<HashMap<String, Holding>>>,
    tokens: Arc<AtomicU64>,
}

impl LocalLockStore {
    /// Create a new empty lock store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockStore for LocalLockStore {
    fn create_lock(&self, name: &str, ttl: Duration) -> Arc<dyn Lock> {
        Arc::new(LocalLock {
            held: self.held.clone(),
            tokens: self.tokens.clone(),
            name: name.to_string(),
            ttl,
            state: Mutex::new(LocalLockState::Released),
        })
    }
}

enum LocalLockState {
    Released,
    Acquired { token: u64, expires_at: Instant },
}

struct LocalLock {
    held: Arc<Mutex<HashMap<String, Holding>>>,
    tokens: Arc<AtomicU64>,
    name: String,
    ttl: Duration,
    state: Mutex<LocalLockState>,
}

// Lock order: `held` before `state`, in every method.
//
// Each acquisition gets a store-unique token; an expired handle whose
// entry was taken over no longer matches the entry's token, so its
// `release`/`refresh` cannot touch the new owner's entry.
impl Lock for LocalLock {
    fn try_acquire(&self) -> bool {
        let mut held = self.held.lock().unwrap();
        let now = Instant::now();
        if let Some(holding) = held.get(&self.name) {
            if holding.expires_at > now {
                return false;
            }
            // Stale entry from an expired holder.
        }

        let token = self.tokens.fetch_add(1, Ordering::Relaxed);
        let expires_at = now + self.ttl;
        held.insert(self.name.clone(), Holding { token, expires_at });
        *self.state.lock().unwrap() = LocalLockState::Acquired { token, expires_at };
        true
    }

    fn refresh(&self, ttl: Duration) {
        let mut held = self.held.lock().unwrap();
        let mut state = self.state.lock().unwrap();
        if let LocalLockState::Acquired { token, expires_at } = &mut *state {
            match held.get_mut(&self.name) {
                Some(holding) if holding.token == *token => {
                    let renewed = Instant::now() + ttl;
                    holding.expires_at = renewed;
                    *expires_at = renewed;
                }
                // Expired and taken over; nothing left to extend.
                _ => {}
            }
        }
    }

    fn release(&self) {
        let mut held = self.held.lock().unwrap();
        let mut state = self.state.lock().unwrap();
        if let LocalLockState::Acquired { token, .. } = *state {
            if matches!(held.get(&self.name), Some(holding) if holding.token == token) {
                held.remove(&self.name);
            }
            *state = LocalLockState::Released;
        }
    }

    fn is_expired(&self) -> bool {
        match *self.state.lock().unwrap() {
            LocalLockState::Released => false,
            LocalLockState::Acquired { expires_at, .. } => expires_at <= Instant::now(),
        }
    }
}
