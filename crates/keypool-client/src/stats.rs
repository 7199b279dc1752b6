use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters describing what a pool has done so far.
///
/// Every dispatch ends in exactly one of `successes`, `deadline_expiries`,
/// `exhausted` or `fatal`, unless it was rejected by shutdown.
#[derive(Debug, Default)]
pub struct PoolStats {
    dispatches: AtomicU64,
    successes: AtomicU64,
    attempts: AtomicU64,
    rotations: AtomicU64,
    deadline_expiries: AtomicU64,
    exhausted: AtomicU64,
    fatal: AtomicU64,
}

/// Point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatsSnapshot {
    pub dispatches: u64,
    pub successes: u64,
    pub attempts: u64,
    pub rotations: u64,
    pub deadline_expiries: u64,
    pub exhausted: u64,
    pub fatal: u64,
}

impl PoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deadline_expiry(&self) {
        self.deadline_expiries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fatal(&self) {
        self.fatal.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            dispatches: self.dispatches.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            deadline_expiries: self.deadline_expiries.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            fatal: self.fatal.load(Ordering::Relaxed),
        }
    }
}
