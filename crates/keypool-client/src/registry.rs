//! Endpoint Rotation Registry
//!
//! Tracks which endpoint of a pool is currently chosen and which endpoints
//! are sitting out a temporary removal.
//!
//! The member list is fixed at construction. Removal only flips a presence
//! flag, so a reinstated endpoint returns to its original position and
//! round-robin order never changes. The chosen endpoint is an index updated
//! with compare-and-swap: among any number of concurrent failures observed
//! on the same selection, exactly one moves it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use keypool_common::{EndpointKey, PoolError, Result, TransportError};
use rand::Rng;
use tokio::task::JoinSet;
use tracing::debug;

#[derive(Debug)]
struct Slot {
    key: EndpointKey,
    present: AtomicBool,
}

/// Outcome of [`EndpointRegistry::rotate_from`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    /// Endpoint to use for the next attempt
    pub key: EndpointKey,
    /// Whether this call moved the selection
    pub rotated: bool,
}

/// Round-robin registry of endpoint keys with temporary removal.
#[derive(Debug)]
pub struct EndpointRegistry {
    slots: Arc<[Slot]>,
    chosen: AtomicUsize,
    removals: Mutex<JoinSet<()>>,
    closed: AtomicBool,
}

impl EndpointRegistry {
    /// Creates a registry and picks the initial endpoint uniformly at random.
    ///
    /// Duplicate keys are collapsed, keeping the first occurrence.
    pub fn new(keys: Vec<EndpointKey>) -> Result<Self> {
        let count = dedup_len(&keys);
        if count == 0 {
            return Err(PoolError::InvalidConfig(
                "at least one endpoint key is required".to_string(),
            ));
        }
        let initial = rand::thread_rng().gen_range(0..count);
        Self::with_initial_index(keys, initial)
    }

    /// Creates a registry whose selection starts at `initial`.
    pub(crate) fn with_initial_index(keys: Vec<EndpointKey>, initial: usize) -> Result<Self> {
        let mut seen = HashSet::new();
        let slots: Vec<Slot> = keys
            .into_iter()
            .filter(|key| seen.insert(*key))
            .map(|key| Slot {
                key,
                present: AtomicBool::new(true),
            })
            .collect();

        if slots.is_empty() {
            return Err(PoolError::InvalidConfig(
                "at least one endpoint key is required".to_string(),
            ));
        }
        if initial >= slots.len() {
            return Err(PoolError::InvalidConfig(format!(
                "initial index {} out of range for {} endpoints",
                initial,
                slots.len()
            )));
        }

        Ok(Self {
            slots: slots.into(),
            chosen: AtomicUsize::new(initial),
            removals: Mutex::new(JoinSet::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// The endpoint the next attempt should use.
    pub fn current(&self) -> EndpointKey {
        self.slots[self.chosen.load(Ordering::Acquire)].key
    }

    /// Moves the selection off `failed`, if it is still selected.
    ///
    /// The next endpoint is the first present member after `failed` in
    /// construction order, wrapping around; `failed` itself qualifies when
    /// it is the only one left. When another caller already rotated away,
    /// the current selection is returned unchanged.
    ///
    /// # Errors
    ///
    /// [`PoolError::NoEndpointsAvailable`] carrying `cause` when every member
    /// is temporarily removed.
    pub fn rotate_from(&self, failed: &EndpointKey, cause: &TransportError) -> Result<Rotation> {
        let Some(failed_idx) = self.index_of(failed) else {
            return Ok(Rotation {
                key: self.current(),
                rotated: false,
            });
        };

        loop {
            let current = self.chosen.load(Ordering::Acquire);
            if current != failed_idx {
                return Ok(Rotation {
                    key: self.slots[current].key,
                    rotated: false,
                });
            }

            let next = self
                .next_present_after(failed_idx)
                .ok_or_else(|| PoolError::NoEndpointsAvailable { cause: cause.clone() })?;

            if self
                .chosen
                .compare_exchange(failed_idx, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let rotated = next != failed_idx;
                if rotated {
                    debug!(from = ?failed, to = ?self.slots[next].key, cause = %cause, "rotated endpoint");
                }
                return Ok(Rotation {
                    key: self.slots[next].key,
                    rotated,
                });
            }
        }
    }

    /// Takes `key` out of rotation and schedules its return after `restore_after`.
    ///
    /// Returns `false` without scheduling anything when the key is unknown,
    /// already removed, or the registry is shut down. Must be called from
    /// within a Tokio runtime.
    pub fn remove_temporarily(&self, key: &EndpointKey, restore_after: Duration) -> bool {
        let Some(idx) = self.index_of(key) else {
            return false;
        };

        let mut removals = self.removals();
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        if !self.slots[idx].present.swap(false, Ordering::AcqRel) {
            return false;
        }

        while removals.try_join_next().is_some() {}

        let slots = Arc::clone(&self.slots);
        removals.spawn(async move {
            tokio::time::sleep(restore_after).await;
            if !slots[idx].present.swap(true, Ordering::AcqRel) {
                debug!(endpoint = ?slots[idx].key, "endpoint reinstated");
            }
        });

        debug!(endpoint = ?key, restore_after_ms = restore_after.as_millis() as u64, "endpoint removed temporarily");
        true
    }

    /// Every member in construction order, removed or not.
    pub fn members(&self) -> Vec<EndpointKey> {
        self.slots.iter().map(|slot| slot.key).collect()
    }

    /// Members currently eligible for rotation.
    pub fn available(&self) -> Vec<EndpointKey> {
        self.slots
            .iter()
            .filter(|slot| slot.present.load(Ordering::Acquire))
            .map(|slot| slot.key)
            .collect()
    }

    /// Whether `key` is a member that is not currently removed.
    pub fn contains(&self, key: &EndpointKey) -> bool {
        self.index_of(key)
            .is_some_and(|idx| self.slots[idx].present.load(Ordering::Acquire))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of reinsertions still waiting to fire.
    pub fn pending_removals(&self) -> usize {
        let mut removals = self.removals();
        while removals.try_join_next().is_some() {}
        removals.len()
    }

    /// Cancels every pending reinsertion. Later removals are refused.
    pub fn shutdown(&self) {
        let mut removals = self.removals();
        self.closed.store(true, Ordering::Release);
        // Dropping the set aborts its tasks
        let cancelled = std::mem::take(&mut *removals);
        if !cancelled.is_empty() {
            debug!(count = cancelled.len(), "cancelled pending reinsertions");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn removals(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.removals.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn index_of(&self, key: &EndpointKey) -> Option<usize> {
        self.slots.iter().position(|slot| slot.key == *key)
    }

    fn next_present_after(&self, idx: usize) -> Option<usize> {
        let len = self.slots.len();
        (1..=len)
            .map(|step| (idx + step) % len)
            .find(|&i| self.slots[i].present.load(Ordering::Acquire))
    }
}

fn dedup_len(keys: &[EndpointKey]) -> usize {
    keys.iter().collect::<HashSet<_>>().len()
}
