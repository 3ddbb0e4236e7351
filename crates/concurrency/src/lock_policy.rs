//! Commit lock acquisition
//!
//! A committing transaction locks every dirty, pre-existing handle of its
//! write-set before validating. [`LockPolicy::acquire`] does this in ascending
//! handle order and is all-or-nothing: when it fails, the policy has already
//! released every lock it took, and the caller holds nothing.
//!
//! The acquired locks live in a [`LockSet`] that releases them on drop.

use crate::contention::{ContentionManager, Resolution, TxnInfo};
use mvstm_core::{ConflictKind, Handle, Result, StmError, TxnId};
use mvstm_storage::{Slot, VersionedHeap};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Pause before the first whole-attempt retry of [`LockPolicy::SpinRetry`]
const RETRY_PAUSE: Duration = Duration::from_micros(5);

/// Strategy for taking the commit locks of a write-set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LockPolicy {
    /// One attempt per lock
    NoSpin,
    /// Up to `spin_attempts` extra attempts per lock
    Spin {
        /// Busy-wait attempts per lock after the first failure
        spin_attempts: usize,
    },
    /// Spin per lock, and restart the whole acquisition up to `retries` times
    SpinRetry {
        /// Busy-wait attempts per lock after the first failure
        spin_attempts: usize,
        /// Whole-acquisition restarts after a failed attempt
        retries: usize,
    },
}

impl Default for LockPolicy {
    fn default() -> Self {
        LockPolicy::SpinRetry {
            spin_attempts: 64,
            retries: 3,
        }
    }
}

impl LockPolicy {
    fn budget(&self) -> (usize, usize) {
        match *self {
            LockPolicy::NoSpin => (0, 0),
            LockPolicy::Spin { spin_attempts } => (spin_attempts, 0),
            LockPolicy::SpinRetry {
                spin_attempts,
                retries,
            } => (spin_attempts, retries),
        }
    }

    /// Lock every handle in `handles` for `me`
    ///
    /// Handles are locked in ascending order, duplicates once. An empty set
    /// always succeeds.
    ///
    /// # Errors
    ///
    /// - [`ConflictKind::LockNotAcquired`] on the first handle whose lock could
    ///   not be taken within the budget. No lock is held on return.
    /// - [`StmError::NoSuchObject`] if a handle has no heap slot.
    pub fn acquire(
        &self,
        heap: &VersionedHeap,
        handles: &[Handle],
        me: &TxnInfo,
        cm: &dyn ContentionManager,
    ) -> Result<LockSet> {
        let mut ordered = handles.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let (spin_attempts, retries) = self.budget();
        let mut retry = 0;
        loop {
            match try_acquire_all(heap, &ordered, me, cm, spin_attempts) {
                Ok(locks) => return Ok(locks),
                Err(e) if e.is_conflict() && retry < retries => {
                    retry += 1;
                    trace!(txn = %me.id, retry, "retrying lock acquisition");
                    std::thread::sleep(RETRY_PAUSE * retry as u32);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// One pass over `ordered`, releasing everything on failure
fn try_acquire_all(
    heap: &VersionedHeap,
    ordered: &[Handle],
    me: &TxnInfo,
    cm: &dyn ContentionManager,
    spin_attempts: usize,
) -> Result<LockSet> {
    let mut locks = LockSet::with_capacity(me.id, ordered.len());
    for (index, &handle) in ordered.iter().enumerate() {
        // Early returns drop `locks`, which releases the prefix taken so far
        let slot = heap.slot(handle)?;
        if !lock_slot(&slot, me, cm, spin_attempts) {
            trace!(txn = %me.id, %handle, owner = ?slot.owner(), "commit lock not acquired");
            return Err(StmError::conflict(handle, ConflictKind::LockNotAcquired));
        }
        locks.slots[index] = Some(slot);
    }
    Ok(locks)
}

fn lock_slot(slot: &Slot, me: &TxnInfo, cm: &dyn ContentionManager, spin_attempts: usize) -> bool {
    if slot.try_lock(me.id) {
        return true;
    }
    for _ in 0..spin_attempts {
        if let Some(other) = slot.owner() {
            if cm.resolve(me, other) == Resolution::AbortSelf {
                return false;
            }
        }
        std::hint::spin_loop();
        if slot.try_lock(me.id) {
            return true;
        }
    }
    false
}

/// Commit locks held by one transaction
///
/// Slots are filled front to back. Releasing walks the same order and stops
/// at the first unfilled slot, so a lock that was never taken is never
/// released. Dropping the set releases whatever it still holds.
#[derive(Debug)]
pub struct LockSet {
    owner: TxnId,
    slots: Vec<Option<Arc<Slot>>>,
}

impl LockSet {
    /// A set holding no locks
    pub fn empty(owner: TxnId) -> Self {
        Self {
            owner,
            slots: Vec::new(),
        }
    }

    fn with_capacity(owner: TxnId, capacity: usize) -> Self {
        Self {
            owner,
            slots: vec![None; capacity],
        }
    }

    /// Number of locks currently held
    pub fn len(&self) -> usize {
        self.slots.iter().take_while(|slot| slot.is_some()).count()
    }

    /// Check if no lock is held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles whose locks are held, in acquisition order
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.slots.iter().map_while(|slot| slot.as_ref().map(|s| s.handle()))
    }

    /// Release every held lock
    ///
    /// Safe to call more than once.
    pub fn release(&mut self) {
        for entry in self.slots.iter_mut() {
            match entry.take() {
                Some(slot) => {
                    slot.unlock(self.owner);
                }
                None => break,
            }
        }
    }
}

impl Drop for LockSet {
    fn drop(&mut self) {
        self.release();
    }
}
