//! Engine counters
//!
//! [`StmCounters`] is updated by the transaction manager and the retry driver
//! with relaxed atomics. [`StmStats`] is a plain copy for readers outside the
//! engine: taking one never blocks a commit.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, one atomic per event
#[derive(Debug, Default)]
pub struct StmCounters {
    started: AtomicU64,
    committed: AtomicU64,
    aborted: AtomicU64,
    conflicts: AtomicU64,
    lock_failures: AtomicU64,
    blocked: AtomicU64,
    too_many_retries: AtomicU64,
}

impl StmCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// A transaction began
    pub fn record_start(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    /// A transaction committed
    pub fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    /// A transaction aborted, for any reason
    pub fn record_abort(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// A commit failed validation
    pub fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// A commit failed to take its locks
    pub fn record_lock_failure(&self) {
        self.lock_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A retry driver parked on a latch
    pub fn record_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
    }

    /// A retry driver gave up
    pub fn record_too_many_retries(&self) {
        self.too_many_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values
    pub fn snapshot(&self) -> StmStats {
        StmStats {
            started: self.started.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            lock_failures: self.lock_failures.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            too_many_retries: self.too_many_retries.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the engine counters
///
/// Counters are read one by one, so a snapshot taken under load may be off by
/// the transactions in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StmStats {
    /// Transactions begun
    pub started: u64,
    /// Transactions committed, read-only ones included
    pub committed: u64,
    /// Transactions aborted
    pub aborted: u64,
    /// Commits rejected by validation
    pub conflicts: u64,
    /// Commits rejected by lock acquisition
    pub lock_failures: u64,
    /// Times a retry driver parked on a latch
    pub blocked: u64,
    /// Retry drivers that gave up
    pub too_many_retries: u64,
}

impl StmStats {
    /// Transactions neither committed nor aborted yet
    pub fn active(&self) -> u64 {
        self.started
            .saturating_sub(self.committed)
            .saturating_sub(self.aborted)
    }

    /// Fraction of finished transactions that committed
    pub fn commit_rate(&self) -> f64 {
        let finished = self.committed + self.aborted;
        if finished == 0 {
            return 1.0;
        }
        self.committed as f64 / finished as f64
    }
}
