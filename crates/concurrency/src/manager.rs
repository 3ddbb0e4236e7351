//! Transaction manager for coordinating commit operations
//!
//! Owns the shared state of one engine instance: the clock, the versioned
//! heap, the listener registry and the counters. Transactions hold an `Arc`
//! to their manager and call back into it to commit and abort.
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. Committed already → return the stored outcome; aborted → misuse error
//! 2. No dirty write → committed read-only (no lock, no tick)
//! 3. Lock dirty pre-existing handles, ascending order (lock policy)
//! 4. IF lock failure: abort, return conflict
//! 5. validate_transaction() against latest heap versions
//! 6. IF conflicts: release locks, abort, return conflict
//! 7. tick clock → commit_version
//! 8. publish dirty working copies at commit_version
//! 9. release locks
//! 10. advance stable version to commit_version
//! 11. mark committed, wake listeners on the published handles
//! ```
//!
//! Nothing after step 7 can fail, so every ticked version is eventually
//! published and the stable version never stalls.

use crate::contention::{Backoff, ContentionManager};
use crate::latch::Latch;
use crate::listeners::ListenerRegistry;
use crate::lock_policy::LockPolicy;
use crate::stats::{StmCounters, StmStats};
use crate::transaction::{CommitOutcome, Transaction};
use crate::validation::validate_transaction;
use mvstm_core::{Handle, Result, StmError, TransactionStatus, TxnId, Version};
use mvstm_storage::{Clock, VersionedHeap, DEFAULT_HISTORY_DEPTH};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Construction options of a [`TransactionManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerOptions {
    /// Starting value of the clock
    pub dawn: Version,
    /// Committed versions retained per object
    pub history_depth: usize,
    /// How commit locks are taken
    pub lock_policy: LockPolicy,
    /// Validate only the dirty write-set, not the read-set
    pub allow_write_skew: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            dawn: 0,
            history_depth: DEFAULT_HISTORY_DEPTH,
            lock_policy: LockPolicy::default(),
            allow_write_skew: false,
        }
    }
}

/// Manages transaction lifecycle and atomic commits
///
/// # Thread Safety
///
/// There is no global commit lock. Commits of disjoint write-sets run in
/// parallel; commits that share a handle serialize on its commit lock.
#[derive(Debug)]
pub struct TransactionManager {
    clock: Clock,
    heap: VersionedHeap,
    listeners: ListenerRegistry,
    counters: StmCounters,
    /// Next transaction id, starting at 1 so that 0 can mean "unowned"
    next_txn_id: AtomicU64,
    lock_policy: LockPolicy,
    allow_write_skew: bool,
    contention: Arc<dyn ContentionManager>,
}

impl TransactionManager {
    /// Create a manager
    pub fn new(options: ManagerOptions, contention: Arc<dyn ContentionManager>) -> Self {
        Self {
            clock: Clock::new(options.dawn),
            heap: VersionedHeap::with_history_depth(options.dawn, options.history_depth),
            listeners: ListenerRegistry::new(),
            counters: StmCounters::new(),
            next_txn_id: AtomicU64::new(1),
            lock_policy: options.lock_policy,
            allow_write_skew: options.allow_write_skew,
            contention,
        }
    }

    /// Global clock
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Shared heap
    pub fn heap(&self) -> &VersionedHeap {
        &self.heap
    }

    /// Listener registry used for blocking retry
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Live counters
    pub fn counters(&self) -> &StmCounters {
        &self.counters
    }

    /// Contention manager consulted during lock spins and retry backoff
    pub fn contention(&self) -> &Arc<dyn ContentionManager> {
        &self.contention
    }

    /// Lock policy used by commits
    pub fn lock_policy(&self) -> LockPolicy {
        self.lock_policy
    }

    /// Latest ticked clock value
    pub fn current_version(&self) -> Version {
        self.clock.current()
    }

    /// Version new transactions start at
    pub fn stable_version(&self) -> Version {
        self.heap.stable_version()
    }

    /// Copy of the counters
    pub fn stats(&self) -> StmStats {
        self.counters.snapshot()
    }

    fn next_txn_id(&self) -> TxnId {
        TxnId::from_raw(self.next_txn_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Start a transaction
    pub fn begin(self: &Arc<Self>) -> Transaction {
        self.begin_attempt(0)
    }

    /// Start a transaction as the `attempt`-th try of a retry driver
    pub fn begin_attempt(self: &Arc<Self>, attempt: usize) -> Transaction {
        let id = self.next_txn_id();
        let start_version = self.heap.stable_version();
        self.counters.record_start();
        trace!(txn = %id, start_version, attempt, "transaction started");
        Transaction::new(Arc::clone(self), id, start_version, attempt)
    }

    /// Commit a transaction atomically
    ///
    /// See the module docs for the sequence. On any failure the transaction
    /// ends up aborted with all locks released.
    ///
    /// # Errors
    ///
    /// - [`StmError::Conflict`] if locking or validation failed
    /// - [`StmError::NotActive`] if the transaction was aborted
    pub fn commit(&self, txn: &mut Transaction) -> Result<CommitOutcome> {
        match txn.status {
            TransactionStatus::Active => {}
            TransactionStatus::Committed => {
                return Ok(txn.outcome.unwrap_or(CommitOutcome::ReadOnly));
            }
            TransactionStatus::Aborted => {
                return Err(StmError::NotActive {
                    status: TransactionStatus::Aborted,
                });
            }
        }

        let dirty: Vec<Handle> = txn
            .write_set
            .iter()
            .filter(|(_, entry)| entry.is_dirty())
            .map(|(&handle, _)| handle)
            .collect();

        if dirty.is_empty() {
            self.finish(txn, CommitOutcome::ReadOnly);
            trace!(txn = %txn.id, reads = txn.read_set.len(), "read-only commit");
            return Ok(CommitOutcome::ReadOnly);
        }

        // Step 3: lock every dirty handle that other transactions can see
        let to_lock: Vec<Handle> = dirty
            .iter()
            .copied()
            .filter(|h| txn.write_set.get(h).map_or(false, |e| !e.is_fresh()))
            .collect();
        let mut locks = match self.lock_policy.acquire(
            &self.heap,
            &to_lock,
            &txn.info(),
            self.contention.as_ref(),
        ) {
            Ok(locks) => locks,
            Err(e) => {
                if e.is_conflict() {
                    self.counters.record_lock_failure();
                }
                self.fail(txn, &e);
                return Err(e);
            }
        };

        // Step 5: validate under the locks
        let validation = validate_transaction(txn, &self.heap, self.allow_write_skew);
        if let Some(e) = validation.first_error() {
            locks.release();
            self.counters.record_conflict();
            self.fail(txn, &e);
            return Err(e);
        }

        // Steps 7-10: infallible from here on
        let commit_version = self.clock.tick();
        let writes = std::mem::take(&mut txn.write_set)
            .into_values()
            .filter(|entry| entry.is_dirty())
            .map(|entry| entry.working);
        let published = self.heap.publish(writes, commit_version);
        locks.release();
        self.heap.advance_stable(commit_version);

        let outcome = CommitOutcome::Updated {
            version: commit_version,
            published,
        };
        self.finish(txn, outcome);
        debug!(txn = %txn.id, commit_version, published, "transaction committed");

        // Step 11
        self.listeners.wakeup_listeners(commit_version, &dirty);
        Ok(outcome)
    }

    /// Abort a transaction
    ///
    /// Discards the write-set and keeps the read-set. Never touches the heap
    /// or the clock.
    ///
    /// # Errors
    ///
    /// [`StmError::NotActive`] if the transaction already committed.
    pub fn abort(&self, txn: &mut Transaction) -> Result<()> {
        match txn.status {
            TransactionStatus::Active => {
                txn.write_set.clear();
                txn.status = TransactionStatus::Aborted;
                self.counters.record_abort();
                trace!(txn = %txn.id, "transaction aborted");
                Ok(())
            }
            TransactionStatus::Aborted => Ok(()),
            TransactionStatus::Committed => Err(StmError::NotActive {
                status: TransactionStatus::Committed,
            }),
        }
    }

    /// Register `latch` to open once anything `txn` read changes
    ///
    /// The latch opens on the first commit after `txn`'s start version that
    /// touches one of its reads, or immediately if one already happened.
    ///
    /// # Errors
    ///
    /// [`StmError::NoProgressPossible`] if `txn` read nothing.
    pub fn register_retry(&self, txn: &Transaction, latch: &Arc<Latch>) -> Result<()> {
        let handles = txn.read_handles();
        self.listeners
            .add_listener(&self.heap, txn.start_version + 1, &handles, latch)
    }

    fn finish(&self, txn: &mut Transaction, outcome: CommitOutcome) {
        txn.status = TransactionStatus::Committed;
        txn.outcome = Some(outcome);
        self.counters.record_commit();
    }

    fn fail(&self, txn: &mut Transaction, error: &StmError) {
        txn.write_set.clear();
        txn.status = TransactionStatus::Aborted;
        self.counters.record_abort();
        debug!(txn = %txn.id, attempt = txn.attempt, %error, "commit failed");
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(ManagerOptions::default(), Arc::new(Backoff::default()))
    }
}
