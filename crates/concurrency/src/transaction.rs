//! Transactions
//!
//! A [`Transaction`] reads committed snapshots at its start version and keeps
//! private working copies of everything it writes.
//!
//! # Lifecycle
//!
//! 1. **BEGIN**: [`TransactionManager::begin`], status is `Active`
//! 2. **READ/WRITE**: [`Transaction::read`], [`Transaction::open_for_write`],
//!    [`Transaction::attach`] and the typed accessors
//! 3. **COMMIT/ABORT**: [`Transaction::commit`] or [`Transaction::abort`]
//!
//! Dropping an active transaction aborts it.
//!
//! # Sets
//!
//! - read-set: handle → the committed snapshot loaded from the heap. Loaded
//!   once, so repeated reads inside one transaction agree.
//! - write-set: handle → private working copy plus the snapshot it was
//!   privatized from. Objects created by [`Transaction::attach`] have no
//!   origin.

use crate::contention::TxnInfo;
use crate::manager::TransactionManager;
use mvstm_core::{
    Handle, Result, StmError, Tranlocal, TranlocalState, Transactable, TransactionStatus, TxnId,
    Version,
};
use std::any::Any;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Result of a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing was changed, the clock was not ticked
    ReadOnly,
    /// Snapshots were published
    Updated {
        /// Clock value the snapshots were published at
        version: Version,
        /// Number of snapshots published
        published: usize,
    },
}

impl CommitOutcome {
    /// Commit version, if the commit published anything
    pub fn version(&self) -> Option<Version> {
        match *self {
            CommitOutcome::ReadOnly => None,
            CommitOutcome::Updated { version, .. } => Some(version),
        }
    }

    /// Check if the commit published nothing
    pub fn is_read_only(&self) -> bool {
        matches!(self, CommitOutcome::ReadOnly)
    }
}

/// Working copy of one written object
#[derive(Debug)]
pub(crate) struct WriteEntry {
    pub(crate) working: Tranlocal,
    pub(crate) origin: Option<Arc<Tranlocal>>,
}

impl WriteEntry {
    /// Check if the object was created by this transaction
    pub(crate) fn is_fresh(&self) -> bool {
        self.origin.is_none()
    }

    /// Check if the working copy must be published
    pub(crate) fn is_dirty(&self) -> bool {
        self.working.is_dirty(self.origin.as_deref())
    }

    /// Version the working copy was privatized from
    pub(crate) fn origin_version(&self) -> Option<Version> {
        self.origin.as_ref().map(|o| o.version())
    }
}

/// One attempt at an atomic unit of work
pub struct Transaction {
    pub(crate) id: TxnId,
    pub(crate) status: TransactionStatus,
    pub(crate) start_version: Version,
    pub(crate) attempt: usize,
    pub(crate) read_set: BTreeMap<Handle, Arc<Tranlocal>>,
    pub(crate) write_set: BTreeMap<Handle, WriteEntry>,
    pub(crate) outcome: Option<CommitOutcome>,
    manager: Arc<TransactionManager>,
}

impl Transaction {
    pub(crate) fn new(
        manager: Arc<TransactionManager>,
        id: TxnId,
        start_version: Version,
        attempt: usize,
    ) -> Self {
        Self {
            id,
            status: TransactionStatus::Active,
            start_version,
            attempt,
            read_set: BTreeMap::new(),
            write_set: BTreeMap::new(),
            outcome: None,
            manager,
        }
    }

    /// Transaction id
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Current status
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Check if the transaction can still read and write
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Snapshot version every read is made at
    pub fn start_version(&self) -> Version {
        self.start_version
    }

    /// Zero-based attempt number within the enclosing retry driver
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Identity handed to the contention manager
    pub fn info(&self) -> TxnInfo {
        TxnInfo {
            id: self.id,
            start_version: self.start_version,
            attempt: self.attempt,
        }
    }

    /// Manager that started this transaction
    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    /// Handles loaded from the heap, in ascending order
    ///
    /// Kept after abort, so a retry driver can register on them.
    pub fn read_handles(&self) -> Vec<Handle> {
        self.read_set.keys().copied().collect()
    }

    /// Number of handles loaded from the heap
    pub fn read_count(&self) -> usize {
        self.read_set.len()
    }

    /// Number of handles with a working copy
    pub fn write_count(&self) -> usize {
        self.write_set.len()
    }

    /// Outcome of the commit, once committed
    pub fn outcome(&self) -> Option<CommitOutcome> {
        self.outcome
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(StmError::NotActive {
                status: self.status,
            })
        }
    }

    /// Committed snapshot of `handle` as of the start version, loaded once
    fn load(&mut self, handle: Handle) -> Result<Arc<Tranlocal>> {
        match self.read_set.entry(handle) {
            Entry::Occupied(e) => Ok(Arc::clone(e.get())),
            Entry::Vacant(e) => {
                let tranlocal = self.manager.heap().read_at(handle, self.start_version)?;
                Ok(Arc::clone(e.insert(tranlocal)))
            }
        }
    }

    /// Read the state of `handle`
    ///
    /// Returns this transaction's working copy if it has one, otherwise the
    /// committed snapshot as of the start version.
    ///
    /// # Errors
    ///
    /// - [`StmError::NotActive`] if the transaction finished
    /// - [`StmError::NullHandle`] for [`Handle::NULL`]
    /// - [`StmError::NoSuchObject`] if the handle is not visible at the start
    ///   version
    /// - a retryable conflict if the needed version was already pruned
    pub fn read(&mut self, handle: Handle) -> Result<&Tranlocal> {
        self.ensure_active()?;
        let handle = handle.ensure_not_null()?;
        if !self.write_set.contains_key(&handle) {
            self.load(handle)?;
        }
        match self.write_set.get(&handle) {
            Some(entry) => Ok(&entry.working),
            None => self
                .read_set
                .get(&handle)
                .map(Arc::as_ref)
                .ok_or(StmError::NoSuchObject { handle }),
        }
    }

    /// Open `handle` for writing
    ///
    /// The first call privatizes the committed snapshot into a working copy
    /// owned by this transaction; later calls return the same copy.
    pub fn open_for_write(&mut self, handle: Handle) -> Result<&mut Tranlocal> {
        self.ensure_active()?;
        let handle = handle.ensure_not_null()?;
        if !self.write_set.contains_key(&handle) {
            let origin = self.load(handle)?;
            let working = origin.privatize();
            self.write_set.insert(
                handle,
                WriteEntry {
                    working,
                    origin: Some(origin),
                },
            );
        }
        self.write_set
            .get_mut(&handle)
            .map(|entry| &mut entry.working)
            .ok_or(StmError::NoSuchObject { handle })
    }

    /// Create a new object with `state`
    ///
    /// The handle is usable inside this transaction immediately. Other
    /// transactions see the object once this one commits.
    pub fn attach<S: TranlocalState>(&mut self, state: S) -> Result<Handle> {
        self.ensure_active()?;
        let handle = self.manager.heap().allocate_handle();
        self.write_set.insert(
            handle,
            WriteEntry {
                working: Tranlocal::fresh(handle, Box::new(state)),
                origin: None,
            },
        );
        Ok(handle)
    }

    /// Read the state of `handle` as `T`
    pub fn get<T: Any>(&mut self, handle: Handle) -> Result<&T> {
        self.read(handle)?.downcast_ref::<T>()
    }

    /// Open `handle` for writing as `T`
    pub fn get_mut<T: Any>(&mut self, handle: Handle) -> Result<&mut T> {
        self.open_for_write(handle)?.downcast_mut::<T>()
    }

    /// Read the state of a transactional object
    pub fn read_object<O: Transactable>(&mut self, object: &O) -> Result<&O::State> {
        self.get::<O::State>(object.handle())
    }

    /// Open a transactional object for writing
    pub fn write_object<O: Transactable>(&mut self, object: &O) -> Result<&mut O::State> {
        self.get_mut::<O::State>(object.handle())
    }

    /// Commit the transaction
    ///
    /// Committing twice returns the first outcome again.
    ///
    /// # Errors
    ///
    /// - a retryable conflict if locks could not be taken or a read changed;
    ///   the transaction is aborted
    /// - [`StmError::NotActive`] if the transaction was aborted
    pub fn commit(&mut self) -> Result<CommitOutcome> {
        let manager = Arc::clone(&self.manager);
        manager.commit(self)
    }

    /// Abort the transaction, discarding its working copies
    ///
    /// Aborting twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`StmError::NotActive`] if the transaction already committed.
    pub fn abort(&mut self) -> Result<()> {
        let manager = Arc::clone(&self.manager);
        manager.abort(self)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_active() {
            let _ = self.abort();
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("start_version", &self.start_version)
            .field("attempt", &self.attempt)
            .field("reads", &self.read_set.len())
            .field("writes", &self.write_set.len())
            .finish()
    }
}
