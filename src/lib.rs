//! # mvstm
//!
//! Multi-version software transactional memory.
//!
//! Wrap reads and writes of shared objects in a transaction; the engine
//! commits all of its effects at one point in time or none of them, and
//! re-runs the transaction when another one committed a conflicting change.
//!
//! ## Quick Start
//!
//! ```
//! use mvstm::prelude::*;
//!
//! let stm = Stm::new();
//! let (from, to) = stm
//!     .atomically(|txn| Ok((TRef::new(txn, 100i64)?, TRef::new(txn, 0i64)?)))
//!     .unwrap();
//!
//! // Transfer atomically
//! stm.atomically(|txn| {
//!     let amount = 40;
//!     from.modify(txn, |b| *b -= amount)?;
//!     to.modify(txn, |b| *b += amount)
//! })
//! .unwrap();
//!
//! let total = stm
//!     .atomically(|txn| Ok(from.get(txn)? + to.get(txn)?))
//!     .unwrap();
//! assert_eq!(total, 100);
//! ```
//!
//! ## Blocking
//!
//! A body that cannot proceed returns [`retry()`] (or uses [`guard`] /
//! [`unwrap_or_retry`]). The retry driver discards the attempt and blocks
//! until another transaction commits to something the body read.
//!
//! ## Layers
//!
//! - [`mvstm_core`]: handles, versions, snapshots, errors
//! - [`mvstm_storage`]: clock and versioned heap
//! - [`mvstm_concurrency`]: transactions, commit protocol, locks, listeners
//! - [`mvstm_engine`]: [`Stm`], configuration, retry driver

#![warn(missing_docs)]

mod primitives;

pub mod prelude;

pub use mvstm_concurrency::{
    CommitOutcome, ContentionManager, ContentionPolicy, Latch, LockPolicy, StmStats, Transaction,
};
pub use mvstm_core::{ConflictKind, Handle, Result, StmError, Transactable, Version};
pub use mvstm_engine::{global, Stm, StmBuilder, StmConfig};
pub use primitives::{Element, Queue, Stack, TRef};

/// Block the current atomic block until something it read changes
///
/// # Example
///
/// ```
/// use mvstm::prelude::*;
///
/// let stm = Stm::new();
/// let cell = stm.atomically(|txn| TRef::new(txn, 1u8)).unwrap();
/// let mut txn = stm.begin();
/// let result: Result<()> = if cell.get(&mut txn).unwrap() == 0 { Ok(()) } else { retry() };
/// assert_eq!(result, Err(StmError::Retry));
/// ```
pub fn retry<T>() -> Result<T> {
    Err(StmError::Retry)
}

/// Retry unless `condition` holds
pub fn guard(condition: bool) -> Result<()> {
    if condition {
        Ok(())
    } else {
        retry()
    }
}

/// Unwrap `option`, retrying on `None`
pub fn unwrap_or_retry<T>(option: Option<T>) -> Result<T> {
    option.map_or_else(retry, Ok)
}

/// Run `body` atomically on the process default engine
///
/// See [`Stm::atomically`] and [`global`].
pub fn atomically<T, F>(body: F) -> Result<T>
where
    F: FnMut(&mut Transaction) -> Result<T>,
{
    global::get().atomically(body)
}
