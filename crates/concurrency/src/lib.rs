//! Concurrency layer for mvstm
//!
//! This crate implements the multi-version commit protocol:
//! - Transaction: snapshot reads at a start version, private working copies
//! - TransactionManager: lock → validate → tick → publish → wake
//! - LockPolicy: all-or-nothing acquisition of per-object commit locks
//! - ContentionManager: who backs off when transactions collide
//! - Latch / ListenerRegistry: blocking retry without lost wakeups

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contention;
pub mod latch;
pub mod listeners;
pub mod lock_policy;
pub mod manager;
pub mod stats;
pub mod transaction;
pub mod validation;

pub use contention::{
    Aggressive, Backoff, ContentionManager, ContentionPolicy, Resolution, Timestamp, TxnInfo,
};
pub use latch::Latch;
pub use listeners::ListenerRegistry;
pub use lock_policy::{LockPolicy, LockSet};
pub use manager::{ManagerOptions, TransactionManager};
pub use stats::{StmCounters, StmStats};
pub use transaction::{CommitOutcome, Transaction};
pub use validation::{
    validate_read_set, validate_transaction, validate_write_set, ConflictType, ValidationResult,
};
