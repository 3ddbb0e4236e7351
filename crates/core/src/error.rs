//! Error types for mvstm
//!
//! All engine operations return [`Result<T>`]. The variants of [`StmError`]
//! fall into four groups, and callers are expected to treat them differently:
//!
//! | Group | Variants | Handling |
//! |-------|----------|----------|
//! | Conflict | `Conflict` | Re-run the transaction body |
//! | Liveness | `TooManyRetries`, `NoProgressPossible` | Give up, the body cannot make progress |
//! | Misuse | `NotActive`, `NestedTransaction`, `NullHandle`, `TypeMismatch`, `AlreadyInitialized` | Bug at the call site |
//! | Identity | `NoSuchObject` | The handle does not name a committed object |
//!
//! [`StmError::Retry`] is not a failure: it is the signal a transaction body
//! returns to ask the retry driver to block until something it read changes.

use crate::types::{Handle, TransactionStatus, Version};
use thiserror::Error;

/// Why a commit or a read detected contention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The commit lock of the handle could not be acquired within the
    /// lock policy's budget
    LockNotAcquired,

    /// Another transaction committed a newer version after this one read it
    VersionMismatch {
        /// Version recorded by this transaction
        read: Version,
        /// Version currently published in the heap
        current: Version,
    },

    /// Every retained version of the object is newer than the snapshot
    SnapshotTooOld {
        /// Snapshot version the read was made at
        requested: Version,
    },
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::LockNotAcquired => write!(f, "commit lock not acquired"),
            ConflictKind::VersionMismatch { read, current } => {
                write!(f, "read version {} but heap holds {}", read, current)
            }
            ConflictKind::SnapshotTooOld { requested } => {
                write!(f, "no retained version at or below {}", requested)
            }
        }
    }
}

/// All mvstm errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StmError {
    /// Write conflict or lock contention on a handle (retryable)
    #[error("conflict on {handle}: {kind}")]
    Conflict {
        /// Handle the conflict was detected on
        handle: Handle,
        /// What kind of conflict
        kind: ConflictKind,
    },

    /// The transaction body asked to block until one of its reads changes
    #[error("transaction requested a blocking retry")]
    Retry,

    /// The retry driver gave up after too many conflicting attempts
    #[error("too many retries: gave up after {attempts} attempts")]
    TooManyRetries {
        /// Number of attempts made
        attempts: usize,
    },

    /// A blocking retry has no read dependencies and could never be woken
    #[error("no progress possible: retry registered without any read dependencies")]
    NoProgressPossible,

    /// Operation requires an active transaction
    #[error("transaction not active ({status})")]
    NotActive {
        /// Status the transaction was in
        status: TransactionStatus,
    },

    /// An atomic block was entered while another one is running on this thread
    #[error("nested transaction: an atomic block is already running on this thread")]
    NestedTransaction,

    /// The null handle was passed where an object is required
    #[error("null handle")]
    NullHandle,

    /// A snapshot was accessed as the wrong state type
    #[error("type mismatch on {handle}: expected {expected}")]
    TypeMismatch {
        /// Handle that was accessed
        handle: Handle,
        /// Name of the requested type
        expected: &'static str,
    },

    /// A process-wide default was initialized twice
    #[error("already initialized")]
    AlreadyInitialized,

    /// Handle does not name a committed object visible to the transaction
    #[error("no such object: {handle}")]
    NoSuchObject {
        /// Unknown handle
        handle: Handle,
    },

    /// A blocking wait was interrupted before it was woken
    #[error("wait interrupted")]
    Interrupted,

    /// Configuration rejected at construction time
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for mvstm operations
pub type Result<T> = std::result::Result<T, StmError>;

impl StmError {
    /// Shorthand for a conflict error
    pub fn conflict(handle: Handle, kind: ConflictKind) -> Self {
        StmError::Conflict { handle, kind }
    }

    /// Check if this error is retryable
    ///
    /// Retryable errors (conflicts) may succeed when the whole transaction body
    /// is re-run against fresh data.
    pub fn is_retryable(&self) -> bool {
        self.is_conflict()
    }

    /// Check if this is a conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(self, StmError::Conflict { .. })
    }

    /// Check if this is a liveness failure
    pub fn is_liveness_failure(&self) -> bool {
        matches!(
            self,
            StmError::TooManyRetries { .. } | StmError::NoProgressPossible
        )
    }

    /// Check if this error reports misuse of the API
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            StmError::NotActive { .. }
                | StmError::NestedTransaction
                | StmError::NullHandle
                | StmError::TypeMismatch { .. }
                | StmError::AlreadyInitialized
        )
    }

    /// Check if this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, StmError::NoSuchObject { .. })
    }
}
