//! Commit-time validation
//!
//! Validation runs while the committing transaction holds the locks of its
//! dirty write-set. Every handle it depends on is compared against the latest
//! version in the heap: a newer version means another transaction committed
//! to it after this one read it.
//!
//! - read-set: every handle loaded from the heap, including handles opened
//!   for write whose working copy ended up unchanged
//! - write-set: every dirty handle that existed before this transaction
//!
//! Objects created by the transaction itself have nothing to validate.
//!
//! Validation compares versions only. Two transactions that each read what
//! the other writes can both validate before either publishes.

use crate::transaction::Transaction;
use mvstm_core::{ConflictKind, Handle, StmError, Version};
use mvstm_storage::VersionedHeap;

/// A single detected conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictType {
    /// A handle the transaction only read was committed to since
    ReadWrite {
        /// Conflicting handle
        handle: Handle,
        /// Version the transaction read
        read_version: Version,
        /// Version now in the heap
        current_version: Version,
    },
    /// A handle the transaction writes was committed to since it was read
    WriteWrite {
        /// Conflicting handle
        handle: Handle,
        /// Version the working copy was privatized from
        read_version: Version,
        /// Version now in the heap
        current_version: Version,
    },
}

impl ConflictType {
    /// Handle the conflict was detected on
    pub fn handle(&self) -> Handle {
        match *self {
            ConflictType::ReadWrite { handle, .. } | ConflictType::WriteWrite { handle, .. } => {
                handle
            }
        }
    }

    /// Convert into the retryable engine error
    pub fn into_error(self) -> StmError {
        let (handle, read, current) = match self {
            ConflictType::ReadWrite {
                handle,
                read_version,
                current_version,
            }
            | ConflictType::WriteWrite {
                handle,
                read_version,
                current_version,
            } => (handle, read_version, current_version),
        };
        StmError::conflict(handle, ConflictKind::VersionMismatch { read, current })
    }
}

/// All conflicts found by one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// Conflicts in handle order, read-set first
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// A result with no conflicts
    pub fn ok() -> Self {
        Self::default()
    }

    /// Check if no conflict was found
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Number of conflicts found
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// Append the conflicts of another pass
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }

    /// Error for the first conflict, if any
    pub fn first_error(&self) -> Option<StmError> {
        self.conflicts.first().map(|c| c.into_error())
    }
}

fn current_version(heap: &VersionedHeap, handle: Handle) -> Option<Version> {
    heap.latest_version(handle)
}

/// Validate `(handle, version read)` pairs against the heap
pub fn validate_read_set<I>(heap: &VersionedHeap, reads: I) -> ValidationResult
where
    I: IntoIterator<Item = (Handle, Version)>,
{
    let conflicts = reads
        .into_iter()
        .filter_map(|(handle, read_version)| {
            current_version(heap, handle)
                .filter(|&current| current > read_version)
                .map(|current_version| ConflictType::ReadWrite {
                    handle,
                    read_version,
                    current_version,
                })
        })
        .collect();
    ValidationResult { conflicts }
}

/// Validate `(handle, origin version)` pairs of dirty writes against the heap
pub fn validate_write_set<I>(heap: &VersionedHeap, writes: I) -> ValidationResult
where
    I: IntoIterator<Item = (Handle, Version)>,
{
    let conflicts = writes
        .into_iter()
        .filter_map(|(handle, read_version)| {
            current_version(heap, handle)
                .filter(|&current| current > read_version)
                .map(|current_version| ConflictType::WriteWrite {
                    handle,
                    read_version,
                    current_version,
                })
        })
        .collect();
    ValidationResult { conflicts }
}

/// Validate a transaction's read-set and dirty write-set
///
/// With `allow_write_skew` only the dirty write-set is checked, which admits
/// write skew between transactions with disjoint write-sets.
pub fn validate_transaction(
    txn: &Transaction,
    heap: &VersionedHeap,
    allow_write_skew: bool,
) -> ValidationResult {
    let dirty_writes = txn
        .write_set
        .iter()
        .filter(|(_, entry)| entry.is_dirty())
        .filter_map(|(&handle, entry)| entry.origin_version().map(|v| (handle, v)));

    let mut result = ValidationResult::ok();
    if !allow_write_skew {
        let reads = txn
            .read_set
            .iter()
            .filter(|(handle, _)| {
                txn.write_set
                    .get(*handle)
                    .map_or(true, |entry| !entry.is_dirty())
            })
            .map(|(&handle, tranlocal)| (handle, tranlocal.version()));
        result.merge(validate_read_set(heap, reads));
    }
    result.merge(validate_write_set(heap, dirty_writes));
    result
}
