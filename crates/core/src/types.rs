//! Core identifiers for the transactional heap
//!
//! - [`Handle`]: stable identity of a transactional object
//! - [`Version`]: a value of the logical clock
//! - [`TxnId`]: identity of one transaction attempt
//! - [`TransactionStatus`]: lifecycle state of a transaction

use crate::error::{Result, StmError};
use serde::{Deserialize, Serialize};

/// Logical clock value
///
/// Every committed snapshot carries the version it was published at.
/// Versions never decrease.
pub type Version = u64;

/// Stable identity of a transactional object
///
/// Handles are allocated by the heap from a counter starting at 1 and are
/// never reused. Handle `0` ([`Handle::NULL`]) is reserved for "no object".
///
/// Handles order by their raw value. Commit locks are acquired in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(u64);

impl Handle {
    /// The reserved "no object" handle
    pub const NULL: Handle = Handle(0);

    /// Create a handle from its raw value
    ///
    /// # Examples
    ///
    /// ```
    /// use mvstm_core::Handle;
    ///
    /// let handle = Handle::from_raw(7);
    /// assert_eq!(handle.as_u64(), 7);
    /// assert!(!handle.is_null());
    /// ```
    pub const fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    /// Raw numeric value
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Check whether this is the reserved null handle
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Reject the null handle
    ///
    /// Returns [`StmError::NullHandle`] for [`Handle::NULL`], the handle itself
    /// otherwise.
    pub fn ensure_not_null(self) -> Result<Self> {
        if self.is_null() {
            Err(StmError::NullHandle)
        } else {
            Ok(self)
        }
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique identifier of a transaction
///
/// Identifiers are handed out in increasing order, so a smaller id means an
/// older transaction. The raw value `0` is never assigned; lock words use it
/// to mean "unowned".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxnId(u64);

impl TxnId {
    /// Create an id from its raw value
    pub const fn from_raw(raw: u64) -> Self {
        TxnId(raw)
    }

    /// Raw numeric value
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Status of a transaction in its lifecycle
///
/// State transitions:
/// - `Active` → `Committed`
/// - `Active` → `Aborted`
///
/// Both terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    /// Transaction is executing, can read and write
    Active,
    /// Transaction committed successfully
    Committed,
    /// Transaction was aborted, by its owner or by a conflict
    Aborted,
}

impl TransactionStatus {
    /// Check if the transaction can still read and write
    pub fn is_active(self) -> bool {
        matches!(self, TransactionStatus::Active)
    }

    /// Check if the transaction reached a terminal state
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransactionStatus::Active => "active",
            TransactionStatus::Committed => "committed",
            TransactionStatus::Aborted => "aborted",
        };
        f.write_str(name)
    }
}
