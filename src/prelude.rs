//! Convenient imports for mvstm.
//!
//! This module re-exports the most commonly used types so you can get started
//! with a single import:
//!
//! ```
//! use mvstm::prelude::*;
//!
//! let stm = Stm::new();
//! let cell = stm.atomically(|txn| TRef::new(txn, 0u64)).unwrap();
//! stm.atomically(|txn| cell.set(txn, 1)).unwrap();
//! ```

// Engine
pub use crate::{Stm, StmBuilder, StmConfig};

// Transactions
pub use crate::{CommitOutcome, Transaction};

// Error handling
pub use crate::{Result, StmError};

// Structures
pub use crate::{Queue, Stack, TRef};

// Retry helpers
pub use crate::{guard, retry, unwrap_or_retry};
