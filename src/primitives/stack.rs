//! Transactional LIFO stack.
//!
//! `pop` on an empty stack does not fail: it asks the retry driver to block
//! until another transaction changes the stack.
//!
//! # Example
//!
//! ```
//! use mvstm::prelude::*;
//!
//! let stm = Stm::new();
//! let stack = stm.atomically(|txn| Stack::new(txn)).unwrap();
//!
//! stm.atomically(|txn| {
//!     stack.push(txn, 1)?;
//!     stack.push(txn, 2)
//! })
//! .unwrap();
//! assert_eq!(stm.atomically(|txn| stack.pop(txn)).unwrap(), 2);
//! ```

use super::{Element, TRef};
use mvstm_concurrency::Transaction;
use mvstm_core::{Handle, Result, StmError, Transactable};
use std::fmt;

/// Stack of `T` stored in one transactional object
pub struct Stack<T> {
    items: TRef<Vec<T>>,
}

impl<T> Clone for Stack<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Stack<T> {}

impl<T> fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack").field("items", &self.items).finish()
    }
}

impl<T: Element> Stack<T> {
    /// Create an empty stack
    pub fn new(txn: &mut Transaction) -> Result<Self> {
        Ok(Self {
            items: TRef::new(txn, Vec::new())?,
        })
    }

    /// Push an item on top
    pub fn push(&self, txn: &mut Transaction, item: T) -> Result<()> {
        self.items.modify(txn, |items| items.push(item))
    }

    /// Pop the top item, blocking while the stack is empty
    ///
    /// Returns [`StmError::Retry`] when empty, so inside
    /// [`Stm::atomically`](mvstm_engine::Stm::atomically) the body is re-run
    /// once another transaction pushes.
    pub fn pop(&self, txn: &mut Transaction) -> Result<T> {
        self.try_pop(txn)?.ok_or(StmError::Retry)
    }

    /// Pop the top item, `None` if empty
    pub fn try_pop(&self, txn: &mut Transaction) -> Result<Option<T>> {
        // Read first: an empty stack leaves no working copy behind
        if self.items.read(txn)?.is_empty() {
            return Ok(None);
        }
        self.items.modify(txn, |items| items.pop())
    }

    /// Copy of the top item, `None` if empty
    pub fn peek(&self, txn: &mut Transaction) -> Result<Option<T>> {
        Ok(self.items.read(txn)?.last().cloned())
    }

    /// Number of items
    pub fn len(&self, txn: &mut Transaction) -> Result<usize> {
        Ok(self.items.read(txn)?.len())
    }

    /// Check if the stack holds no item
    pub fn is_empty(&self, txn: &mut Transaction) -> Result<bool> {
        Ok(self.items.read(txn)?.is_empty())
    }

    /// Remove every item
    pub fn clear(&self, txn: &mut Transaction) -> Result<()> {
        if self.is_empty(txn)? {
            return Ok(());
        }
        self.items.set(txn, Vec::new())
    }

    /// Remove every item, bottom first
    pub fn take_all(&self, txn: &mut Transaction) -> Result<Vec<T>> {
        if self.is_empty(txn)? {
            return Ok(Vec::new());
        }
        self.items.replace(txn, Vec::new())
    }

    /// Replace the contents, the last item ends up on top
    pub fn set_all(&self, txn: &mut Transaction, items: Vec<T>) -> Result<()> {
        self.items.set(txn, items)
    }
}

impl<T: Element> Transactable for Stack<T> {
    type State = Vec<T>;

    fn handle(&self) -> Handle {
        self.items.handle()
    }
}
