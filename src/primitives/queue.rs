//! Bounded transactional FIFO queue.
//!
//! Built from two stacks: producers push onto `pushed`, consumers pop from
//! `readable`. When `readable` runs dry, the whole of `pushed` is moved over
//! in reverse, which puts the oldest item on top.
//!
//! `push` reads both stacks to check the capacity, so a producer and a
//! consumer running at the same time do conflict: a committed `take` changes
//! `readable` (or `pushed`), which the producer has read. The split only
//! makes the transfer amortized.
//!
//! Both ends block through retry: `push` while the queue is full, `take`
//! while it is empty.
//!
//! # Example
//!
//! ```
//! use mvstm::prelude::*;
//!
//! let stm = Stm::new();
//! let queue = stm.atomically(|txn| Queue::new(txn, 16)).unwrap();
//!
//! stm.atomically(|txn| {
//!     queue.push(txn, "1")?;
//!     queue.push(txn, "2")
//! })
//! .unwrap();
//! assert_eq!(stm.atomically(|txn| queue.take(txn)).unwrap(), "1");
//! ```

use super::{Element, Stack};
use mvstm_concurrency::Transaction;
use mvstm_core::{Result, StmError};
use std::fmt;

/// FIFO queue holding at most `capacity` items
pub struct Queue<T> {
    pushed: Stack<T>,
    readable: Stack<T>,
    capacity: usize,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Queue<T> {}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("pushed", &self.pushed)
            .field("readable", &self.readable)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T: Element> Queue<T> {
    /// Create an empty queue
    ///
    /// # Errors
    ///
    /// [`StmError::InvalidConfig`] if `capacity` is zero.
    pub fn new(txn: &mut Transaction, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(StmError::InvalidConfig(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            pushed: Stack::new(txn)?,
            readable: Stack::new(txn)?,
            capacity,
        })
    }

    /// Maximum number of items
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items
    pub fn len(&self, txn: &mut Transaction) -> Result<usize> {
        Ok(self.pushed.len(txn)? + self.readable.len(txn)?)
    }

    /// Check if the queue holds no item
    pub fn is_empty(&self, txn: &mut Transaction) -> Result<bool> {
        Ok(self.len(txn)? == 0)
    }

    /// Append an item, blocking while the queue is full
    pub fn push(&self, txn: &mut Transaction, item: T) -> Result<()> {
        if self.len(txn)? >= self.capacity {
            return Err(StmError::Retry);
        }
        self.pushed.push(txn, item)
    }

    /// Remove the oldest item, blocking while the queue is empty
    pub fn take(&self, txn: &mut Transaction) -> Result<T> {
        self.try_take(txn)?.ok_or(StmError::Retry)
    }

    /// Remove the oldest item, `None` if empty
    pub fn try_take(&self, txn: &mut Transaction) -> Result<Option<T>> {
        if let Some(item) = self.readable.try_pop(txn)? {
            return Ok(Some(item));
        }
        let mut items = self.pushed.take_all(txn)?;
        if items.is_empty() {
            return Ok(None);
        }
        items.reverse();
        let oldest = items.pop();
        self.readable.set_all(txn, items)?;
        Ok(oldest)
    }
}
