//! Per-thread atomic block context
//!
//! Transactions are passed explicitly as `&mut Transaction`. The context only
//! records whether an atomic block is running on the current thread, so that
//! a nested `atomically` fails instead of silently starting an independent
//! transaction.

use mvstm_core::{Result, StmError};
use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static IN_ATOMIC: Cell<bool> = Cell::new(false);
}

/// Marks the current thread as running an atomic block until dropped
#[derive(Debug)]
pub struct ContextGuard {
    /// Bound to the thread that entered
    _not_send: PhantomData<*const ()>,
}

impl ContextGuard {
    /// Enter an atomic block on this thread
    ///
    /// # Errors
    ///
    /// [`StmError::NestedTransaction`] if one is already running.
    pub fn enter() -> Result<Self> {
        IN_ATOMIC.with(|flag| {
            if flag.replace(true) {
                Err(StmError::NestedTransaction)
            } else {
                Ok(ContextGuard {
                    _not_send: PhantomData,
                })
            }
        })
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        IN_ATOMIC.with(|flag| flag.set(false));
    }
}

/// Check if an atomic block is running on this thread
pub fn in_transaction() -> bool {
    IN_ATOMIC.with(Cell::get)
}
