//! Transactional reference cell.
//!
//! # Example
//!
//! ```
//! use mvstm::prelude::*;
//!
//! let stm = Stm::new();
//! let balance = stm.atomically(|txn| TRef::new(txn, 100i64)).unwrap();
//!
//! stm.atomically(|txn| balance.modify(txn, |b| *b -= 30)).unwrap();
//! assert_eq!(stm.atomically(|txn| balance.get(txn)).unwrap(), 70);
//! ```

use super::Element;
use mvstm_concurrency::Transaction;
use mvstm_core::{Handle, Result, Transactable};
use std::fmt;
use std::marker::PhantomData;

/// Typed handle on one transactional value
///
/// A `TRef` is only an identity: it is `Copy`, can be shared freely between
/// threads, and every access goes through a transaction.
pub struct TRef<T> {
    handle: Handle,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TRef<T> {}

impl<T> PartialEq for TRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<T> Eq for TRef<T> {}

impl<T> fmt::Debug for TRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TRef").field(&self.handle).finish()
    }
}

impl<T: Element> TRef<T> {
    /// Create a new cell holding `value`
    ///
    /// The cell becomes visible to other transactions when `txn` commits.
    pub fn new(txn: &mut Transaction, value: T) -> Result<Self> {
        Ok(Self::from_handle(txn.attach(value)?))
    }

    /// Wrap an existing handle
    ///
    /// Accesses fail with a type mismatch if the handle holds another type.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }

    /// Handle of the cell
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Borrow the value
    pub fn read<'t>(&self, txn: &'t mut Transaction) -> Result<&'t T> {
        txn.get::<T>(self.handle)
    }

    /// Copy of the value
    pub fn get(&self, txn: &mut Transaction) -> Result<T> {
        self.read(txn).cloned()
    }

    /// Overwrite the value
    pub fn set(&self, txn: &mut Transaction, value: T) -> Result<()> {
        *txn.get_mut::<T>(self.handle)? = value;
        Ok(())
    }

    /// Overwrite the value, returning the previous one
    pub fn replace(&self, txn: &mut Transaction, value: T) -> Result<T> {
        Ok(std::mem::replace(txn.get_mut::<T>(self.handle)?, value))
    }

    /// Update the value in place
    pub fn modify<R>(&self, txn: &mut Transaction, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        Ok(f(txn.get_mut::<T>(self.handle)?))
    }
}

impl<T: Element> Transactable for TRef<T> {
    type State = T;

    fn handle(&self) -> Handle {
        self.handle
    }
}
