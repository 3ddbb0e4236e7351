//! Per-transaction snapshots of object state
//!
//! A [`Tranlocal`] is the state of one transactional object as of a version.
//! Committed tranlocals live in the heap behind an `Arc` and are never
//! mutated again. A transaction that writes an object *privatizes* the
//! committed tranlocal into an uncommitted copy it owns exclusively, mutates
//! that copy, and hands it back to the heap on commit.
//!
//! The object state itself is type-erased behind [`TranlocalState`], so the
//! heap can store objects of any type side by side.

use crate::error::{Result, StmError};
use crate::types::{Handle, Version};
use std::any::Any;
use std::fmt;

/// Field state of a transactional object
///
/// Implemented for every `Clone + PartialEq + Debug + Send + Sync + 'static`
/// type. `clone_state` produces a fresh snapshot, `state_eq` decides whether a
/// working copy is dirty compared with the snapshot it was privatized from.
pub trait TranlocalState: Any + Send + Sync + fmt::Debug {
    /// Produce an independent copy of this state
    fn clone_state(&self) -> Box<dyn TranlocalState>;

    /// Compare with another state of possibly different type
    fn state_eq(&self, other: &dyn TranlocalState) -> bool;

    /// Upcast for downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete type
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T> TranlocalState for T
where
    T: Any + Clone + PartialEq + Send + Sync + fmt::Debug,
{
    fn clone_state(&self) -> Box<dyn TranlocalState> {
        Box::new(self.clone())
    }

    fn state_eq(&self, other: &dyn TranlocalState) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| other == self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Snapshot of one object's state at a version
///
/// # Invariants
///
/// - committed: `version` is the clock value the snapshot was published at
/// - uncommitted: `version` is the version of the committed snapshot it was
///   privatized from, or `0` for an object created by the owning transaction
#[derive(Debug)]
pub struct Tranlocal {
    handle: Handle,
    version: Version,
    committed: bool,
    state: Box<dyn TranlocalState>,
}

impl Tranlocal {
    /// Create a committed snapshot
    pub fn committed(handle: Handle, version: Version, state: Box<dyn TranlocalState>) -> Self {
        Self {
            handle,
            version,
            committed: true,
            state,
        }
    }

    /// Create the first, uncommitted snapshot of a newly attached object
    pub fn fresh(handle: Handle, state: Box<dyn TranlocalState>) -> Self {
        Self {
            handle,
            version: 0,
            committed: false,
            state,
        }
    }

    /// Produce a private, uncommitted copy for writing
    ///
    /// The copy keeps this snapshot's version so commit-time validation can
    /// tell whether the object changed underneath the writer.
    pub fn privatize(&self) -> Tranlocal {
        Tranlocal {
            handle: self.handle,
            version: self.version,
            committed: false,
            state: self.state.clone_state(),
        }
    }

    /// Turn an uncommitted copy into a committed snapshot at `version`
    pub fn into_committed(self, version: Version) -> Tranlocal {
        Tranlocal {
            handle: self.handle,
            version,
            committed: true,
            state: self.state,
        }
    }

    /// Check whether this working copy differs from its origin
    ///
    /// A copy without an origin belongs to a newly attached object and is
    /// always dirty.
    pub fn is_dirty(&self, origin: Option<&Tranlocal>) -> bool {
        match origin {
            Some(origin) => !self.state.state_eq(origin.state.as_ref()),
            None => true,
        }
    }

    /// Handle of the object
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Version this snapshot was published at or read from
    pub fn version(&self) -> Version {
        self.version
    }

    /// Check if this snapshot has been published
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Type-erased state
    pub fn state(&self) -> &dyn TranlocalState {
        self.state.as_ref()
    }

    /// Borrow the state as its concrete type
    pub fn downcast_ref<T: Any>(&self) -> Result<&T> {
        self.state
            .as_any()
            .downcast_ref::<T>()
            .ok_or(StmError::TypeMismatch {
                handle: self.handle,
                expected: std::any::type_name::<T>(),
            })
    }

    /// Mutably borrow the state as its concrete type
    ///
    /// Only uncommitted snapshots can be mutated. Committed ones are shared
    /// behind an `Arc`, so this is unreachable for them through safe code, but
    /// a committed snapshot that is still uniquely owned is rejected too.
    pub fn downcast_mut<T: Any>(&mut self) -> Result<&mut T> {
        let handle = self.handle;
        if self.committed {
            return Err(StmError::NotActive {
                status: crate::types::TransactionStatus::Committed,
            });
        }
        self.state
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or(StmError::TypeMismatch {
                handle,
                expected: std::any::type_name::<T>(),
            })
    }
}
