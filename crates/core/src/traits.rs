//! Capability traits for transactional participants

use crate::tranlocal::TranlocalState;
use crate::types::Handle;

/// An object that can take part in transactions
///
/// The capability is split between the object and its state type:
/// - the object exposes a stable identity through [`Transactable::handle`];
/// - its [`Transactable::State`] produces snapshots (`clone_state`) and
///   reports dirtiness (`state_eq`) through [`TranlocalState`].
///
/// The engine never inspects the fields of `State` directly. Any code
/// generator or hand-written wrapper that provides these two pieces can make a
/// type transactional.
///
/// Snapshot production and the dirty check belong to `State`, not to the
/// object, because the engine handles type-erased states. A state type with a
/// derived `PartialEq` is dirty when any field changed. To narrow that, give
/// `State` a `PartialEq` that compares only the fields that matter, or
/// implement [`TranlocalState`] by hand. A write that leaves the state equal
/// to its origin is not published.
///
/// # Example
///
/// ```
/// use mvstm_core::{Handle, Transactable};
///
/// struct Counter {
///     handle: Handle,
/// }
///
/// impl Transactable for Counter {
///     type State = u64;
///
///     fn handle(&self) -> Handle {
///         self.handle
///     }
/// }
/// ```
pub trait Transactable {
    /// Immutable-per-version state of the object
    type State: TranlocalState + Clone;

    /// Stable identity of the object
    fn handle(&self) -> Handle;
}
