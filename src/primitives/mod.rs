//! Transactional data structures.
//!
//! Each structure is a small `Copy` value naming one or more heap objects.
//! All operations take the transaction explicitly and compose freely inside
//! one atomic block.

mod queue;
mod stack;
mod tref;

pub use queue::Queue;
pub use stack::Stack;
pub use tref::TRef;

use std::fmt;

/// Values that can be stored in transactional structures
///
/// Implemented for every `Clone + PartialEq + Debug + Send + Sync + 'static`
/// type.
pub trait Element: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

impl<T> Element for T where T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}
