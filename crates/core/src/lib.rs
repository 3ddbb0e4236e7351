//! Core types for mvstm
//!
//! This crate defines the vocabulary shared by every layer of the engine:
//! - [`Handle`], [`Version`], [`TxnId`]: identities and logical time
//! - [`Tranlocal`]: a per-transaction snapshot of one object's state
//! - [`Transactable`]: the capability a participating object provides
//! - [`StmError`]: the single error type of the engine

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod tranlocal;
pub mod traits;
pub mod types;

pub use error::{ConflictKind, Result, StmError};
pub use tranlocal::{Tranlocal, TranlocalState};
pub use traits::Transactable;
pub use types::{Handle, TransactionStatus, TxnId, Version};
