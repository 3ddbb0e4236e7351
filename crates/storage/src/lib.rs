//! Storage layer for mvstm
//!
//! This crate implements the shared, versioned state of the engine:
//! - Clock: process-wide logical version counter
//! - VersionedHeap: handle → committed snapshot history, DashMap of slots
//! - Slot: per-object version chain behind an `ArcSwap` plus a commit lock word

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod heap;

pub use clock::Clock;
pub use heap::{Slot, VersionedHeap, DEFAULT_HISTORY_DEPTH};
