//! Engine layer for mvstm
//!
//! Ties the lower crates into a usable engine:
//! - Stm: explicit engine instance with the `atomically` retry driver
//! - StmConfig / StmBuilder: serde + TOML configuration, fluent builder
//! - context: per-thread guard rejecting nested atomic blocks
//! - global: optional init-once process default

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod global;
pub mod stm;

pub use config::{StmBuilder, StmConfig, DEFAULT_MAX_RETRIES};
pub use context::{in_transaction, ContextGuard};
pub use stm::Stm;
