//! Process-wide default engine
//!
//! Code that owns its [`Stm`] should pass it around explicitly. This module is
//! for callers that need one shared instance without plumbing: it is set at
//! most once, either by [`init`] or lazily with defaults by the first [`get`].

use crate::config::StmConfig;
use crate::stm::Stm;
use mvstm_core::{Result, StmError};
use once_cell::sync::OnceCell;

static GLOBAL: OnceCell<Stm> = OnceCell::new();

/// Install the process default from `config`
///
/// # Errors
///
/// - [`StmError::AlreadyInitialized`] if a default already exists, including
///   one created by an earlier [`get`]
/// - [`StmError::InvalidConfig`] if `config` is rejected
pub fn init(config: StmConfig) -> Result<&'static Stm> {
    let stm = Stm::from_config(config)?;
    GLOBAL
        .set(stm)
        .map_err(|_| StmError::AlreadyInitialized)?;
    Ok(get())
}

/// Process default, created with the default configuration on first use
pub fn get() -> &'static Stm {
    GLOBAL.get_or_init(Stm::new)
}

/// Process default, if one was created
pub fn try_get() -> Option<&'static Stm> {
    GLOBAL.get()
}
