//! Engine configuration
//!
//! [`StmConfig`] is plain data: it can be built in code, through the fluent
//! [`StmBuilder`], or loaded from TOML. Every field has a default, so a TOML
//! document only needs the keys it changes.
//!
//! # Example Configuration
//!
//! ```toml
//! dawn = 0
//! history_depth = 8
//! max_retries = 1000
//! allow_write_skew = false
//!
//! [lock_policy]
//! kind = "spin_retry"
//! spin_attempts = 64
//! retries = 3
//!
//! [contention]
//! kind = "backoff"
//! base_delay_us = 10
//! max_delay_us = 10000
//! ```

use crate::stm::Stm;
use mvstm_concurrency::{ContentionManager, ContentionPolicy, LockPolicy, ManagerOptions};
use mvstm_core::{Result, StmError, Version};
use mvstm_storage::DEFAULT_HISTORY_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Default number of conflicting attempts before the retry driver gives up
pub const DEFAULT_MAX_RETRIES: usize = 1000;

/// Configuration of one [`Stm`] instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StmConfig {
    /// Starting value of the clock
    pub dawn: Version,
    /// Committed versions retained per object, at least 1
    pub history_depth: usize,
    /// Conflicting re-runs allowed per atomic block (0 = no re-runs)
    pub max_retries: usize,
    /// Validate only the dirty write-set, not the read-set
    pub allow_write_skew: bool,
    /// How commit locks are taken
    pub lock_policy: LockPolicy,
    /// Who backs off under contention
    pub contention: ContentionPolicy,
}

impl Default for StmConfig {
    fn default() -> Self {
        Self {
            dawn: 0,
            history_depth: DEFAULT_HISTORY_DEPTH,
            max_retries: DEFAULT_MAX_RETRIES,
            allow_write_skew: false,
            lock_policy: LockPolicy::default(),
            contention: ContentionPolicy::default(),
        }
    }
}

impl StmConfig {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: StmConfig =
            toml::from_str(content).map_err(|e| StmError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StmError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| StmError::InvalidConfig(e.to_string()))
    }

    /// Check that the values are usable
    pub fn validate(&self) -> Result<()> {
        if self.history_depth == 0 {
            return Err(StmError::InvalidConfig(
                "history_depth must be at least 1".to_string(),
            ));
        }
        if let ContentionPolicy::Backoff {
            base_delay_us,
            max_delay_us,
        } = self.contention
        {
            if base_delay_us > max_delay_us {
                return Err(StmError::InvalidConfig(format!(
                    "backoff base delay {}us exceeds max delay {}us",
                    base_delay_us, max_delay_us
                )));
            }
        }
        Ok(())
    }

    /// Options for the transaction manager
    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            dawn: self.dawn,
            history_depth: self.history_depth,
            lock_policy: self.lock_policy,
            allow_write_skew: self.allow_write_skew,
        }
    }
}

/// Fluent builder for [`Stm`]
///
/// # Example
///
/// ```
/// use mvstm_engine::Stm;
/// use mvstm_concurrency::LockPolicy;
///
/// let stm = Stm::builder()
///     .dawn(10)
///     .lock_policy(LockPolicy::NoSpin)
///     .max_retries(50)
///     .build()
///     .unwrap();
/// assert_eq!(stm.version(), 10);
/// ```
#[derive(Debug, Default)]
pub struct StmBuilder {
    config: StmConfig,
    contention_manager: Option<Arc<dyn ContentionManager>>,
}

impl StmBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: StmConfig) -> Self {
        Self {
            config,
            contention_manager: None,
        }
    }

    /// Set the starting value of the clock
    pub fn dawn(mut self, dawn: Version) -> Self {
        self.config.dawn = dawn;
        self
    }

    /// Set the number of versions retained per object
    pub fn history_depth(mut self, depth: usize) -> Self {
        self.config.history_depth = depth;
        self
    }

    /// Set the lock policy
    pub fn lock_policy(mut self, policy: LockPolicy) -> Self {
        self.config.lock_policy = policy;
        self
    }

    /// Pick one of the built-in contention managers
    pub fn contention(mut self, policy: ContentionPolicy) -> Self {
        self.config.contention = policy;
        self.contention_manager = None;
        self
    }

    /// Use randomized exponential backoff between `base` and `max`
    pub fn backoff(self, base: Duration, max: Duration) -> Self {
        self.contention(ContentionPolicy::Backoff {
            base_delay_us: base.as_micros() as u64,
            max_delay_us: max.as_micros() as u64,
        })
    }

    /// Use a custom contention manager
    pub fn contention_manager(mut self, manager: Arc<dyn ContentionManager>) -> Self {
        self.contention_manager = Some(manager);
        self
    }

    /// Set the number of conflicting re-runs per atomic block
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Validate only dirty writes at commit
    pub fn allow_write_skew(mut self, allow: bool) -> Self {
        self.config.allow_write_skew = allow;
        self
    }

    /// Validate the configuration and create the engine
    pub fn build(self) -> Result<Stm> {
        self.config.validate()?;
        let contention = self
            .contention_manager
            .unwrap_or_else(|| self.config.contention.build());
        Ok(Stm::with_contention(self.config, contention))
    }
}
