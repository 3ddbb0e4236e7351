//! Engine instance and retry driver
//!
//! [`Stm`] is a cheap, cloneable handle on one transaction manager plus its
//! configuration. [`Stm::atomically`] runs a transaction body until it
//! commits:
//!
//! | Body / commit result | Driver action |
//! |----------------------|---------------|
//! | `Ok` + commit ok | return the value |
//! | conflict | abort, back off, re-run; give up after `max_retries` |
//! | [`StmError::Retry`] | abort, park until a read changes, re-run |
//! | anything else | abort, propagate |
//!
//! Parking does not count against `max_retries`.

use crate::config::{StmBuilder, StmConfig};
use crate::context::ContextGuard;
use mvstm_concurrency::{
    ContentionManager, Latch, StmStats, Transaction, TransactionManager,
};
use mvstm_core::{Result, StmError, Version};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Software transactional memory engine
#[derive(Debug, Clone)]
pub struct Stm {
    manager: Arc<TransactionManager>,
    config: Arc<StmConfig>,
}

impl Stm {
    /// Create an engine with the default configuration
    pub fn new() -> Self {
        let config = StmConfig::default();
        let contention = config.contention.build();
        Self::with_contention(config, contention)
    }

    /// Start building an engine
    pub fn builder() -> StmBuilder {
        StmBuilder::new()
    }

    /// Create an engine from a configuration
    pub fn from_config(config: StmConfig) -> Result<Self> {
        StmBuilder::from_config(config).build()
    }

    pub(crate) fn with_contention(
        config: StmConfig,
        contention: Arc<dyn ContentionManager>,
    ) -> Self {
        let manager = TransactionManager::new(config.manager_options(), contention);
        debug!(
            dawn = config.dawn,
            history_depth = config.history_depth,
            lock_policy = ?config.lock_policy,
            "stm created"
        );
        Self {
            manager: Arc::new(manager),
            config: Arc::new(config),
        }
    }

    /// Start a transaction
    ///
    /// The caller drives it: commit, abort, or drop (which aborts).
    pub fn begin(&self) -> Transaction {
        self.manager.begin()
    }

    /// Latest ticked clock value
    pub fn version(&self) -> Version {
        self.manager.current_version()
    }

    /// Copy of the engine counters
    pub fn stats(&self) -> StmStats {
        self.manager.stats()
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &StmConfig {
        &self.config
    }

    /// Underlying transaction manager
    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    /// Run `body` as one atomic transaction, re-running it as needed
    ///
    /// The body may run many times and must not have side effects outside the
    /// transaction. Returning [`StmError::Retry`] from the body blocks until
    /// another transaction commits to something the body read.
    ///
    /// # Errors
    ///
    /// - [`StmError::NestedTransaction`] if called from inside another body on
    ///   the same thread
    /// - [`StmError::TooManyRetries`] after `max_retries` conflicting re-runs
    /// - [`StmError::NoProgressPossible`] if the body retries without having
    ///   read anything
    /// - any other error returned by the body, unchanged
    ///
    /// # Example
    ///
    /// ```
    /// use mvstm_engine::Stm;
    ///
    /// let stm = Stm::new();
    /// let counter = stm.atomically(|txn| txn.attach(0u64)).unwrap();
    ///
    /// let value = stm
    ///     .atomically(|txn| {
    ///         *txn.get_mut::<u64>(counter)? += 1;
    ///         Ok(*txn.get::<u64>(counter)?)
    ///     })
    ///     .unwrap();
    /// assert_eq!(value, 1);
    /// ```
    pub fn atomically<T, F>(&self, mut body: F) -> Result<T>
    where
        F: FnMut(&mut Transaction) -> Result<T>,
    {
        let _context = ContextGuard::enter()?;
        let mut attempt = 0usize;

        loop {
            let mut txn = self.manager.begin_attempt(attempt);
            let result = body(&mut txn).and_then(|value| txn.commit().map(|_| value));

            match result {
                Ok(value) => return Ok(value),
                Err(StmError::Retry) => self.park(&mut txn)?,
                Err(e) if e.is_retryable() => {
                    // Conflicts raised by the body leave the transaction active
                    let _ = txn.abort();
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        self.manager.counters().record_too_many_retries();
                        warn!(attempts = attempt, error = %e, "giving up after repeated conflicts");
                        return Err(StmError::TooManyRetries { attempts: attempt });
                    }
                    let delay = self.manager.contention().backoff(attempt - 1);
                    trace!(attempt, ?delay, error = %e, "re-running after conflict");
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
                Err(e) => {
                    let _ = txn.abort();
                    return Err(e);
                }
            }
        }
    }

    /// Discard `txn`'s writes and block until one of its reads changes
    fn park(&self, txn: &mut Transaction) -> Result<()> {
        txn.abort()?;
        let latch = Arc::new(Latch::new());
        self.manager.register_retry(txn, &latch)?;
        self.manager.counters().record_blocked();
        debug!(
            txn = %txn.id(),
            reads = txn.read_count(),
            start_version = txn.start_version(),
            "parking on retry"
        );
        latch.await_uninterruptibly();
        trace!(txn = %txn.id(), "woken from retry");
        Ok(())
    }
}

impl Default for Stm {
    fn default() -> Self {
        Self::new()
    }
}
