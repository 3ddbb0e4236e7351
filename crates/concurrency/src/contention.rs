//! Contention management
//!
//! A [`ContentionManager`] decides two things:
//! - while a committing transaction spins on a commit lock held by another
//!   transaction, whether it keeps waiting or gives up ([`Resolution`]);
//! - how long the retry driver sleeps before re-running a conflicted body.
//!
//! Managers are shared across threads behind `Arc<dyn ContentionManager>`.
//! [`ContentionPolicy`] is the serializable selector used by configuration.

use mvstm_core::{TxnId, Version};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Identity of the transaction asking for a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnInfo {
    /// Transaction id, smaller is older
    pub id: TxnId,
    /// Snapshot version the transaction reads at
    pub start_version: Version,
    /// Zero-based attempt number within the enclosing retry driver
    pub attempt: usize,
}

/// Outcome of a contention decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Keep spinning on the lock
    Wait,
    /// Stop spinning and fail the lock acquisition
    AbortSelf,
}

/// Policy deciding who backs off under contention
pub trait ContentionManager: Send + Sync + fmt::Debug {
    /// Decide whether `me` keeps waiting for a lock owned by `other`
    fn resolve(&self, me: &TxnInfo, other: TxnId) -> Resolution;

    /// Delay before re-running a body that conflicted on `attempt`
    fn backoff(&self, attempt: usize) -> Duration;
}

/// Always keep going, never sleep
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggressive;

impl ContentionManager for Aggressive {
    fn resolve(&self, _me: &TxnInfo, _other: TxnId) -> Resolution {
        Resolution::Wait
    }

    fn backoff(&self, _attempt: usize) -> Duration {
        Duration::ZERO
    }
}

/// Older transaction wins
///
/// A transaction waits for locks held by younger transactions and aborts
/// itself when the holder is older. Ids are handed out in start order, so the
/// smaller id is the older transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timestamp;

impl ContentionManager for Timestamp {
    fn resolve(&self, me: &TxnInfo, other: TxnId) -> Resolution {
        if me.id < other {
            Resolution::Wait
        } else {
            Resolution::AbortSelf
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        // Linear, the younger side usually loses only a few times
        Duration::from_micros(attempt.min(100) as u64)
    }
}

/// Randomized exponential backoff
///
/// The delay for attempt `n` is drawn uniformly from `[d/2, d]` where
/// `d = min(base * 2^n, max)`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// Create a backoff manager
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    /// Upper bound of the delay for `attempt`, before jitter
    fn ceiling(&self, attempt: usize) -> Duration {
        // Cap the shift to prevent overflow
        let multiplier = 1u32 << attempt.min(20);
        self.base.saturating_mul(multiplier).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_micros(10), Duration::from_millis(10))
    }
}

impl ContentionManager for Backoff {
    fn resolve(&self, _me: &TxnInfo, _other: TxnId) -> Resolution {
        Resolution::Wait
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let ceiling = self.ceiling(attempt).as_nanos() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        let nanos = rand::thread_rng().gen_range(ceiling / 2..=ceiling);
        Duration::from_nanos(nanos)
    }
}

/// Serializable choice of contention manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentionPolicy {
    /// [`Aggressive`]
    Aggressive,
    /// [`Timestamp`]
    Timestamp,
    /// [`Backoff`] with delays in microseconds
    Backoff {
        /// Delay of the first retry
        base_delay_us: u64,
        /// Cap on any single delay
        max_delay_us: u64,
    },
}

impl Default for ContentionPolicy {
    fn default() -> Self {
        ContentionPolicy::Backoff {
            base_delay_us: 10,
            max_delay_us: 10_000,
        }
    }
}

impl ContentionPolicy {
    /// Instantiate the manager this policy names
    pub fn build(&self) -> Arc<dyn ContentionManager> {
        match *self {
            ContentionPolicy::Aggressive => Arc::new(Aggressive),
            ContentionPolicy::Timestamp => Arc::new(Timestamp),
            ContentionPolicy::Backoff {
                base_delay_us,
                max_delay_us,
            } => Arc::new(Backoff::new(
                Duration::from_micros(base_delay_us),
                Duration::from_micros(max_delay_us),
            )),
        }
    }
}
