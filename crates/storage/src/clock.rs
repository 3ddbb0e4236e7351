//! Global logical clock
//!
//! The clock only moves forward. Every successful updating commit ticks it
//! exactly once and tags all of its snapshots with the returned value.

use mvstm_core::Version;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing logical version counter
///
/// # Thread Safety
///
/// `tick()` is a single atomic `fetch_add`, so concurrent callers always get
/// distinct, strictly increasing values with no gaps.
pub struct Clock {
    dawn: Version,
    time: AtomicU64,
}

impl Clock {
    /// Create a clock starting at `dawn`
    ///
    /// The first `tick()` returns `dawn + 1`.
    pub fn new(dawn: Version) -> Self {
        Self {
            dawn,
            time: AtomicU64::new(dawn),
        }
    }

    /// Starting value of this clock
    pub fn dawn(&self) -> Version {
        self.dawn
    }

    /// Latest ticked value, without side effects
    #[inline]
    pub fn current(&self) -> Version {
        self.time.load(Ordering::Acquire)
    }

    /// Increment and return the new version
    #[inline]
    pub fn tick(&self) -> Version {
        self.time.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("dawn", &self.dawn)
            .field("current", &self.current())
            .finish()
    }
}
