//! One-shot latch for blocking retry
//!
//! A latch starts closed and opens once. Opening releases every waiter and
//! further `open()` calls are no-ops. Waiting interruptibly can be cut short
//! by [`Latch::interrupt`], which is reported as [`StmError::Interrupted`]
//! rather than as a normal wakeup.
//!
//! An interrupt stays pending until an interruptible wait consumes it, so an
//! interrupt issued before the waiter parks is not lost.

use mvstm_core::{Result, StmError};
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct LatchState {
    open: bool,
    /// Set by `interrupt()`, cleared by the interruptible wait that sees it
    interrupt_pending: bool,
}

/// One-way `closed -> open` gate
#[derive(Debug, Default)]
pub struct Latch {
    state: Mutex<LatchState>,
    cond: Condvar,
}

impl Latch {
    /// Create a closed latch
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a latch that is already open
    pub fn new_open() -> Self {
        Self {
            state: Mutex::new(LatchState {
                open: true,
                interrupt_pending: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Open the latch and release all waiters
    pub fn open(&self) {
        let mut state = self.state.lock();
        if !state.open {
            state.open = true;
            self.cond.notify_all();
        }
    }

    /// Check if the latch is open
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Block until the latch opens
    pub fn await_uninterruptibly(&self) {
        let mut state = self.state.lock();
        while !state.open {
            self.cond.wait(&mut state);
        }
    }

    /// Block until the latch opens or the waiter is interrupted
    ///
    /// Returns at once if an interrupt is already pending, and consumes it.
    /// An open latch wins over a pending interrupt, which then stays pending.
    pub fn await_interruptibly(&self) -> Result<()> {
        let mut state = self.state.lock();
        while !state.open {
            if state.interrupt_pending {
                state.interrupt_pending = false;
                return Err(StmError::Interrupted);
            }
            self.cond.wait(&mut state);
        }
        Ok(())
    }

    /// Block until the latch opens or `timeout` elapses
    ///
    /// Returns whether the latch is open.
    pub fn await_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.open {
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return state.open;
            }
        }
        true
    }

    /// Cut short the next interruptible wait with [`StmError::Interrupted`]
    ///
    /// The interrupt is consumed by exactly one interruptible wait, the one
    /// already parked or the next to start. Repeated interrupts before that
    /// collapse into one. Does not open the latch; uninterruptible and timed
    /// waiters keep waiting.
    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        state.interrupt_pending = true;
        self.cond.notify_all();
    }
}
