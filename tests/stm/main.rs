//! STM Integration Test Suite
//!
//! Multi-threaded tests of the public API: isolation, conflict detection,
//! transaction lifecycle, blocking retry, and the collection scenarios.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run the whole suite
//! cargo test --test stm
//!
//! # Run blocking retry tests only
//! cargo test --test stm blocking::
//! ```

use mvstm::{LockPolicy, Stm, StmBuilder};
use std::sync::Arc;
use std::time::Duration;

// Test modules
pub mod blocking;
pub mod isolation;
pub mod lifecycle;
pub mod stress;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Install a tracing subscriber writing to the test output
///
/// Safe to call from every test; only the first call installs it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Engine with default settings
pub fn create_stm() -> Stm {
    init_tracing();
    Stm::new()
}

/// Builder preset for tests that want failures reported immediately
pub fn strict_builder() -> StmBuilder {
    init_tracing();
    Stm::builder()
        .lock_policy(LockPolicy::NoSpin)
        .backoff(Duration::from_micros(1), Duration::from_micros(100))
}

/// Poll `condition` until it holds, panicking after a generous timeout
pub fn wait_until(condition: impl Fn() -> bool) {
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(
            std::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Run `f` on `threads` threads released together by a barrier
pub fn run_concurrent<F>(threads: usize, f: F)
where
    F: Fn(usize) + Send + Sync + 'static,
{
    let barrier = Arc::new(std::sync::Barrier::new(threads));
    let f = Arc::new(f);
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            let f = Arc::clone(&f);
            std::thread::spawn(move || {
                barrier.wait();
                f(i)
            })
        })
        .collect();
    for h in handles {
        h.join().expect("worker panicked");
    }
}
