//! Blocking Retry Tests
//!
//! Bodies that return `retry()` park until another transaction commits to
//! something they read, and wake without losing the signal.

use crate::*;
use mvstm::prelude::*;
use mvstm::Latch;
use std::thread;
use std::time::Duration;

// =============================================================================
// WAKEUPS
// =============================================================================

#[test]
fn test_pop_blocks_until_push() {
    let stm = create_stm();
    let stack = stm.atomically(|txn| Stack::<u32>::new(txn)).unwrap();

    let consumer = {
        let stm = stm.clone();
        thread::spawn(move || stm.atomically(|txn| stack.pop(txn)).unwrap())
    };

    wait_until(|| stm.stats().blocked >= 1);
    stm.atomically(|txn| stack.push(txn, 42)).unwrap();

    assert_eq!(consumer.join().unwrap(), 42);
    assert!(stm.atomically(|txn| stack.is_empty(txn)).unwrap());
}

#[test]
fn test_guard_waits_for_condition() {
    let stm = create_stm();
    let counter = stm.atomically(|txn| TRef::new(txn, 0u32)).unwrap();

    let waiter = {
        let stm = stm.clone();
        thread::spawn(move || {
            stm.atomically(|txn| {
                let value = counter.get(txn)?;
                guard(value >= 3)?;
                Ok(value)
            })
            .unwrap()
        })
    };

    for _ in 0..3 {
        stm.atomically(|txn| counter.modify(txn, |v| *v += 1)).unwrap();
    }
    assert_eq!(waiter.join().unwrap(), 3);
}

#[test]
fn test_every_waiter_woken() {
    let stm = create_stm();
    let stack = stm.atomically(|txn| Stack::<usize>::new(txn)).unwrap();

    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let stm = stm.clone();
            thread::spawn(move || stm.atomically(|txn| stack.pop(txn)).unwrap())
        })
        .collect();

    wait_until(|| stm.stats().blocked >= 3);
    stm.atomically(|txn| {
        for i in 0..3 {
            stack.push(txn, i)?;
        }
        Ok(())
    })
    .unwrap();

    let mut got: Vec<usize> = consumers.into_iter().map(|c| c.join().unwrap()).collect();
    got.sort_unstable();
    assert_eq!(got, vec![0, 1, 2]);
}

#[test]
fn test_blocking_does_not_use_retry_budget() {
    let stm = strict_builder().max_retries(0).build().unwrap();
    let flag = stm.atomically(|txn| TRef::new(txn, false)).unwrap();

    let waiter = {
        let stm = stm.clone();
        thread::spawn(move || {
            stm.atomically(|txn| {
                let set = flag.get(txn)?;
                guard(set)
            })
        })
    };

    wait_until(|| stm.stats().blocked >= 1);
    stm.atomically(|txn| flag.set(txn, true)).unwrap();

    assert_eq!(waiter.join().unwrap(), Ok(()));
}

#[test]
fn test_commit_between_read_and_park_is_not_lost() {
    let stm = create_stm();
    let cell = stm.atomically(|txn| TRef::new(txn, 0u8)).unwrap();

    let mut txn = stm.begin();
    assert_eq!(cell.get(&mut txn).unwrap(), 0);
    txn.abort().unwrap();

    // The change lands before the listener is registered
    stm.atomically(|t| cell.set(t, 1)).unwrap();

    let latch = Arc::new(Latch::new());
    stm.manager().register_retry(&txn, &latch).unwrap();
    assert!(latch.is_open());
}

#[test]
fn test_registered_latch_opens_on_commit() {
    let stm = create_stm();
    let (watched, other) = stm
        .atomically(|txn| Ok((TRef::new(txn, 0u8)?, TRef::new(txn, 0u8)?)))
        .unwrap();

    let mut txn = stm.begin();
    watched.get(&mut txn).unwrap();
    txn.abort().unwrap();

    let latch = Arc::new(Latch::new());
    stm.manager().register_retry(&txn, &latch).unwrap();
    assert!(!latch.is_open());

    stm.atomically(|t| other.set(t, 1)).unwrap();
    assert!(!latch.await_timeout(Duration::from_millis(20)));

    stm.atomically(|t| watched.set(t, 1)).unwrap();
    assert!(latch.await_timeout(Duration::from_secs(5)));
}

// =============================================================================
// FAILURES
// =============================================================================

#[test]
fn test_retry_without_reads_is_no_progress() {
    let stm = create_stm();
    let err = stm.atomically(|_| retry::<()>()).unwrap_err();
    assert_eq!(err, StmError::NoProgressPossible);
    assert!(err.is_liveness_failure());
}

#[test]
fn test_retry_with_only_fresh_objects_is_no_progress() {
    let stm = create_stm();
    let err = stm
        .atomically(|txn| {
            let stack = Stack::<u8>::new(txn)?;
            stack.pop(txn)
        })
        .unwrap_err();
    assert_eq!(err, StmError::NoProgressPossible);
}

#[test]
fn test_nested_atomically_rejected() {
    let stm = create_stm();
    let inner = stm
        .atomically(|_| Ok(stm.atomically(|_| Ok(())).unwrap_err()))
        .unwrap();
    assert_eq!(inner, StmError::NestedTransaction);

    // The outer block released the thread
    assert!(stm.atomically(|_| Ok(1)).is_ok());
}

#[test]
fn test_interrupted_wait_reports_interrupt() {
    let latch = Arc::new(Latch::new());
    let waiter = {
        let latch = Arc::clone(&latch);
        thread::spawn(move || latch.await_interruptibly())
    };

    // One interrupt suffices whether or not the waiter has parked yet
    latch.interrupt();
    assert_eq!(waiter.join().unwrap(), Err(StmError::Interrupted));
    assert!(!latch.is_open());
}

#[test]
fn test_interrupt_issued_before_wait_is_not_lost() {
    let latch = Arc::new(Latch::new());
    latch.interrupt();

    let waiter = {
        let latch = Arc::clone(&latch);
        thread::spawn(move || latch.await_interruptibly())
    };
    assert_eq!(waiter.join().unwrap(), Err(StmError::Interrupted));
    assert!(!latch.is_open());
}
