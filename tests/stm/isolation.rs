//! Isolation Tests
//!
//! Snapshot reads, consistent cuts, monotonic visibility, and readers that
//! never wait for writers.

use crate::*;
use mvstm::{CommitOutcome, TRef};
use mvstm_core::TxnId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

// =============================================================================
// SNAPSHOT ISOLATION
// =============================================================================

#[test]
fn test_uncommitted_writes_invisible() {
    let stm = create_stm();
    let cell = stm.atomically(|txn| TRef::new(txn, 1i32)).unwrap();

    let mut writer = stm.begin();
    cell.set(&mut writer, 2).unwrap();

    let mut reader = stm.begin();
    assert_eq!(cell.get(&mut reader).unwrap(), 1);

    writer.commit().unwrap();
    // Still the reader's snapshot
    assert_eq!(cell.get(&mut reader).unwrap(), 1);

    let mut later = stm.begin();
    assert_eq!(cell.get(&mut later).unwrap(), 2);
}

#[test]
fn test_started_transaction_sees_every_earlier_commit() {
    let stm = create_stm();
    let cell = stm.atomically(|txn| TRef::new(txn, 0u64)).unwrap();

    for expected in 1..=20u64 {
        stm.atomically(|txn| cell.set(txn, expected)).unwrap();
        let mut txn = stm.begin();
        assert!(txn.start_version() >= stm.version());
        assert_eq!(cell.get(&mut txn).unwrap(), expected);
    }
}

#[test]
fn test_object_created_after_start_is_invisible() {
    let stm = create_stm();
    let mut early = stm.begin();

    let cell = stm.atomically(|txn| TRef::new(txn, 'x')).unwrap();

    let err = cell.get(&mut early).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_handle_from_other_engine_is_unknown() {
    let a = create_stm();
    let b = create_stm();
    let in_a = a.atomically(|txn| TRef::new(txn, "engine A")).unwrap();
    let in_b = b.atomically(|txn| TRef::new(txn, "engine B")).unwrap();

    assert_ne!(in_a.handle(), in_b.handle());
    let err = b.atomically(|txn| in_a.get(txn)).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(b.atomically(|txn| in_b.get(txn)).unwrap(), "engine B");
    assert_eq!(a.atomically(|txn| in_a.get(txn)).unwrap(), "engine A");
}

// =============================================================================
// CONSISTENT CUT
// =============================================================================

#[test]
fn test_reader_never_sees_half_a_commit() {
    let stm = create_stm();
    let (a, b) = stm
        .atomically(|txn| Ok((TRef::new(txn, 0i64)?, TRef::new(txn, 0i64)?)))
        .unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let stm = stm.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for i in 1..=500i64 {
                stm.atomically(|txn| {
                    a.set(txn, i)?;
                    b.set(txn, -i)
                })
                .unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let stm = stm.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut checks = 0;
                while !done.load(Ordering::SeqCst) || checks == 0 {
                    let (x, y) = stm
                        .atomically(|txn| Ok((a.get(txn)?, b.get(txn)?)))
                        .unwrap();
                    assert_eq!(x, -y, "observed a torn commit");
                    checks += 1;
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
}

// =============================================================================
// WRITERS DO NOT BLOCK READERS
// =============================================================================

#[test]
fn test_read_while_commit_lock_held() {
    let stm = create_stm();
    let cell = stm.atomically(|txn| TRef::new(txn, 7u8)).unwrap();

    // Hold the commit lock as an in-flight committer would
    let slot = stm.manager().heap().slot(cell.handle()).unwrap();
    let holder = TxnId::from_raw(u64::MAX);
    assert!(slot.try_lock(holder));

    let value = {
        let stm = stm.clone();
        thread::spawn(move || stm.atomically(|txn| cell.get(txn)).unwrap())
            .join()
            .unwrap()
    };
    assert_eq!(value, 7);
    assert!(slot.unlock(holder));
}

// =============================================================================
// CLOCK
// =============================================================================

#[test]
fn test_clock_strictly_increasing_across_threads() {
    let stm = create_stm();
    let cells: Vec<TRef<u32>> = (0..4)
        .map(|_| stm.atomically(|txn| TRef::new(txn, 0u32)).unwrap())
        .collect();
    let versions = Arc::new(parking_lot::Mutex::new(Vec::new()));

    {
        let stm = stm.clone();
        let versions = Arc::clone(&versions);
        run_concurrent(4, move |i| {
            for _ in 0..50 {
                let mut txn = stm.begin();
                cells[i].modify(&mut txn, |v| *v += 1).unwrap();
                if let CommitOutcome::Updated { version, .. } = txn.commit().unwrap() {
                    versions.lock().push(version);
                }
            }
        });
    }

    let mut seen = versions.lock().clone();
    let count = seen.len();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), count, "two commits shared a version");
    assert_eq!(count, 200);
}

#[test]
fn test_read_only_commits_do_not_tick() {
    let stm = create_stm();
    let cell = stm.atomically(|txn| TRef::new(txn, 0u8)).unwrap();
    let before = stm.version();

    for _ in 0..10 {
        stm.atomically(|txn| cell.get(txn)).unwrap();
    }
    assert_eq!(stm.version(), before);
}
