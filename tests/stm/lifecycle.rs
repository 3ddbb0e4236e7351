//! Lifecycle Tests
//!
//! Commit and abort transitions, misuse of finished transactions, and the
//! engine counters.

use crate::*;
use mvstm::prelude::*;
use mvstm::Handle;
use mvstm_core::TransactionStatus;

// =============================================================================
// COMMIT / ABORT
// =============================================================================

#[test]
fn test_commit_twice_returns_same_outcome() {
    let stm = create_stm();
    let mut txn = stm.begin();
    let cell = TRef::new(&mut txn, 1u8).unwrap();

    let first = txn.commit().unwrap();
    let second = txn.commit().unwrap();
    assert_eq!(first, second);
    assert!(!first.is_read_only());
    assert_eq!(txn.status(), TransactionStatus::Committed);

    assert_eq!(stm.atomically(|t| cell.get(t)).unwrap(), 1);
}

#[test]
fn test_abort_twice_is_noop() {
    let stm = create_stm();
    let mut txn = stm.begin();
    txn.abort().unwrap();
    txn.abort().unwrap();
    assert_eq!(txn.status(), TransactionStatus::Aborted);
}

#[test]
fn test_commit_after_abort_is_misuse() {
    let stm = create_stm();
    let mut txn = stm.begin();
    txn.abort().unwrap();

    let err = txn.commit().unwrap_err();
    assert!(err.is_misuse());
    assert_eq!(
        err,
        StmError::NotActive {
            status: TransactionStatus::Aborted
        }
    );
}

#[test]
fn test_abort_after_commit_is_misuse() {
    let stm = create_stm();
    let mut txn = stm.begin();
    txn.commit().unwrap();
    assert!(txn.abort().unwrap_err().is_misuse());
}

#[test]
fn test_finished_transaction_rejects_access() {
    let stm = create_stm();
    let cell = stm.atomically(|txn| TRef::new(txn, 0u16)).unwrap();

    let mut txn = stm.begin();
    txn.commit().unwrap();
    assert!(cell.get(&mut txn).unwrap_err().is_misuse());
    assert!(cell.set(&mut txn, 1).unwrap_err().is_misuse());
}

#[test]
fn test_abort_discards_writes_and_keeps_heap() {
    let stm = create_stm();
    let cell = stm.atomically(|txn| TRef::new(txn, 10i32)).unwrap();
    let version = stm.version();

    let mut txn = stm.begin();
    cell.set(&mut txn, 99).unwrap();
    txn.abort().unwrap();

    assert_eq!(stm.version(), version);
    assert_eq!(stm.atomically(|t| cell.get(t)).unwrap(), 10);
}

#[test]
fn test_dropped_transaction_is_aborted() {
    let stm = create_stm();
    let cell = stm.atomically(|txn| TRef::new(txn, 'a')).unwrap();
    let before = stm.stats();

    {
        let mut txn = stm.begin();
        cell.set(&mut txn, 'b').unwrap();
    }

    let after = stm.stats();
    assert_eq!(after.aborted, before.aborted + 1);
    assert_eq!(after.active(), 0);
    assert_eq!(stm.atomically(|t| cell.get(t)).unwrap(), 'a');
}

// =============================================================================
// HANDLES
// =============================================================================

#[test]
fn test_null_handle_rejected() {
    let stm = create_stm();
    let mut txn = stm.begin();
    let err = TRef::<u8>::from_handle(Handle::NULL)
        .get(&mut txn)
        .unwrap_err();
    assert_eq!(err, StmError::NullHandle);
}

#[test]
fn test_unknown_handle_not_found() {
    let stm = create_stm();
    let err = stm
        .atomically(|txn| TRef::<u8>::from_handle(Handle::from_raw(4242)).get(txn))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_wrong_type_is_type_mismatch() {
    let stm = create_stm();
    let cell = stm.atomically(|txn| TRef::new(txn, 1u32)).unwrap();
    let err = stm
        .atomically(|txn| TRef::<String>::from_handle(cell.handle()).get(txn))
        .unwrap_err();
    assert!(matches!(err, StmError::TypeMismatch { .. }));
}

// =============================================================================
// STATS / CONFIG
// =============================================================================

#[test]
fn test_stats_track_outcomes() {
    let stm = create_stm();
    let cell = stm.atomically(|txn| TRef::new(txn, 0u8)).unwrap();

    stm.atomically(|txn| cell.get(txn)).unwrap();
    let mut t1 = stm.begin();
    let mut t2 = stm.begin();
    cell.set(&mut t1, 1).unwrap();
    cell.set(&mut t2, 2).unwrap();
    t1.commit().unwrap();
    assert!(t2.commit().is_err());

    let stats = stm.stats();
    assert_eq!(stats.started, 4);
    assert_eq!(stats.committed, 3);
    assert_eq!(stats.aborted, 1);
    assert_eq!(stats.conflicts, 1);
    assert_eq!(stats.active(), 0);
    assert!(stats.commit_rate() > 0.7);
}

#[test]
fn test_engine_from_toml_config() {
    init_tracing();
    let config = StmConfig::from_toml(
        r#"
        dawn = 500
        history_depth = 2
        max_retries = 3

        [lock_policy]
        kind = "no_spin"
        "#,
    )
    .unwrap();
    let stm = Stm::from_config(config).unwrap();

    assert_eq!(stm.version(), 500);
    assert_eq!(stm.config().max_retries, 3);
    let cell = stm.atomically(|txn| TRef::new(txn, 1u8)).unwrap();
    assert_eq!(stm.version(), 501);
    assert_eq!(stm.atomically(|txn| cell.get(txn)).unwrap(), 1);
}

#[test]
fn test_invalid_config_rejected() {
    init_tracing();
    let err = Stm::builder().history_depth(0).build().unwrap_err();
    assert!(matches!(err, StmError::InvalidConfig(_)));
}
