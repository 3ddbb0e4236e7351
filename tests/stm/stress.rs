//! Stress Tests
//!
//! Many threads hammering few objects. Conflicts are expected; lost updates
//! and broken invariants are not.

use crate::*;
use mvstm::prelude::*;
use mvstm::ContentionPolicy;
use rand::Rng;

const THREADS: usize = 8;

#[test]
fn test_concurrent_counter_no_lost_updates() {
    let stm = create_stm();
    let counter = stm.atomically(|txn| TRef::new(txn, 0u64)).unwrap();
    const PER_THREAD: u64 = 250;

    {
        let stm = stm.clone();
        run_concurrent(THREADS, move |_| {
            for _ in 0..PER_THREAD {
                stm.atomically(|txn| counter.modify(txn, |v| *v += 1))
                    .unwrap();
            }
        });
    }

    let total = stm.atomically(|txn| counter.get(txn)).unwrap();
    assert_eq!(total, THREADS as u64 * PER_THREAD);

    let stats = stm.stats();
    assert!(stats.committed >= THREADS as u64 * PER_THREAD);
    assert_eq!(stats.too_many_retries, 0);
}

#[test]
fn test_transfers_preserve_total() {
    let stm = create_stm();
    const ACCOUNTS: usize = 5;
    const INITIAL: i64 = 1_000;

    let accounts: Vec<TRef<i64>> = stm
        .atomically(|txn| {
            (0..ACCOUNTS)
                .map(|_| TRef::new(txn, INITIAL))
                .collect::<Result<Vec<_>>>()
        })
        .unwrap();

    {
        let stm = stm.clone();
        let accounts = accounts.clone();
        run_concurrent(THREADS, move |_| {
            let mut rng = rand::thread_rng();
            for _ in 0..200 {
                let from = rng.gen_range(0..ACCOUNTS);
                let to = rng.gen_range(0..ACCOUNTS);
                let amount = rng.gen_range(1..=50);
                stm.atomically(|txn| {
                    accounts[from].modify(txn, |b| *b -= amount)?;
                    accounts[to].modify(txn, |b| *b += amount)
                })
                .unwrap();
            }
        });
    }

    // Concurrent auditors would see the same total at every snapshot
    let total: i64 = stm
        .atomically(|txn| accounts.iter().map(|a| a.get(txn)).sum())
        .unwrap();
    assert_eq!(total, ACCOUNTS as i64 * INITIAL);
}

#[test]
fn test_auditor_sees_constant_total_under_load() {
    let stm = create_stm();
    let accounts: Vec<TRef<i64>> = stm
        .atomically(|txn| (0..4).map(|_| TRef::new(txn, 100)).collect())
        .unwrap();

    let auditor = {
        let stm = stm.clone();
        let accounts = accounts.clone();
        std::thread::spawn(move || {
            for _ in 0..300 {
                let total: i64 = stm
                    .atomically(|txn| accounts.iter().map(|a| a.get(txn)).sum())
                    .unwrap();
                assert_eq!(total, 400);
            }
        })
    };

    {
        let stm = stm.clone();
        run_concurrent(4, move |i| {
            for n in 0..200 {
                let from = (i + n) % 4;
                let to = (i + n + 1) % 4;
                stm.atomically(|txn| {
                    accounts[from].modify(txn, |b| *b -= 1)?;
                    accounts[to].modify(txn, |b| *b += 1)
                })
                .unwrap();
            }
        });
    }
    auditor.join().unwrap();
}

#[test]
fn test_every_contention_policy_makes_progress() {
    init_tracing();
    for policy in [
        ContentionPolicy::Aggressive,
        ContentionPolicy::Timestamp,
        ContentionPolicy::default(),
    ] {
        let stm = Stm::builder().contention(policy).build().unwrap();
        let counter = stm.atomically(|txn| TRef::new(txn, 0u32)).unwrap();

        {
            let stm = stm.clone();
            run_concurrent(4, move |_| {
                for _ in 0..100 {
                    stm.atomically(|txn| counter.modify(txn, |v| *v += 1))
                        .unwrap();
                }
            });
        }

        assert_eq!(
            stm.atomically(|txn| counter.get(txn)).unwrap(),
            400,
            "policy {:?}",
            policy
        );
    }
}

#[test]
fn test_stack_handoff_between_threads() {
    let stm = create_stm();
    let stack = stm.atomically(|txn| Stack::<usize>::new(txn)).unwrap();
    const PER_PRODUCER: usize = 100;

    let consumers: Vec<_> = (0..2)
        .map(|_| {
            let stm = stm.clone();
            std::thread::spawn(move || {
                (0..PER_PRODUCER)
                    .map(|_| stm.atomically(|txn| stack.pop(txn)).unwrap())
                    .sum::<usize>()
            })
        })
        .collect();

    {
        let stm = stm.clone();
        run_concurrent(2, move |p| {
            for i in 0..PER_PRODUCER {
                stm.atomically(|txn| stack.push(txn, p * PER_PRODUCER + i))
                    .unwrap();
            }
        });
    }

    let consumed: usize = consumers.into_iter().map(|c| c.join().unwrap()).sum();
    let n = 2 * PER_PRODUCER;
    assert_eq!(consumed, n * (n - 1) / 2);
    assert!(stm.atomically(|txn| stack.is_empty(txn)).unwrap());
}
