//! End-to-end scenarios that drive the public API from the outside.

#![allow(missing_docs, reason = "No need for API documentation in test code")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use simple_sync::{Broadcaster, Error, WorkerPool};
use testing::with_watchdog;

#[test]
fn pool_of_four_counts_to_four_then_shuts_down() {
    with_watchdog(|| {
        let pool = WorkerPool::new(4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        pool.execute({
            let counter = Arc::clone(&counter);
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 4);

        pool.delete();

        // The workers are gone, so a further poke cannot reach them.
        let result = pool.execute({
            let counter = Arc::clone(&counter);
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert!(matches!(result, Err(Error::PoolClosed)));
        assert_eq!(counter.load(Ordering::SeqCst), 4);

        // Only our own reference remains; every worker dropped the tasks it ran.
        assert_eq!(Arc::strong_count(&counter), 1);
    });
}

#[test]
fn many_rounds_on_one_pool() {
    with_watchdog(|| {
        const WORKERS: usize = 3;
        const ROUNDS: usize = 200;

        let pool = WorkerPool::new(WORKERS).unwrap();
        let per_worker = (0..WORKERS)
            .map(|_| AtomicUsize::new(0))
            .collect::<Vec<_>>();

        for _ in 0..ROUNDS {
            pool.execute(|index| {
                per_worker[index].fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        }

        for count in &per_worker {
            assert_eq!(count.load(Ordering::Relaxed), ROUNDS);
        }
    });
}

#[test]
fn broadcaster_serves_persistent_receivers_for_many_rounds() {
    with_watchdog(|| {
        const RECEIVERS: usize = 4;
        const ROUNDS: usize = 50;

        let broadcaster = Arc::new(Broadcaster::new(RECEIVERS).unwrap());
        let acknowledged = Arc::new(AtomicUsize::new(0));

        let receivers = (0..RECEIVERS)
            .map(|_| {
                let broadcaster = Arc::clone(&broadcaster);
                let acknowledged = Arc::clone(&acknowledged);

                thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        broadcaster.receive();
                        acknowledged.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect::<Vec<_>>();

        // A receiver that comes back quickly may acknowledge the same round twice, taking the
        // slot of a slower one, so only totals are checked here.
        for _ in 0..ROUNDS {
            assert_eq!(broadcaster.send(), RECEIVERS);
        }

        for receiver in receivers {
            receiver.join().unwrap();
        }

        assert_eq!(acknowledged.load(Ordering::SeqCst), RECEIVERS * ROUNDS);
        assert_eq!(broadcaster.completed_rounds(), u64::try_from(ROUNDS).unwrap());
        assert!(!broadcaster.is_round_in_flight());
    });
}

#[test]
fn pool_can_be_shared_between_callers() {
    with_watchdog(|| {
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let callers = (0..3)
            .map(|caller| {
                let pool = Arc::clone(&pool);
                let seen = Arc::clone(&seen);

                thread::spawn(move || {
                    pool.execute(|index| seen.lock().unwrap().push((caller, index))).unwrap();
                })
            })
            .collect::<Vec<_>>();

        for caller in callers {
            caller.join().unwrap();
        }

        let mut seen = Arc::try_unwrap(seen).unwrap().into_inner().unwrap();
        seen.sort_unstable();

        let expected = (0..3)
            .flat_map(|caller| (0..2).map(move |index| (caller, index)))
            .collect::<Vec<_>>();

        assert_eq!(seen, expected);
    });
}

#[test]
fn slow_receiver_still_takes_part_in_final_round() {
    with_watchdog(|| {
        const RECEIVERS: usize = 2;
        const ROUNDS: usize = 3;

        let broadcaster = Arc::new(Broadcaster::new(RECEIVERS).unwrap());

        // Each receiver knows how many rounds it takes part in, so one that lags behind after
        // acknowledging cannot leave the last send without enough receivers.
        let receivers = (0..RECEIVERS)
            .map(|receiver_index| {
                let broadcaster = Arc::clone(&broadcaster);

                thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        broadcaster.receive();

                        if receiver_index == 0 {
                            thread::sleep(Duration::from_millis(50));
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        for _ in 0..ROUNDS {
            assert_eq!(broadcaster.send(), RECEIVERS);
        }

        for receiver in receivers {
            receiver.join().unwrap();
        }

        assert_eq!(broadcaster.completed_rounds(), u64::try_from(ROUNDS).unwrap());
    });
}
