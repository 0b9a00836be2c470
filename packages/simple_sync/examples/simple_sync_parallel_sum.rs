//! Splits a sum over a persistent worker pool, many times over, and shows that the pool can be
//! shut down explicitly.

use std::sync::atomic::{AtomicU64, Ordering};

use simple_sync::{Error, WorkerPool};

const WORKERS: usize = 4;

fn main() {
    let pool = WorkerPool::new(WORKERS).expect("worker count is non-zero");

    let data = (1..=10_000_u64).collect::<Vec<_>>();

    for round in 1..=3_u64 {
        let total = AtomicU64::new(0);

        pool.execute(|worker_index| {
            let partial: u64 = data
                .iter()
                .skip(worker_index)
                .step_by(WORKERS)
                .map(|value| value * round)
                .sum();

            total.fetch_add(partial, Ordering::Relaxed);
        })
        .expect("pool is still open");

        println!("Round {round}: total = {}", total.load(Ordering::Relaxed));
    }

    pool.delete();

    match pool.execute(|_| {}) {
        Err(Error::PoolClosed) => println!("Pool is closed, as expected."),
        other => println!("Unexpected result after delete: {other:?}"),
    }
}
