//! Compares the cost of a fan-out/fan-in round on a persistent `WorkerPool` with spawning
//! scoped threads for every round, and measures a bare `Broadcaster` round.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use criterion::{Criterion, criterion_group, criterion_main};
use simple_sync::{Broadcaster, WorkerPool};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

const WORKERS: usize = 4;

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("simple_sync_round");

    let pool = WorkerPool::new(WORKERS).unwrap();

    group.bench_function("worker_pool_execute", |b| {
        b.iter(|| {
            pool.execute(|index| {
                black_box(index);
            })
            .unwrap();
        });
    });

    group.bench_function("scoped_threads_spawn", |b| {
        b.iter(|| {
            thread::scope(|s| {
                for index in 0..WORKERS {
                    s.spawn(move || black_box(index));
                }
            });
        });
    });

    let broadcaster = Arc::new(Broadcaster::new(WORKERS).unwrap());

    group.bench_function("broadcaster_send", |b| {
        b.iter_custom(|iters| {
            // Receivers cannot be told apart, so each one is given the exact number of rounds
            // it takes part in instead of being asked to stop.
            let receivers = (0..WORKERS)
                .map(|_| {
                    let broadcaster = Arc::clone(&broadcaster);

                    thread::spawn(move || {
                        for _ in 0..iters {
                            broadcaster.receive();
                        }
                    })
                })
                .collect::<Vec<_>>();

            let started = Instant::now();

            for _ in 0..iters {
                black_box(broadcaster.send());
            }

            let elapsed = started.elapsed();

            for receiver in receivers {
                receiver.join().unwrap();
            }

            elapsed
        });
    });

    group.finish();
}
