use std::fmt;
use std::mem;
use std::num::NonZero;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use arc_swap::ArcSwap;
use tracing::{debug, trace};

use crate::constants::ERR_POISONED_LOCK;
use crate::{Broadcaster, Error, Result, WorkerPoolBuilder};

/// A fixed set of persistent worker threads that each run the same function once per round.
///
/// Every call to [`execute()`][Self::execute] wakes all workers, invokes the function once on
/// every worker with that worker's index, and returns only after every invocation has finished.
/// The workers are spawned once at construction and reused for every round, so there is no
/// thread creation cost per call.
///
/// Worker indices run from `0` to `worker_count - 1` and a given index is always served by the
/// same thread for the lifetime of the pool.
///
/// Rounds never overlap: concurrent calls to `execute()` from different threads are serialized.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use simple_sync::WorkerPool;
///
/// let pool = WorkerPool::new(4).unwrap();
/// let counter = AtomicUsize::new(0);
///
/// pool.execute(|_worker_index| {
///     counter.fetch_add(1, Ordering::Relaxed);
/// })
/// .unwrap();
///
/// assert_eq!(counter.load(Ordering::Relaxed), 4);
///
/// pool.delete();
/// ```
///
/// # Lifecycle
///
/// [`delete()`][Self::delete] retires all workers and waits for their threads to exit. Dropping
/// the pool does the same. After deletion, `execute()` fails with [`Error::PoolClosed`].
///
/// A function that panics on a worker is not caught. The panicking worker never acknowledges the
/// round, so the `execute()` call that dispatched it never returns.
#[derive(Debug)]
pub struct WorkerPool {
    shared: Arc<Shared>,

    // Held for the duration of every round, which is what serializes rounds.
    lifecycle: Mutex<Lifecycle>,

    // Mirrors `Lifecycle::Stopped` so it can be read without waiting for an in-flight round.
    closed: AtomicBool,

    worker_count: NonZero<usize>,
}

#[derive(Debug)]
struct Shared {
    // Opens a round: every worker receives once per round.
    start: Broadcaster,

    // Closes a round: every worker receives once its invocation has finished.
    done: Broadcaster,

    // Published before `start` is sent; the broadcaster's lock makes it visible to the workers.
    signal: ArcSwap<RoundSignal>,
}

#[derive(Debug)]
enum Lifecycle {
    Running { workers: Vec<JoinHandle<()>> },
    Stopped,
}

type Task = Arc<dyn Fn(usize) + Send + Sync>;

enum RoundSignal {
    /// Between rounds. Never observed by a released worker.
    Idle,

    /// Invoke the task with the worker index, then wait for the next round.
    Run(Task),

    /// Acknowledge the round, then exit.
    Stop,
}

impl fmt::Debug for RoundSignal {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Run(_) => write!(f, "Run(..)"),
            Self::Stop => write!(f, "Stop"),
        }
    }
}

impl WorkerPool {
    /// Creates a pool with `worker_count` workers, returning once all of them are ready.
    ///
    /// Returns [`None`] if `worker_count` is zero.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to start a worker thread.
    #[must_use]
    pub fn new(worker_count: usize) -> Option<Self> {
        NonZero::new(worker_count).map(|worker_count| {
            Self::builder().worker_count(worker_count).build()
        })
    }

    /// Starts building a pool with custom configuration.
    pub fn builder() -> WorkerPoolBuilder {
        WorkerPoolBuilder::new()
    }

    pub(crate) fn spawn(
        worker_count: NonZero<usize>,
        mut thread_builder: impl FnMut(usize) -> thread::Builder,
    ) -> Self {
        let shared = Arc::new(Shared {
            start: Broadcaster::with_capacity(worker_count),
            done: Broadcaster::with_capacity(worker_count),
            signal: ArcSwap::from_pointee(RoundSignal::Idle),
        });

        let workers = (0..worker_count.get())
            .map(|index| {
                let shared = Arc::clone(&shared);

                thread_builder(index)
                    .spawn(move || worker_entrypoint(index, &shared))
                    .expect("failed to spawn worker thread - the pool cannot operate without all its workers")
            })
            .collect();

        let pool = Self {
            shared,
            lifecycle: Mutex::new(Lifecycle::Running { workers }),
            closed: AtomicBool::new(false),
            worker_count,
        };

        // Warm-up round. Once it completes, every worker has started and is parked on `start`.
        pool.run_round(RoundSignal::Run(Arc::new(|_: usize| {})));

        debug!(worker_count = worker_count.get(), "worker pool started");

        pool
    }

    /// The number of workers in the pool.
    #[must_use]
    pub fn worker_count(&self) -> NonZero<usize> {
        self.worker_count
    }

    /// Whether [`delete()`][Self::delete] has been called on this pool.
    ///
    /// This does not wait for an in-flight round, so it may be called from inside a task running
    /// on the same pool. While `delete()` is still retiring the workers, this already returns
    /// `true`.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Invokes `f` once on every worker, passing the worker index, and returns once all
    /// invocations have finished.
    ///
    /// The invocations run concurrently with each other. If another thread is already executing a
    /// round on this pool, this call waits for that round to complete before starting its own.
    ///
    /// Because this call does not return before every invocation has finished, `f` may borrow
    /// from the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolClosed`] if the pool has been deleted.
    pub fn execute<'f, F>(&self, f: F) -> Result<()>
    where
        F: Fn(usize) + Send + Sync + 'f,
    {
        let lifecycle = self.lifecycle.lock().expect(ERR_POISONED_LOCK);

        if matches!(*lifecycle, Lifecycle::Stopped) {
            return Err(Error::PoolClosed);
        }

        let task: Arc<dyn Fn(usize) + Send + Sync + 'f> = Arc::new(f);

        // SAFETY: The workers only ever see the task between the `start` and `done` rounds
        // driven by `run_round()`. Each worker drops its clone before acknowledging `done` and
        // `run_round()` drops the published one before returning, so no reference to the task
        // survives this call and anything it borrows for 'f is still borrowed.
        let task =
            unsafe { mem::transmute::<Arc<dyn Fn(usize) + Send + Sync + 'f>, Task>(task) };

        self.run_round(RoundSignal::Run(task));

        drop(lifecycle);
        Ok(())
    }

    /// Retires all workers and waits for their threads to exit.
    ///
    /// Calling this again after the pool has been deleted does nothing.
    ///
    /// # Panics
    ///
    /// Panics if a worker thread terminated by panicking.
    #[cfg_attr(test, mutants::skip)] // Impractical to test that stuff stops happening.
    pub fn delete(&self) {
        let mut lifecycle = self.lifecycle.lock().expect(ERR_POISONED_LOCK);

        let Lifecycle::Running { workers } = mem::replace(&mut *lifecycle, Lifecycle::Stopped)
        else {
            return;
        };

        self.closed.store(true, Ordering::Release);

        self.run_round(RoundSignal::Stop);

        for worker in workers {
            worker
                .join()
                .expect("worker thread panicked - the pool was not usable anyway");
        }

        debug!(worker_count = self.worker_count.get(), "worker pool stopped");
    }

    // Caller must hold the lifecycle lock, except during construction when nobody else can
    // see the pool yet.
    fn run_round(&self, signal: RoundSignal) {
        self.shared.signal.store(Arc::new(signal));

        let epoch = self.shared.start.completed_rounds();
        trace!(epoch, "dispatching round to workers");

        self.shared.start.send();
        self.shared.done.send();

        // Releases the task so nothing it borrows outlives the round.
        self.shared.signal.store(Arc::new(RoundSignal::Idle));

        trace!(epoch, "all workers finished round");
    }
}

impl Drop for WorkerPool {
    #[cfg_attr(test, mutants::skip)] // Impractical to test that stuff stops happening.
    fn drop(&mut self) {
        if thread::panicking() {
            // If the thread is panicking, we are probably in a dirty state and shutting down
            // may make the problem worse by hiding the original panic, so just do nothing.
            return;
        }

        self.delete();
    }
}

#[cfg_attr(test, mutants::skip)] // Mutations here mostly just hang the pool.
fn worker_entrypoint(index: usize, shared: &Shared) {
    loop {
        shared.start.receive();

        let keep_running = run_signal(index, shared);

        shared.done.receive();

        if !keep_running {
            break;
        }
    }
}

// Returns whether the worker should wait for another round. The signal is dropped before
// returning, which the scoped lifetime of tasks relies on.
fn run_signal(index: usize, shared: &Shared) -> bool {
    let signal = shared.signal.load_full();

    match &*signal {
        RoundSignal::Run(task) => {
            task(index);
            true
        }
        RoundSignal::Stop => false,
        RoundSignal::Idle => unreachable!("workers are only released after a signal is published"),
    }
}
