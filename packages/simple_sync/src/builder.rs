use std::num::NonZero;
use std::thread;

use crate::WorkerPool;

/// Configures and creates a [`WorkerPool`].
///
/// Obtain one via [`WorkerPool::builder()`].
///
/// # Example
///
/// ```
/// use std::num::NonZero;
///
/// use simple_sync::WorkerPool;
///
/// let pool = WorkerPool::builder()
///     .worker_count(NonZero::new(2).unwrap())
///     .thread_name(|index| format!("resizer-{index}"))
///     .build();
///
/// assert_eq!(pool.worker_count().get(), 2);
/// ```
#[derive(derive_more::Debug)]
#[must_use]
pub struct WorkerPoolBuilder {
    worker_count: Option<NonZero<usize>>,

    #[debug(ignore)]
    thread_name: Option<Box<dyn Fn(usize) -> String>>,

    stack_size: Option<usize>,
}

impl WorkerPoolBuilder {
    pub(crate) fn new() -> Self {
        Self {
            worker_count: None,
            thread_name: None,
            stack_size: None,
        }
    }

    /// Sets the number of workers in the pool.
    ///
    /// If not set, the pool gets one worker per unit of available parallelism on the host.
    pub fn worker_count(mut self, worker_count: NonZero<usize>) -> Self {
        self.worker_count = Some(worker_count);
        self
    }

    /// Sets the function that names each worker thread, given the worker index.
    ///
    /// If not set, workers are named `simple_sync-worker-{index}`.
    pub fn thread_name<F>(mut self, thread_name: F) -> Self
    where
        F: Fn(usize) -> String + 'static,
    {
        self.thread_name = Some(Box::new(thread_name));
        self
    }

    /// Sets the stack size, in bytes, of each worker thread.
    ///
    /// If not set, the platform default for spawned threads is used.
    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Spawns the workers and returns once every one of them is parked waiting for work.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to start a worker thread.
    #[must_use]
    pub fn build(self) -> WorkerPool {
        let worker_count = self
            .worker_count
            .unwrap_or_else(|| thread::available_parallelism().unwrap_or(NonZero::<usize>::MIN));

        WorkerPool::spawn(worker_count, |index| {
            let name = self.thread_name.as_ref().map_or_else(
                || format!("simple_sync-worker-{index}"),
                |thread_name| thread_name(index),
            );

            let builder = thread::Builder::new().name(name);

            match self.stack_size {
                Some(stack_size) => builder.stack_size(stack_size),
                None => builder,
            }
        })
    }
}
