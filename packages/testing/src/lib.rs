#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing code that coordinates threads.
//!
//! A bug in a barrier or a worker pool usually shows up as a thread that waits forever. The
//! helpers here turn such hangs into test failures.

use std::env;
use std::panic;
use std::thread;
use std::time::{Duration, Instant};

use oneshot::RecvTimeoutError;

/// How long [`with_watchdog`] lets a test run. Miri is dramatically slower at thread
/// synchronization, so it gets more time.
#[must_use]
pub fn default_timeout() -> Duration {
    if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    }
}

/// Runs `test_fn` on a separate thread and fails if it does not finish within
/// [`default_timeout()`].
///
/// When the `MUTATION_TESTING` environment variable is set to "1", `test_fn` runs directly on
/// the calling thread without a timeout, so that mutation testing can detect hanging mutants.
///
/// # Panics
///
/// Panics if the test times out. Panics raised by `test_fn` are propagated unchanged.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let value = with_watchdog(|| 2 + 2);
/// assert_eq!(value, 4);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    with_timeout(default_timeout(), test_fn)
}

/// Runs `test_fn` on a separate thread and fails if it does not finish within `timeout`.
///
/// # Panics
///
/// Panics if the test times out. Panics raised by `test_fn` are propagated unchanged.
pub fn with_timeout<F, R>(timeout: Duration, test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = oneshot::channel();
    let started = Instant::now();

    let test_thread = thread::Builder::new()
        .name("watched-test".to_owned())
        .spawn(move || {
            // If the watchdog already gave up, nobody is listening any more.
            drop(tx.send(test_fn()));
        })
        .expect("failed to spawn test thread");

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_thread.join().expect("test thread already delivered its result");
            result
        }
        Err(RecvTimeoutError::Timeout) => {
            // The test thread is left behind. It is most likely blocked forever.
            panic!(
                "test did not finish within {timeout:?} (gave up after {:?}) - probable deadlock",
                started.elapsed()
            );
        }
        Err(RecvTimeoutError::Disconnected) => match test_thread.join() {
            Ok(()) => panic!("test thread exited without delivering a result"),
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}
