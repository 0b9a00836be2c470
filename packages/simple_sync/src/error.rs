use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when coordinating rounds.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A bounded wait for a broadcaster release gave up before the release occurred.
    ///
    /// The receive that was being waited for is not cancelled. It stays pending against the
    /// broadcaster and will acknowledge a future round.
    #[error("timed out after {elapsed:?} waiting for broadcaster release")]
    Timeout {
        /// How long the caller waited before giving up.
        elapsed: Duration,
    },

    /// The worker pool has been shut down and its workers have exited.
    #[error("worker pool is closed and can no longer execute work")]
    PoolClosed,
}

/// A specialized `Result` type for round coordination, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
