use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use oneshot::{RecvTimeoutError, TryRecvError};
use tracing::debug;

use crate::{Error, Result};

const ERR_RECEIVE_LOST: &str = "background receive terminated without acknowledging a round \
    - did the receiving thread panic?";

/// Completion signal of a [`Broadcaster::receive_in_background()`][1] call.
///
/// The signal completes once the background receive has acknowledged a round. It can be waited
/// on synchronously via [`wait()`][Self::wait] or [`wait_timeout()`][Self::wait_timeout],
/// polled via [`is_released()`][Self::is_released], or awaited as a [`Future`].
///
/// Dropping this value does not cancel the background receive. It keeps running and will still
/// acknowledge a round.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use simple_sync::Broadcaster;
/// # use futures::executor::block_on;
///
/// # block_on(async {
/// let broadcaster = Arc::new(Broadcaster::new(1).unwrap());
/// let pending = broadcaster.receive_in_background();
///
/// let sender = std::thread::spawn({
///     let broadcaster = Arc::clone(&broadcaster);
///     move || broadcaster.send()
/// });
///
/// pending.await;
/// assert_eq!(sender.join().unwrap(), 1);
/// # });
/// ```
///
/// [1]: crate::Broadcaster::receive_in_background
#[derive(Debug)]
pub struct PendingReceive {
    rx: oneshot::Receiver<()>,

    // The channel hands out its message only once, so we remember having seen it.
    released: bool,
}

impl PendingReceive {
    pub(crate) fn new(rx: oneshot::Receiver<()>) -> Self {
        Self {
            rx,
            released: false,
        }
    }

    /// Whether the background receive has already acknowledged a round.
    ///
    /// # Panics
    ///
    /// Panics if the background receive thread terminated abnormally.
    pub fn is_released(&mut self) -> bool {
        if !self.released {
            self.released = match self.rx.try_recv() {
                Ok(()) => true,
                Err(TryRecvError::Empty) => false,
                Err(TryRecvError::Disconnected) => panic!("{ERR_RECEIVE_LOST}"),
            };
        }

        self.released
    }

    /// Blocks until the background receive has acknowledged a round.
    ///
    /// # Panics
    ///
    /// Panics if the background receive thread terminated abnormally.
    pub fn wait(self) {
        if self.released {
            return;
        }

        self.rx.recv().expect(ERR_RECEIVE_LOST);
    }

    /// Blocks until the background receive has acknowledged a round or `timeout` has elapsed,
    /// whichever comes first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the timeout elapsed first. The background receive is not
    /// cancelled and will still acknowledge a future round.
    ///
    /// # Panics
    ///
    /// Panics if the background receive thread terminated abnormally.
    pub fn wait_timeout(self, timeout: Duration) -> Result<()> {
        if self.released {
            return Ok(());
        }

        let started = Instant::now();

        match self.rx.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Timeout) => {
                let elapsed = started.elapsed();

                debug!(
                    ?elapsed,
                    "gave up waiting for broadcaster release; receive stays pending"
                );

                Err(Error::Timeout { elapsed })
            }
            Err(RecvTimeoutError::Disconnected) => panic!("{ERR_RECEIVE_LOST}"),
        }
    }
}

impl Future for PendingReceive {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.released {
            return Poll::Ready(());
        }

        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(())) => {
                this.released = true;
                Poll::Ready(())
            }
            Poll::Ready(Err(_)) => panic!("{ERR_RECEIVE_LOST}"),
            Poll::Pending => Poll::Pending,
        }
    }
}
