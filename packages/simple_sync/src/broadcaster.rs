use std::num::NonZero;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use tracing::trace;

use crate::constants::ERR_POISONED_LOCK;
use crate::{PendingReceive, Result};

/// A reusable many-to-many barrier for a fixed number of receivers.
///
/// Each round starts when some party calls [`send()`][Self::send] and completes once exactly
/// [`len()`][Self::len] receivers have acknowledged it via [`receive()`][Self::receive]. After
/// completion the broadcaster is immediately ready for the next round, with no reset call needed.
///
/// Unlike [`std::sync::Barrier`], the releasing party is not one of the counted parties: the
/// sender only opens the round and waits for all receivers to acknowledge it.
///
/// The broadcaster is not [`Clone`]. Share it by reference or wrap it in an [`Arc`] to hand it
/// to other threads.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use simple_sync::Broadcaster;
///
/// let broadcaster = Arc::new(Broadcaster::new(3).unwrap());
///
/// let receivers = (0..3)
///     .map(|_| {
///         let broadcaster = Arc::clone(&broadcaster);
///         thread::spawn(move || broadcaster.receive())
///     })
///     .collect::<Vec<_>>();
///
/// // Returns once all three receivers have acknowledged the round.
/// assert_eq!(broadcaster.send(), 3);
///
/// for receiver in receivers {
///     receiver.join().unwrap();
/// }
/// ```
///
/// # Contract
///
/// Each receiving party is expected to call `receive()` at most once per round. The broadcaster
/// does not know the identity of its receivers, so a party that acknowledges the same round twice
/// takes the place of another party.
#[derive(Debug)]
pub struct Broadcaster {
    capacity: NonZero<usize>,

    state: Mutex<RoundState>,

    // Signaled whenever a round opens or completes. Senders and receivers both wait on this and
    // re-check their own condition on wakeup.
    round_changed: Condvar,
}

#[derive(Debug)]
struct RoundState {
    // Incremented every time a round completes. Senders wait for this to move past the value it
    // had when they joined the round.
    epoch: u64,

    phase: Phase,

    // Number of receivers that have acknowledged the current round. Always zero while idle.
    acknowledged: usize,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    /// No round is in flight. Receivers park until a sender opens one.
    Idle,

    /// A round has been opened and is collecting acknowledgments.
    Releasing,
}

impl Broadcaster {
    /// Creates a broadcaster for `capacity` receivers.
    ///
    /// Returns [`None`] if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Option<Self> {
        NonZero::new(capacity).map(Self::with_capacity)
    }

    /// Creates a broadcaster for `capacity` receivers.
    #[must_use]
    pub fn with_capacity(capacity: NonZero<usize>) -> Self {
        Self {
            capacity,
            state: Mutex::new(RoundState {
                epoch: 0,
                phase: Phase::Idle,
                acknowledged: 0,
            }),
            round_changed: Condvar::new(),
        }
    }

    /// The number of receivers that must acknowledge each round.
    #[must_use]
    #[expect(
        clippy::len_without_is_empty,
        reason = "a broadcaster always has at least one receiver"
    )]
    pub fn len(&self) -> usize {
        self.capacity.get()
    }

    /// Releases the receivers of the current round and blocks until all of them have
    /// acknowledged it.
    ///
    /// If a round is already in flight (because another sender opened it), this call does not
    /// open a second one. It joins the in-flight round and returns when that round completes.
    ///
    /// Returns the number of receivers that acknowledged the round, which is always
    /// [`len()`][Self::len].
    pub fn send(&self) -> usize {
        let mut state = self.lock_state();

        let joined_epoch = state.epoch;

        if state.phase == Phase::Idle {
            trace!(
                epoch = joined_epoch,
                capacity = self.capacity.get(),
                "opening broadcaster round"
            );

            state.phase = Phase::Releasing;
            self.round_changed.notify_all();
        }

        drop(
            self.round_changed
                .wait_while(state, |state| state.epoch == joined_epoch)
                .expect(ERR_POISONED_LOCK),
        );

        self.capacity.get()
    }

    /// Blocks until a sender releases the current round, then acknowledges it.
    ///
    /// If this is the last acknowledgment the round needs, the round is finalized before this
    /// call returns and the broadcaster is ready for the next round.
    pub fn receive(&self) {
        let state = self.lock_state();

        let mut state = self
            .round_changed
            .wait_while(state, |state| !state.accepts_acknowledgment(self.capacity))
            .expect(ERR_POISONED_LOCK);

        state.acknowledged = state
            .acknowledged
            .checked_add(1)
            .expect("bounded by capacity, which is a usize");

        if state.acknowledged == self.capacity.get() {
            trace!(epoch = state.epoch, "broadcaster round complete");

            state.finalize();
            self.round_changed.notify_all();
        }
    }

    /// Starts a [`receive()`][Self::receive] on a background thread and returns a handle that
    /// completes once that receive has acknowledged a round.
    ///
    /// The background receive counts as one of the [`len()`][Self::len] receivers of whichever
    /// round it acknowledges. Dropping the returned handle does not cancel it.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to start the background thread.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use simple_sync::Broadcaster;
    ///
    /// let broadcaster = Arc::new(Broadcaster::new(1).unwrap());
    /// let pending = broadcaster.receive_in_background();
    ///
    /// broadcaster.send();
    /// pending.wait();
    /// ```
    pub fn receive_in_background(self: &Arc<Self>) -> PendingReceive {
        let (tx, rx) = oneshot::channel();

        thread::spawn({
            let broadcaster = Arc::clone(self);

            move || {
                broadcaster.receive();

                // The caller may have stopped waiting, in which case nobody cares.
                drop(tx.send(()));
            }
        });

        PendingReceive::new(rx)
    }

    /// Performs a [`receive()`][Self::receive] that the caller waits on for at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`][crate::Error::Timeout] if no round released the receive within
    /// `timeout`. The receive itself is not cancelled: it remains pending on a background thread
    /// and will acknowledge the next round that is sent, occupying one receiver slot of that
    /// round.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to start the background thread.
    pub fn wait_timeout(self: &Arc<Self>, timeout: Duration) -> Result<()> {
        self.receive_in_background().wait_timeout(timeout)
    }

    /// Whether a sender has opened a round that is still collecting acknowledgments.
    #[must_use]
    pub fn is_round_in_flight(&self) -> bool {
        self.lock_state().phase == Phase::Releasing
    }

    /// The number of rounds that have completed since the broadcaster was created.
    #[must_use]
    pub fn completed_rounds(&self) -> u64 {
        self.lock_state().epoch
    }

    fn lock_state(&self) -> MutexGuard<'_, RoundState> {
        self.state.lock().expect(ERR_POISONED_LOCK)
    }
}

impl RoundState {
    fn accepts_acknowledgment(&self, capacity: NonZero<usize>) -> bool {
        self.phase == Phase::Releasing && self.acknowledged < capacity.get()
    }

    fn finalize(&mut self) {
        self.acknowledged = 0;
        self.phase = Phase::Idle;
        self.epoch = self.epoch.wrapping_add(1);
    }
}
