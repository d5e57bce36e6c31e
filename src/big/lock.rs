//! The reader/writer lock of a shard.
//!
//! The whole lock is one `AtomicIsize`. Every value it can hold decodes into
//! a [`LockState`], and every operation is a compare-and-swap loop that reads
//! the word, decides from the decoded state what to do, and tries to publish
//! the next state. The decisions are pure functions of the state, which lets
//! the tests below model-check the protocol by enumerating interleavings.
//!
//! A writer that arrives while readers hold the lock announces itself with
//! `WritePending`: from that point no new reader is admitted, and every reader
//! that leaves moves the count one step closer to `WriteActive`. A reader that
//! wants to upgrade in place does the same, counting every reader but itself.
//! If it finds another writer already pending it gives up instead of waiting,
//! because the pending writer is in turn waiting for it to leave.

use crate::common::backoff::Backoff;

use std::{
    fmt,
    sync::atomic::{AtomicIsize, Ordering},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum LockState {
    /// Nobody holds the lock.
    Idle,
    /// This many readers hold the lock.
    Reading(usize),
    /// One writer holds the lock.
    WriteActive,
    /// A writer waits for this many readers to leave. No reader is admitted.
    WritePending(usize),
}

/// What a lock operation does when it observes a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Transition {
    /// Publish this state. The operation is then done.
    Complete(LockState),
    /// Publish this state, then wait until the lock reaches `WriteActive`.
    Drain(LockState),
    /// The operation cannot proceed from this state. Back off and look again.
    Wait,
    /// The operation gives up and leaves the lock unchanged.
    Abort,
}

impl LockState {
    #[inline]
    pub(crate) fn encode(self) -> isize {
        match self {
            Self::Idle => 0,
            Self::Reading(n) => n as isize,
            Self::WriteActive => -1,
            Self::WritePending(n) => -1 - n as isize,
        }
    }

    #[inline]
    pub(crate) fn decode(word: isize) -> Self {
        match word {
            0 => Self::Idle,
            -1 => Self::WriteActive,
            n if n > 0 => Self::Reading(n as usize),
            n => Self::WritePending((-1 - n) as usize),
        }
    }

    pub(crate) fn on_start_reading(self) -> Transition {
        match self {
            Self::Idle => Transition::Complete(Self::Reading(1)),
            Self::Reading(n) => Transition::Complete(Self::Reading(n + 1)),
            Self::WriteActive | Self::WritePending(_) => Transition::Wait,
        }
    }

    /// Returns `None` if there is no reader to remove.
    pub(crate) fn on_stop_reading(self) -> Option<Self> {
        match self {
            Self::Reading(1) => Some(Self::Idle),
            Self::Reading(n) => Some(Self::Reading(n - 1)),
            // The last reader hands the lock to the pending writer.
            Self::WritePending(1) => Some(Self::WriteActive),
            Self::WritePending(n) => Some(Self::WritePending(n - 1)),
            Self::Idle | Self::WriteActive => None,
        }
    }

    pub(crate) fn on_start_writing(self) -> Transition {
        match self {
            Self::Idle => Transition::Complete(Self::WriteActive),
            Self::Reading(n) => Transition::Drain(Self::WritePending(n)),
            Self::WriteActive | Self::WritePending(_) => Transition::Wait,
        }
    }

    /// The caller holds one of the read locks.
    pub(crate) fn on_upgrade(self) -> Transition {
        match self {
            Self::Reading(1) => Transition::Complete(Self::WriteActive),
            Self::Reading(n) => Transition::Drain(Self::WritePending(n - 1)),
            // Another writer waits for us to leave. Waiting for it in turn
            // would deadlock.
            Self::WritePending(_) => Transition::Abort,
            Self::Idle | Self::WriteActive => {
                debug_assert!(false, "Upgrading without a read lock ({self:?})");
                Transition::Abort
            }
        }
    }
}

pub(crate) struct ShardLock {
    word: AtomicIsize,
}

impl Default for ShardLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShardLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ShardLock").field(&self.state()).finish()
    }
}

impl ShardLock {
    pub(crate) fn new() -> Self {
        Self {
            word: AtomicIsize::new(LockState::Idle.encode()),
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> LockState {
        LockState::decode(self.word.load(Ordering::Acquire))
    }

    #[inline]
    fn compare_exchange(&self, current: LockState, new: LockState) -> Result<(), LockState> {
        self.word
            .compare_exchange_weak(
                current.encode(),
                new.encode(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(LockState::decode)
    }

    /// Runs the compare-and-swap loop of one operation. Returns `false` if the
    /// operation aborted.
    fn transit(&self, decide: impl Fn(LockState) -> Transition) -> bool {
        let backoff = Backoff::new();
        let mut current = self.state();

        loop {
            match decide(current) {
                Transition::Complete(next) => match self.compare_exchange(current, next) {
                    Ok(()) => return true,
                    Err(actual) => {
                        backoff.spin();
                        current = actual;
                    }
                },
                Transition::Drain(next) => match self.compare_exchange(current, next) {
                    Ok(()) => {
                        self.wait_for_readers(&backoff);
                        return true;
                    }
                    Err(actual) => {
                        backoff.spin();
                        current = actual;
                    }
                },
                Transition::Wait => {
                    backoff.snooze();
                    current = self.state();
                }
                Transition::Abort => return false,
            }
        }
    }

    fn wait_for_readers(&self, backoff: &Backoff) {
        while self.state() != LockState::WriteActive {
            backoff.snooze();
        }
    }

    pub(crate) fn start_reading(&self) {
        self.transit(LockState::on_start_reading);
    }

    pub(crate) fn stop_reading(&self) {
        let backoff = Backoff::new();
        let mut current = self.state();

        loop {
            let Some(next) = current.on_stop_reading() else {
                debug_assert!(
                    false,
                    "Releasing a read lock that is not held ({current:?})"
                );
                return;
            };
            match self.compare_exchange(current, next) {
                Ok(()) => return,
                Err(actual) => {
                    backoff.spin();
                    current = actual;
                }
            }
        }
    }

    pub(crate) fn start_writing(&self) {
        self.transit(LockState::on_start_writing);
    }

    pub(crate) fn stop_writing(&self) {
        debug_assert_eq!(self.state(), LockState::WriteActive);
        self.word.store(LockState::Idle.encode(), Ordering::Release);
    }

    /// Turns the held write lock into a read lock without letting another
    /// writer in between.
    pub(crate) fn change_from_write_to_read(&self) {
        debug_assert_eq!(self.state(), LockState::WriteActive);
        // The write lock is exclusive, so no reader can have arrived.
        self.word
            .store(LockState::Reading(1).encode(), Ordering::Release);
    }

    /// Tries to turn the held read lock into the write lock.
    ///
    /// Returns `false` if another writer is already waiting. The read lock is
    /// still held in that case; the caller has to release it before it can
    /// acquire the write lock.
    pub(crate) fn try_change_from_read_to_write(&self) -> bool {
        self.transit(LockState::on_upgrade)
    }
}
