use super::constants::BACKOFF_SLEEP_MICROS;

use std::{cell::Cell, fmt, thread, time::Duration};

/// An escalating wait strategy for spin loops.
///
/// The first waits busy-spin for exponentially longer periods, the next ones
/// yield the thread to the OS scheduler, and once both phases are exhausted
/// every further wait puts the thread to sleep for a short fixed interval.
/// The spin and yield phases are those of [`crossbeam_utils::Backoff`].
///
/// A `Backoff` is meant to live on the stack of one wait loop; it counts the
/// attempts made so far.
///
/// # Examples
///
/// ```rust
/// use bigset::Backoff;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// fn wait_until(ready: &AtomicBool) {
///     let backoff = Backoff::new();
///     while !ready.load(Ordering::Acquire) {
///         backoff.snooze();
///     }
/// }
///
/// let ready = AtomicBool::new(true);
/// wait_until(&ready);
/// ```
pub struct Backoff {
    inner: crossbeam_utils::Backoff,
    sleeps: Cell<u32>,
}

impl Backoff {
    /// Creates a new `Backoff` with no attempts recorded.
    pub fn new() -> Self {
        Self {
            inner: crossbeam_utils::Backoff::new(),
            sleeps: Cell::new(0),
        }
    }

    /// Forgets all recorded attempts.
    pub fn reset(&self) {
        self.inner.reset();
        self.sleeps.set(0);
    }

    /// Backs off after a failed compare-and-swap.
    ///
    /// This never yields or sleeps; the other party is expected to make
    /// progress within a few instructions.
    #[inline]
    pub fn spin(&self) {
        self.inner.spin();
    }

    /// Backs off while waiting for another thread to make progress.
    ///
    /// Spins, then yields, then sleeps, depending on how many attempts have
    /// been made so far.
    pub fn snooze(&self) {
        if !self.inner.is_completed() {
            self.inner.snooze();
            return;
        }

        let sleeps = self.sleeps.get();
        if sleeps == 0 {
            #[cfg(feature = "logging")]
            log::debug!(
                "Backoff escalated to sleeping for {}us per attempt",
                BACKOFF_SLEEP_MICROS
            );
        }
        self.sleeps.set(sleeps.saturating_add(1));

        thread::sleep(Duration::from_micros(BACKOFF_SLEEP_MICROS));
    }

    /// Returns `true` once the backoff has escalated to sleeping.
    pub fn is_sleeping(&self) -> bool {
        self.sleeps.get() > 0
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backoff")
            .field("inner", &self.inner)
            .field("sleeps", &self.sleeps.get())
            .finish()
    }
}
