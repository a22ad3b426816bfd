#![forbid(unsafe_code)]

//! Bounded-lifetime interval timers.
//!
//! The runtime never spawns a free-running interval. An [`IntervalTimer`]
//! is created together with a [`PollGuard`]; the guard's owner controls the
//! timer's lifetime and dropping the guard cancels it. A cancelled timer
//! never fires again.
//!
//! Timers are polled, not threaded: the host calls
//! [`IntervalTimer::poll`] with the current monotonic time and reacts when
//! it returns `true`.

use tracing::debug;
use web_time::Duration;

use crate::cancellation::{CancellationSource, CancellationToken};

/// Owner handle for an [`IntervalTimer`]. Cancels the timer on drop.
#[derive(Debug)]
#[must_use = "dropping the guard cancels the timer immediately"]
pub struct PollGuard {
    source: CancellationSource,
}

impl PollGuard {
    /// Cancel the timer now.
    pub fn cancel(&self) {
        self.source.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }
}

impl Drop for PollGuard {
    fn drop(&mut self) {
        if !self.source.is_cancelled() {
            debug!("poll guard dropped, cancelling timer");
        }
        self.source.cancel();
    }
}

/// A fixed-interval timer evaluated against a host-supplied clock.
#[derive(Debug)]
pub struct IntervalTimer {
    interval: Duration,
    next_due: Duration,
    token: CancellationToken,
}

impl IntervalTimer {
    /// Start a timer whose first tick is due at `now + interval`.
    pub fn start(now: Duration, interval: Duration) -> (Self, PollGuard) {
        let source = CancellationSource::new();
        let timer = Self {
            interval,
            next_due: now.saturating_add(interval),
            token: source.token(),
        };
        (timer, PollGuard { source })
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// When the next tick is due, or `None` once cancelled.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        (!self.is_cancelled()).then_some(self.next_due)
    }

    /// Returns `true` at most once per call when a tick is due.
    ///
    /// Missed ticks are coalesced: after a long gap the next tick is
    /// scheduled one interval after `now`, not replayed.
    pub fn poll(&mut self, now: Duration) -> bool {
        if self.is_cancelled() || now < self.next_due {
            return false;
        }
        self.next_due = now.saturating_add(self.interval);
        true
    }
}
