#![forbid(unsafe_code)]

//! Host-advanced time.
//!
//! Every scheduling decision in the runtime (animation polls, retry
//! backoff, status expiry) takes `now` as a [`Duration`] since an arbitrary
//! epoch, pushed in through `tick`. A [`DeterministicClock`] is the
//! reference source for that value: the harness driver advances it straight
//! to the next wakeup instead of sleeping.

use web_time::Duration;

/// Manually advanced clock with no connection to wall time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeterministicClock {
    now: Duration,
}

impl DeterministicClock {
    /// Create a clock starting at `0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
        }
    }

    /// Jump to `now`. Never moves backwards.
    pub fn set(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Advance by `dt`, saturating.
    pub fn advance(&mut self, dt: Duration) {
        self.now = self.now.saturating_add(dt);
    }

    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }
}
