#![forbid(unsafe_code)]

//! Retry policy for remote commits.
//!
//! # Determinism
//!
//! Backoff delays use fixed formulas (no jitter) so that tests driving a
//! [`DeterministicClock`](crate::clock::DeterministicClock) reproduce exact
//! schedules.
//!
//! # Example
//!
//! ```
//! use pinmap_runtime::retry::RetryPolicy;
//! use web_time::Duration;
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.max_attempts, 3);
//! // Failure of attempt 1 waits 500 ms, attempt 2 waits 1000 ms.
//! assert_eq!(policy.delay_after(1), Duration::from_millis(500));
//! assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
//! ```

use pinmap_core::ServiceError;
use serde::{Deserialize, Serialize};
use web_time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries.
    Fixed { delay_ms: u64 },
    /// `base_ms * 2^retry`, capped at `max_ms`.
    Exponential { base_ms: u64, max_ms: u64 },
    /// `base_ms * (retry + 1)`, capped at `max_ms`.
    Linear { base_ms: u64, max_ms: u64 },
}

/// A bounded retry budget with backoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first. `1` disables retries.
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, 500)
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Linear backoff of `step_ms × attempt`, capped at ten steps.
    #[must_use]
    pub fn linear(max_attempts: u32, step_ms: u64) -> Self {
        Self::new(
            max_attempts,
            BackoffStrategy::Linear {
                base_ms: step_ms,
                max_ms: step_ms.saturating_mul(10),
            },
        )
    }

    /// Execute once.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, BackoffStrategy::Fixed { delay_ms: 0 })
    }

    /// Delay before retry number `retry` (0-indexed).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        match &self.backoff {
            BackoffStrategy::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            BackoffStrategy::Exponential { base_ms, max_ms } => {
                let multiplier = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
                let delay = base_ms.saturating_mul(multiplier);
                Duration::from_millis(delay.min(*max_ms))
            }
            BackoffStrategy::Linear { base_ms, max_ms } => {
                let delay = base_ms.saturating_mul(u64::from(retry) + 1);
                Duration::from_millis(delay.min(*max_ms))
            }
        }
    }

    /// Delay after the 1-based `attempt` failed.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.delay(attempt.saturating_sub(1))
    }

    /// Whether a failure of the 1-based `attempt` should be retried.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &ServiceError) -> bool {
        error.is_retryable() && attempt < self.max_attempts
    }

    /// Sum of every backoff delay the budget allows.
    #[must_use]
    pub fn total_max_delay(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.delay_after(attempt))
            .sum()
    }
}
