#![forbid(unsafe_code)]

//! Outgoing call bookkeeping with bounded retry.
//!
//! A [`CallQueue`] owns every call a component has issued until it settles:
//!
//! ```text
//! issue ──► ready ──take──► in flight ──settle──► (gone)
//!                              │
//!                            fail ──retryable, budget left──► delayed
//!                              │                                 │
//!                              └──final──► (gone)      release_due(now)
//!                                                                │
//!                                                     ready ◄────┘
//! ```
//!
//! # Invariants
//!
//! 1. A call id is in exactly one of ready, in flight, or delayed until it
//!    settles or fails finally.
//! 2. Retries keep their [`CallId`] and increment `attempt`.
//! 3. No call is attempted more than `policy.max_attempts` times.

use std::collections::{HashMap, VecDeque};

use pinmap_core::ServiceError;
use tracing::{debug, warn};
use web_time::Duration;

use crate::retry::RetryPolicy;
use crate::service::{CallId, OutgoingCall, RemoteCall};

/// Outcome of a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// The call was rescheduled; `attempt` is the attempt that will run next.
    Retrying { attempt: u32, delay: Duration },
    /// The call is finished and failed.
    GiveUp(ServiceError),
    /// The id was not in flight (stale or duplicate completion).
    Unknown,
}

#[derive(Debug)]
struct Delayed {
    due: Duration,
    call: OutgoingCall,
}

/// Per-component outgoing call table.
#[derive(Debug)]
pub struct CallQueue {
    policy: RetryPolicy,
    next_id: u64,
    now: Duration,
    ready: VecDeque<OutgoingCall>,
    in_flight: HashMap<CallId, OutgoingCall>,
    delayed: Vec<Delayed>,
}

impl CallQueue {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            next_id: 1,
            now: Duration::ZERO,
            ready: VecDeque::new(),
            in_flight: HashMap::new(),
            delayed: Vec::new(),
        }
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Last time seen by [`release_due`](Self::release_due).
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Queue a new call for its first attempt.
    pub fn issue(&mut self, call: RemoteCall) -> CallId {
        let id = CallId(self.next_id);
        self.next_id += 1;
        debug!(%id, op = call.name(), "call issued");
        self.ready.push_back(OutgoingCall {
            id,
            attempt: 1,
            call,
        });
        id
    }

    /// Hand ready calls to the host and mark them in flight.
    pub fn take(&mut self) -> Vec<OutgoingCall> {
        let calls: Vec<OutgoingCall> = self.ready.drain(..).collect();
        for call in &calls {
            self.in_flight.insert(call.id, call.clone());
        }
        calls
    }

    /// The call behind an in-flight id.
    #[must_use]
    pub fn in_flight(&self, id: CallId) -> Option<&OutgoingCall> {
        self.in_flight.get(&id)
    }

    /// Record success. Returns `false` for unknown ids.
    pub fn settle(&mut self, id: CallId) -> bool {
        self.in_flight.remove(&id).is_some()
    }

    /// Record a failed attempt and decide whether to retry it.
    ///
    /// Backoff is measured from the last time passed to
    /// [`release_due`](Self::release_due).
    pub fn fail(&mut self, id: CallId, error: ServiceError) -> RetryDecision {
        let Some(mut call) = self.in_flight.remove(&id) else {
            return RetryDecision::Unknown;
        };
        if !self.policy.should_retry(call.attempt, &error) {
            if error.is_retryable() {
                warn!(%id, op = call.call.name(), attempts = call.attempt, %error, "retry budget exhausted");
            }
            return RetryDecision::GiveUp(error);
        }
        let delay = self.policy.delay_after(call.attempt);
        call.attempt += 1;
        let attempt = call.attempt;
        warn!(%id, op = call.call.name(), attempt, delay_ms = delay.as_millis() as u64, %error, "retrying call");
        self.delayed.push(Delayed {
            due: self.now.saturating_add(delay),
            call,
        });
        RetryDecision::Retrying { attempt, delay }
    }

    /// Forget a call wherever it is. A later completion for it reports
    /// [`RetryDecision::Unknown`] or `false`.
    pub fn cancel(&mut self, id: CallId) -> bool {
        let before = self.ready.len() + self.delayed.len();
        self.ready.retain(|c| c.id != id);
        self.delayed.retain(|d| d.call.id != id);
        let queued = before != self.ready.len() + self.delayed.len();
        self.in_flight.remove(&id).is_some() || queued
    }

    /// Advance time and move retries whose backoff elapsed back to ready.
    /// Returns the number of calls released.
    pub fn release_due(&mut self, now: Duration) -> usize {
        self.now = self.now.max(now);
        let now = self.now;
        let mut released = 0;
        let mut index = 0;
        while index < self.delayed.len() {
            if self.delayed[index].due <= now {
                let Delayed { call, .. } = self.delayed.remove(index);
                self.ready.push_back(call);
                released += 1;
            } else {
                index += 1;
            }
        }
        released
    }

    /// Earliest pending backoff deadline.
    #[must_use]
    pub fn next_wakeup(&self) -> Option<Duration> {
        self.delayed.iter().map(|d| d.due).min()
    }

    /// True while the id is queued, in flight, or waiting on backoff.
    #[must_use]
    pub fn is_pending(&self, id: CallId) -> bool {
        self.in_flight.contains_key(&id)
            || self.ready.iter().any(|c| c.id == id)
            || self.delayed.iter().any(|d| d.call.id == id)
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.ready.is_empty() && self.in_flight.is_empty() && self.delayed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinmap_core::MapId;

    fn list() -> RemoteCall {
        RemoteCall::ListFloors {
            map: MapId::new("m"),
        }
    }

    #[test]
    fn issue_take_settle() {
        let mut queue = CallQueue::new(RetryPolicy::default());
        let id = queue.issue(list());
        assert!(queue.is_pending(id));
        let taken = queue.take();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].attempt, 1);
        assert!(queue.take().is_empty());
        assert!(queue.settle(id));
        assert!(!queue.settle(id));
        assert!(queue.is_idle());
    }

    #[test]
    fn network_failure_backs_off_linearly() {
        let mut queue = CallQueue::new(RetryPolicy::default());
        let id = queue.issue(list());
        queue.take();

        let decision = queue.fail(id, ServiceError::network("refused"));
        assert_eq!(
            decision,
            RetryDecision::Retrying {
                attempt: 2,
                delay: Duration::from_millis(500)
            }
        );
        assert_eq!(queue.next_wakeup(), Some(Duration::from_millis(500)));
        assert_eq!(queue.release_due(Duration::from_millis(499)), 0);
        assert_eq!(queue.release_due(Duration::from_millis(500)), 1);

        let retry = queue.take();
        assert_eq!(retry[0].id, id);
        assert_eq!(retry[0].attempt, 2);

        let decision = queue.fail(id, ServiceError::Timeout);
        assert_eq!(
            decision,
            RetryDecision::Retrying {
                attempt: 3,
                delay: Duration::from_millis(1000)
            }
        );
        assert_eq!(queue.next_wakeup(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn budget_is_bounded() {
        let mut queue = CallQueue::new(RetryPolicy::default());
        let id = queue.issue(list());
        let mut now = Duration::ZERO;
        let mut attempts = 0;
        loop {
            queue.release_due(now);
            let calls = queue.take();
            if calls.is_empty() {
                now = queue.next_wakeup().unwrap_or(now);
                continue;
            }
            attempts += 1;
            match queue.fail(id, ServiceError::network("down")) {
                RetryDecision::Retrying { .. } => {}
                RetryDecision::GiveUp(err) => {
                    assert_eq!(err, ServiceError::network("down"));
                    break;
                }
                RetryDecision::Unknown => panic!("lost call"),
            }
        }
        assert_eq!(attempts, 3);
        assert!(queue.is_idle());
    }

    #[test]
    fn permission_failure_is_final() {
        let mut queue = CallQueue::new(RetryPolicy::default());
        let id = queue.issue(list());
        queue.take();
        assert_eq!(
            queue.fail(id, ServiceError::denied("not yours")),
            RetryDecision::GiveUp(ServiceError::denied("not yours"))
        );
        assert!(!queue.is_pending(id));
    }

    #[test]
    fn unknown_completion_is_reported() {
        let mut queue = CallQueue::new(RetryPolicy::default());
        assert_eq!(queue.fail(CallId(99), ServiceError::Timeout), RetryDecision::Unknown);
    }

    #[test]
    fn cancelled_call_is_forgotten() {
        let mut queue = CallQueue::new(RetryPolicy::default());
        let id = queue.issue(list());
        assert!(queue.cancel(id));
        assert!(queue.take().is_empty());
        assert!(!queue.cancel(id));

        let id = queue.issue(list());
        queue.take();
        assert!(queue.cancel(id));
        assert_eq!(queue.fail(id, ServiceError::Timeout), RetryDecision::Unknown);
        assert!(queue.is_idle());
    }

    #[test]
    fn time_never_runs_backwards() {
        let mut queue = CallQueue::new(RetryPolicy::default());
        queue.release_due(Duration::from_secs(5));
        queue.release_due(Duration::from_secs(1));
        assert_eq!(queue.now(), Duration::from_secs(5));
    }
}
