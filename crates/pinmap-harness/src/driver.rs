#![forbid(unsafe_code)]

//! Deterministic host loop.
//!
//! The [`Driver`] plays the part of the browser: it drains calls from a
//! [`CallSource`], performs them against a [`RecordService`], feeds the
//! results back, and advances a [`DeterministicClock`] straight to the next
//! retry deadline whenever nothing else is runnable. Transport faults are
//! injected here with [`Driver::fail_when`]; the service never sees a call
//! the transport dropped.
//!
//! Every attempt is recorded in a transcript that can be dumped as JSONL.

use pinmap_core::{ServiceError, ServiceResult};
use pinmap_runtime::{
    CallSource, DeterministicClock, OutgoingCall, RecordService, RemoteCall, RemoteReply,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info_span};
use web_time::Duration;

/// Steps [`Driver::run_until_idle`] takes before giving up.
pub const DEFAULT_STEP_LIMIT: usize = 1_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("source is not idle but has no ready calls and no wakeup")]
    Stalled,

    #[error("source still busy after {0} steps")]
    StepLimit(usize),
}

type CallMatcher = Box<dyn Fn(&RemoteCall) -> bool>;

struct FaultRule {
    matches: CallMatcher,
    error: ServiceError,
    remaining: u32,
}

/// One attempt as the transport saw it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    pub at_ms: u64,
    pub call: u64,
    pub attempt: u32,
    pub op: &'static str,
    pub outcome: String,
}

/// Deterministic transport and clock.
pub struct Driver {
    clock: DeterministicClock,
    faults: Vec<FaultRule>,
    transcript: Vec<CallRecord>,
    step_limit: usize,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("now", &self.clock.now())
            .field("faults", &self.faults.len())
            .field("transcript", &self.transcript.len())
            .finish()
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: DeterministicClock::new(),
            faults: Vec::new(),
            transcript: Vec::new(),
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    #[must_use]
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Fail the next `times` attempts of calls matching `matches` with
    /// `error`, without reaching the service.
    pub fn fail_when(
        &mut self,
        matches: impl Fn(&RemoteCall) -> bool + 'static,
        error: ServiceError,
        times: u32,
    ) {
        self.faults.push(FaultRule {
            matches: Box::new(matches),
            error,
            remaining: times,
        });
    }

    /// Fail every attempt of calls named `op` (e.g. `"deleteAnnotation"`).
    pub fn fail_op(&mut self, op: &'static str, error: ServiceError) {
        self.fail_when(move |call| call.name() == op, error, u32::MAX);
    }

    fn injected_fault(&mut self, call: &RemoteCall) -> Option<ServiceError> {
        let rule = self
            .faults
            .iter_mut()
            .find(|rule| rule.remaining > 0 && (rule.matches)(call))?;
        rule.remaining -= 1;
        Some(rule.error.clone())
    }

    /// Perform one attempt. Public so tests can deliver calls out of order.
    pub fn perform(&mut self, call: &OutgoingCall, service: &dyn RecordService) -> ServiceResult<RemoteReply> {
        let _span = info_span!("pinmap.transport", call = %call.id, op = call.call.name()).entered();
        let result = match self.injected_fault(&call.call) {
            Some(error) => Err(error),
            None => call.call.dispatch(service),
        };
        let outcome = match &result {
            Ok(reply) => format!("ok:{}", reply.name()),
            Err(error) => format!("err:{error}"),
        };
        debug!(attempt = call.attempt, outcome = %outcome, "call performed");
        self.transcript.push(CallRecord {
            at_ms: u64::try_from(self.clock.now().as_millis()).unwrap_or(u64::MAX),
            call: call.id.0,
            attempt: call.attempt,
            op: call.call.name(),
            outcome,
        });
        result
    }

    /// Drain and perform every ready call once. Returns how many ran.
    pub fn step(&mut self, source: &mut dyn CallSource, service: &dyn RecordService) -> usize {
        let calls = source.take_calls();
        for call in &calls {
            let result = self.perform(call, service);
            source.complete(call.id, result);
        }
        calls.len()
    }

    /// Advance the clock by `dt` and tick `source`.
    pub fn advance(&mut self, dt: Duration, source: &mut dyn CallSource) {
        self.clock.advance(dt);
        source.tick(self.clock.now());
    }

    /// Run until `source` is idle, jumping the clock to each retry deadline.
    pub fn run_until_idle(
        &mut self,
        source: &mut dyn CallSource,
        service: &dyn RecordService,
    ) -> Result<usize, DriverError> {
        let mut performed = 0;
        for _ in 0..self.step_limit {
            source.tick(self.clock.now());
            let ran = self.step(source, service);
            performed += ran;
            if source.is_idle() {
                return Ok(performed);
            }
            if ran == 0 {
                let Some(wakeup) = source.next_wakeup() else {
                    return Err(DriverError::Stalled);
                };
                self.clock.set(wakeup.max(self.clock.now()));
            }
        }
        Err(DriverError::StepLimit(self.step_limit))
    }

    #[must_use]
    pub fn transcript(&self) -> &[CallRecord] {
        &self.transcript
    }

    /// The transcript as one JSON object per line.
    pub fn transcript_jsonl(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for record in &self.transcript {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::InMemoryRecordService;
    use pinmap_runtime::{MapAccess, MutationPipeline, RetryPolicy};

    fn pipeline_for(service: &InMemoryRecordService) -> MutationPipeline {
        let map = service.add_map("m", false);
        service.seed_floor(&map.id, 1, "Ground");
        MutationPipeline::new(
            MapAccess::new(map.id, false),
            RetryPolicy::default(),
            Duration::from_secs(4),
        )
    }

    #[test]
    fn retries_advance_the_clock_to_each_deadline() {
        let service = InMemoryRecordService::new();
        let mut pipeline = pipeline_for(&service);
        let mut driver = Driver::new();
        driver.fail_when(|call| call.name() == "listFloors", ServiceError::Timeout, 2);

        pipeline.load_floors();
        driver.run_until_idle(&mut pipeline, &service).unwrap();

        let at: Vec<u64> = driver.transcript().iter().map(|r| r.at_ms).collect();
        assert_eq!(at, vec![0, 500, 1500]);
        assert_eq!(pipeline.floors().len(), 1);
        assert_eq!(service.call_count("listFloors"), 1);
    }

    #[test]
    fn transcript_is_jsonl() {
        let service = InMemoryRecordService::new();
        let mut pipeline = pipeline_for(&service);
        let mut driver = Driver::new();
        pipeline.load_floors();
        driver.run_until_idle(&mut pipeline, &service).unwrap();

        let jsonl = driver.transcript_jsonl().unwrap();
        let line: serde_json::Value = serde_json::from_str(jsonl.lines().next().unwrap()).unwrap();
        assert_eq!(line["op"], "listFloors");
        assert_eq!(line["outcome"], "ok:floors");
        assert_eq!(line["attempt"], 1);
    }

    #[test]
    fn idle_source_returns_immediately() {
        let service = InMemoryRecordService::new();
        let mut pipeline = pipeline_for(&service);
        assert_eq!(Driver::new().run_until_idle(&mut pipeline, &service), Ok(0));
    }

    #[test]
    fn step_limit_is_enforced() {
        let service = InMemoryRecordService::new();
        let mut pipeline = pipeline_for(&service);
        let mut driver = Driver::new().with_step_limit(1);
        driver.fail_op("listFloors", ServiceError::Timeout);
        pipeline.load_floors();
        assert_eq!(
            driver.run_until_idle(&mut pipeline, &service),
            Err(DriverError::StepLimit(1))
        );
    }
}
