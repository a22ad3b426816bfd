#![forbid(unsafe_code)]

//! Pinmap Harness
//!
//! Test infrastructure for the Pinmap runtime.
//!
//! # Key Components
//!
//! - [`InMemoryRecordService`] - authoritative record service with server-side permission checks
//! - [`Driver`] - deterministic host loop with transport fault injection and a JSONL transcript
//! - [`Scenario`] - one seeded map plus its driver
//!
//! # Role in Pinmap
//! Everything the runtime leaves to the host (transport, time, the backend)
//! is simulated here, in process and without wall-clock waits, so scenario
//! tests exercise retries and rollbacks exactly.

pub mod driver;
pub mod scenario;
pub mod service;

pub use driver::{CallRecord, DEFAULT_STEP_LIMIT, Driver, DriverError};
pub use scenario::Scenario;
pub use service::InMemoryRecordService;
