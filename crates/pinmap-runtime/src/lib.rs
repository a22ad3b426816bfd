#![forbid(unsafe_code)]

//! Pinmap Runtime
//!
//! Host-driven state machines for the floor-plan annotation core.
//!
//! # Key Components
//!
//! - [`FrameTracker`] - publishes the measured on-screen box of a floor image
//! - [`MutationPipeline`] - optimistic create/update/delete with rollback
//! - [`IdentityManager`] - ephemeral collaborator registration and verification
//! - [`EventBus`] - in-process `ImageLoaded` / `AnnotationSelected` signals
//! - [`CallSource`] - how the host drains remote calls and reports results
//!
//! # Role in Pinmap
//! The runtime never performs I/O and never reads a wall clock on its own.
//! The host pushes measurements, time ticks, and call completions in; the
//! runtime decides what to publish, what to retry, and what to roll back.
//! Everything here is single-threaded and deterministic under a
//! [`DeterministicClock`].
//!
//! # How it fits in the system
//! `pinmap-core` supplies the vocabulary, `pinmap-layout` the pure geometry,
//! and `pinmap-view` composes trackers, stores, and overlays into a map view.

pub mod bus;
pub mod call_queue;
pub mod cancellation;
pub mod clock;
pub mod config;
pub mod frame_tracker;
pub mod identity;
#[cfg(feature = "logging")]
pub mod logging;
pub mod mutation;
pub mod persistence;
pub mod reactive;
pub mod retry;
pub mod service;
pub mod timer;

pub use bus::{BusSubscription, EventBus};
pub use call_queue::{CallQueue, RetryDecision};
pub use cancellation::{CancellationSource, CancellationToken};
pub use clock::DeterministicClock;
pub use config::{ConfigError, PinmapConfig};
pub use frame_tracker::{FrameTracker, FrameTrigger, Measurement, TrackOutcome, TrackerConfig};
pub use identity::{IdentityError, IdentityManager, IdentityState, SessionStep};
pub use mutation::{
    EntityKey, EntityStore, MapAccess, MutationError, MutationEvent, MutationKind,
    MutationPipeline, StatusBoard, StatusLevel, StatusMessage, Ticket,
};
pub use persistence::{FileStorage, MemoryStorage, StorageBackend, StorageError};
pub use reactive::{Observable, Subscription};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use service::{CallId, CallSource, OutgoingCall, RecordService, RemoteCall, RemoteReply};
pub use timer::{IntervalTimer, PollGuard};
