#![forbid(unsafe_code)]

//! Pinmap public facade crate.
//!
//! Re-exports the types a host needs from the internal crates, adds
//! [`MapSession`] to wire them together for one map, and offers a prelude.
//!
//! # Key Components
//!
//! - [`MapSession`] - pipeline, identity, and view for one visitor on one map
//! - [`Error`] - every failure a session operation can report
//! - [`prelude`] - the day-to-day imports

pub mod session;

use thiserror::Error;

// --- Core re-exports -------------------------------------------------------

pub use pinmap_core::{
    Actor, Annotation, AnnotationDraft, AnnotationId, AnnotationPatch, BusEvent, EditorIdentity,
    Floor, FloorDraft, FloorId, ImageFrame, ImageRef, Map, MapId, PixelPoint, PixelRect,
    PixelSize, Position, ServiceError,
};

// --- Layout re-exports -----------------------------------------------------

pub use pinmap_layout::{
    GrowthOrigin, MarkerPlacement, Origin, PanelPlacement, PanelSlot, PlacementMetrics, place,
    resolve, unresolve,
};

// --- Runtime re-exports ----------------------------------------------------

pub use pinmap_runtime::{
    CallId, CallSource, ConfigError, EventBus, FrameTrigger, IdentityError, IdentityState,
    Measurement, MutationError, MutationEvent, OutgoingCall, PinmapConfig, RecordService,
    RemoteCall, RemoteReply, SessionStep, StorageBackend, StorageError, Ticket,
};

// --- View re-exports -------------------------------------------------------

pub use pinmap_view::{ClickOutcome, MapView, Marker, ViewConfig, ViewMode};

pub use session::MapSession;

// --- Errors ---------------------------------------------------------------

/// Top-level error type for Pinmap hosts.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Standard result type for Pinmap APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Actor, AnnotationDraft, AnnotationId, AnnotationPatch, CallSource, ClickOutcome, Error,
        FloorId, MapSession, PinmapConfig, PixelPoint, PixelSize, Position, Result, ViewMode,
    };

    pub use crate::{core, layout, runtime, view};
}

pub use pinmap_core as core;
pub use pinmap_layout as layout;
pub use pinmap_runtime as runtime;
pub use pinmap_view as view;
