#![forbid(unsafe_code)]

//! Optimistic mutations of floors and annotations.
//!
//! - [`store`]: observable collections replaced whole on every write.
//! - [`gate`]: local permission check, run before anything is applied.
//! - [`pipeline`]: optimistic apply, remote commit, reconcile or rollback.
//! - [`status`]: transient messages surfacing every failure.

pub mod gate;
pub mod pipeline;
pub mod status;
pub mod store;

use pinmap_core::ServiceError;
use thiserror::Error;

pub use gate::{Action, MapAccess};
pub use pipeline::{EntityKey, MutationEvent, MutationKind, MutationPipeline, Ticket};
pub use status::{StatusBoard, StatusLevel, StatusMessage};
pub use store::{EntityStore, Record};

/// Why a mutation was refused or undone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    /// Rejected locally before any optimistic apply or remote call.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Another mutation of the same entity is awaiting reconciliation.
    #[error("{0} has a mutation in flight")]
    EntityBusy(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// The parent floor is itself an unconfirmed optimistic entry.
    #[error("{0} is not confirmed yet")]
    PendingParent(String),

    /// The record service rejected the commit (after retries, if any).
    #[error(transparent)]
    Remote(#[from] ServiceError),
}
