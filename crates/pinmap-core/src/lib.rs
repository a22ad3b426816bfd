#![forbid(unsafe_code)]

//! Core: pixel geometry, the map/floor/annotation data model, and the
//! remote error taxonomy.
//!
//! # Role in Pinmap
//! `pinmap-core` is the vocabulary layer. Every other crate speaks in its
//! types: [`geometry::PixelRect`] for measured layout boxes,
//! [`model::Position`] for normalized pin anchors, [`error::ServiceError`]
//! for remote failures, and [`event::BusEvent`] for in-process signals.
//!
//! # How it fits in the system
//! `pinmap-layout` turns positions plus measured frames into pixels,
//! `pinmap-runtime` mutates the model through the optimistic pipeline, and
//! `pinmap-view` composes both. None of them define their own geometry or
//! record types.

pub mod error;
pub mod event;
pub mod geometry;
pub mod model;

pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use event::BusEvent;
pub use geometry::{ImageFrame, PixelPoint, PixelRect, PixelSize};
pub use model::{
    Actor, Annotation, AnnotationDraft, AnnotationId, AnnotationPatch, Authorship, EditorId,
    EditorIdentity, Floor, FloorDraft, FloorId, ImageRef, Map, MapId, Position, Verification,
};
