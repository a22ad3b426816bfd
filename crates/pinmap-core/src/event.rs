#![forbid(unsafe_code)]

//! Typed payloads carried by the in-process event bus.

use crate::model::{AnnotationId, FloorId, ImageRef};

/// A process-local signal. Never crosses the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// An image finished decoding; trackers displaying it must re-measure.
    ImageLoaded {
        image: ImageRef,
    },
    /// A pin was activated (`Some`) or the active pin was dismissed (`None`).
    AnnotationSelected {
        floor: FloorId,
        annotation: Option<AnnotationId>,
    },
}

impl BusEvent {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ImageLoaded { .. } => "image-loaded",
            Self::AnnotationSelected { .. } => "annotation-selected",
        }
    }
}
