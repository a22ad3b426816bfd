#![forbid(unsafe_code)]

//! Coordinate resolution for pin markers.
//!
//! # Design
//!
//! The resolver never composes scale/rotate/translate matrices. It works
//! only in measured-pixel space: the [`ImageFrame`] handed to it is the
//! image's bounding box *after* every transform, re-measured whenever layout
//! may have changed. The same formula therefore serves a plain view, a
//! zoomed/panned view, and a card inside a perspective carousel:
//!
//! ```text
//! left = frame.left + x / 100 * frame.width
//! top  = frame.top  + y / 100 * frame.height
//! ```
//!
//! # Invariants
//!
//! 1. Positions are clamped to `[0, 100]` before use, so a marker never
//!    lands outside its measured frame.
//! 2. A missing or empty frame yields [`MarkerPlacement::Hidden`], never a
//!    point at the origin.
//! 3. [`unresolve`] inverts [`resolve`] for any non-empty frame, up to
//!    floating-point rounding.

use pinmap_core::{Annotation, AnnotationId, ImageFrame, PixelPoint, PixelRect, Position};
use serde::{Deserialize, Serialize};

/// How the floor image is currently presented.
///
/// The resolver is transform-agnostic, so the mode does not change the
/// arithmetic. It records which frame the caller must supply: in
/// [`ResolveMode::Carousel`] each floor card has its own image and
/// transform, and annotations must be resolved against their own card's
/// frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolveMode {
    /// Single static image.
    #[default]
    Plain,
    /// Image under a zoom/pan transform.
    ZoomPan,
    /// Stacked floor cards under a 3D carousel transform.
    Carousel,
}

/// Coordinate origin of resolved points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    /// Relative to the tracked container, for markers positioned inside it.
    #[default]
    Container,
    /// Viewport coordinates, for overlay panels.
    Viewport,
}

/// Where a marker should be drawn, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MarkerPlacement {
    /// Draw the marker at this point.
    Visible(PixelPoint),
    /// No usable frame yet; do not draw.
    #[default]
    Hidden,
}

impl MarkerPlacement {
    /// The point, when visible.
    #[must_use]
    pub const fn point(&self) -> Option<PixelPoint> {
        match self {
            Self::Visible(point) => Some(*point),
            Self::Hidden => None,
        }
    }

    #[must_use]
    pub const fn is_visible(&self) -> bool {
        matches!(self, Self::Visible(_))
    }
}

fn frame_box(frame: &ImageFrame, origin: Origin) -> PixelRect {
    match origin {
        Origin::Container => frame.container_relative(),
        Origin::Viewport => frame.image,
    }
}

/// Resolve a normalized position against a measured frame.
pub fn resolve(position: Position, frame: Option<&ImageFrame>, origin: Origin) -> MarkerPlacement {
    let Some(frame) = frame.filter(|f| !f.is_empty()) else {
        return MarkerPlacement::Hidden;
    };
    let position = position.clamp();
    let rect = frame_box(frame, origin);
    MarkerPlacement::Visible(PixelPoint::new(
        rect.left + position.x / 100.0 * rect.width,
        rect.top + position.y / 100.0 * rect.height,
    ))
}

/// Map a pixel back to a clamped normalized position.
///
/// `point` is expressed in the same `origin` as the frame box. Returns
/// `None` for an empty frame or a non-finite point.
pub fn unresolve(point: PixelPoint, frame: &ImageFrame, origin: Origin) -> Option<Position> {
    if frame.is_empty() || !point.is_finite() {
        return None;
    }
    let rect = frame_box(frame, origin);
    Some(Position::clamped(
        (point.x - rect.left) / rect.width * 100.0,
        (point.y - rect.top) / rect.height * 100.0,
    ))
}

/// A configured resolver for one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolver {
    pub mode: ResolveMode,
    pub origin: Origin,
}

impl Resolver {
    #[must_use]
    pub const fn new(mode: ResolveMode, origin: Origin) -> Self {
        Self { mode, origin }
    }

    /// Resolve one position.
    pub fn resolve(&self, position: Position, frame: Option<&ImageFrame>) -> MarkerPlacement {
        resolve(position, frame, self.origin)
    }

    /// Resolve every annotation against the same frame.
    ///
    /// In carousel mode callers pass the annotations of a single floor card
    /// together with that card's frame.
    pub fn resolve_all<'a>(
        &self,
        annotations: impl IntoIterator<Item = &'a Annotation>,
        frame: Option<&ImageFrame>,
    ) -> Vec<(AnnotationId, MarkerPlacement)> {
        annotations
            .into_iter()
            .map(|a| (a.id.clone(), self.resolve(a.position, frame)))
            .collect()
    }
}
