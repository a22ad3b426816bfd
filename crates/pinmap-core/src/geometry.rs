#![forbid(unsafe_code)]

//! Pixel-space geometric primitives.
//!
//! All values are CSS pixels as `f64`. Boxes come from layout measurement
//! (post-transform), so they may be fractional, and a box that has not been
//! laid out yet reports zero extent.

use serde::{Deserialize, Serialize};

/// A point in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl PixelPoint {
    /// The origin `(0, 0)`.
    pub const ORIGIN: Self = Self::new(0.0, 0.0);

    /// Create a new point.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Translate by the given deltas.
    #[inline]
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Express this point relative to `origin`.
    #[inline]
    #[must_use]
    pub fn relative_to(self, origin: PixelPoint) -> Self {
        Self::new(self.x - origin.x, self.y - origin.y)
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(self, other: PixelPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Both components are finite.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelSize {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl PixelSize {
    /// Create a new size.
    #[inline]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when either extent is zero, negative, or not finite.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }
}

/// An axis-aligned box in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelRect {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl PixelRect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Create a rectangle from an origin point and a size.
    #[inline]
    pub const fn from_parts(origin: PixelPoint, size: PixelSize) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    /// Right edge (exclusive).
    #[inline]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Top-left corner.
    #[inline]
    pub const fn origin(&self) -> PixelPoint {
        PixelPoint::new(self.left, self.top)
    }

    /// Extent of the rectangle.
    #[inline]
    pub const fn size(&self) -> PixelSize {
        PixelSize::new(self.width, self.height)
    }

    /// Center point.
    #[inline]
    pub fn center(&self) -> PixelPoint {
        PixelPoint::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// A box with zero, negative, or non-finite extent has not been laid out.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !(self.left.is_finite() && self.top.is_finite()) || self.size().is_empty()
    }

    /// Check if a point lies inside (edges inclusive on the left/top).
    #[inline]
    pub fn contains(&self, point: PixelPoint) -> bool {
        point.x >= self.left
            && point.x < self.right()
            && point.y >= self.top
            && point.y < self.bottom()
    }

    /// Translate by the given deltas.
    #[inline]
    #[must_use]
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.left + dx, self.top + dy, self.width, self.height)
    }

    /// Express this rectangle relative to `origin`.
    #[inline]
    #[must_use]
    pub fn relative_to(&self, origin: PixelPoint) -> Self {
        self.translate(-origin.x, -origin.y)
    }
}

/// The measured on-screen box of a floor's currently rendered image.
///
/// `image` is in viewport coordinates and already reflects every transform
/// applied to the image (zoom, pan, perspective rotation). `container` is
/// the viewport position of the tracked container's own origin, so markers
/// absolutely positioned inside the container can be expressed relative to
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageFrame {
    /// Image box in viewport coordinates.
    pub image: PixelRect,
    /// Container origin in viewport coordinates.
    pub container: PixelPoint,
}

impl ImageFrame {
    /// Create a frame from an image box and a container origin.
    #[inline]
    pub const fn new(image: PixelRect, container: PixelPoint) -> Self {
        Self { image, container }
    }

    /// A frame whose container sits at the viewport origin.
    #[inline]
    pub const fn at_viewport(image: PixelRect) -> Self {
        Self::new(image, PixelPoint::ORIGIN)
    }

    /// Image box relative to the container origin.
    #[inline]
    pub fn container_relative(&self) -> PixelRect {
        self.image.relative_to(self.container)
    }

    /// True when the image box cannot be used for positioning.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }
}
