#![forbid(unsafe_code)]

//! Placement of a floating detail panel next to a pin marker.
//!
//! The panel prefers to sit centered above the marker, flipping below when
//! it would crowd the top of the viewport, and is always clamped
//! horizontally so it stays fully on-screen.
//!
//! # Example
//!
//! ```
//! use pinmap_core::{PixelPoint, PixelSize};
//! use pinmap_layout::placement::{place, AnchorEdge, PlacementMetrics};
//!
//! let placed = place(
//!     PixelPoint::new(400.0, 300.0),
//!     PixelSize::new(1280.0, 800.0),
//!     PixelSize::new(240.0, 120.0),
//!     PlacementMetrics::default(),
//! );
//! assert_eq!(placed.edge, AnchorEdge::Above);
//! assert_eq!(placed.top, 170.0);
//! assert_eq!(placed.left, 280.0);
//! ```

use pinmap_core::{PixelPoint, PixelRect, PixelSize};
use serde::{Deserialize, Serialize};

/// Which side of the anchor the panel sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorEdge {
    Above,
    Below,
}

impl AnchorEdge {
    /// Return the opposite edge.
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            Self::Above => Self::Below,
            Self::Below => Self::Above,
        }
    }

    /// Growth origin that keeps an appearance animation pinned to the anchor.
    #[must_use]
    pub const fn growth_origin(self) -> GrowthOrigin {
        match self {
            Self::Above => GrowthOrigin::BottomCenter,
            Self::Below => GrowthOrigin::TopCenter,
        }
    }
}

/// Point of the panel that stays fixed while it scales in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrowthOrigin {
    BottomCenter,
    TopCenter,
}

impl GrowthOrigin {
    /// CSS `transform-origin` value.
    #[must_use]
    pub const fn as_css(self) -> &'static str {
        match self {
            Self::BottomCenter => "bottom center",
            Self::TopCenter => "top center",
        }
    }
}

/// Spacing constants for placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementMetrics {
    /// Distance between the anchor and the near edge of the panel.
    pub gap: f64,
    /// Minimum distance between the panel and the viewport edges.
    pub margin: f64,
}

impl Default for PlacementMetrics {
    fn default() -> Self {
        Self {
            gap: 10.0,
            margin: 10.0,
        }
    }
}

/// Computed panel position in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanelPlacement {
    pub left: f64,
    pub top: f64,
    pub edge: AnchorEdge,
    pub growth_origin: GrowthOrigin,
}

impl PanelPlacement {
    /// Full panel box for the given size.
    #[must_use]
    pub fn rect(&self, panel: PixelSize) -> PixelRect {
        PixelRect::new(self.left, self.top, panel.width, panel.height)
    }
}

/// Place a panel of estimated size `panel` next to `anchor`.
///
/// Vertical: above the anchor with its bottom edge `gap` pixels above it;
/// if that top would fall within `margin` of the viewport top, below the
/// anchor instead. Horizontal: centered on the anchor, clamped to
/// `[margin, viewport.width - panel.width - margin]`. When the panel is too
/// wide for that range it is pinned to `margin`.
pub fn place(
    anchor: PixelPoint,
    viewport: PixelSize,
    panel: PixelSize,
    metrics: PlacementMetrics,
) -> PanelPlacement {
    let above_top = anchor.y - metrics.gap - panel.height;
    let edge = if above_top < metrics.margin {
        AnchorEdge::Below
    } else {
        AnchorEdge::Above
    };
    let top = match edge {
        AnchorEdge::Above => above_top,
        AnchorEdge::Below => anchor.y + metrics.gap,
    };

    PanelPlacement {
        left: clamp_left(anchor.x - panel.width / 2.0, panel.width, viewport, metrics),
        top,
        edge,
        growth_origin: edge.growth_origin(),
    }
}

/// Clamp the left edge so the panel doesn't overflow the viewport.
fn clamp_left(left: f64, width: f64, viewport: PixelSize, metrics: PlacementMetrics) -> f64 {
    let min = metrics.margin;
    let max = viewport.width - width - metrics.margin;
    // `f64::clamp` panics on a NaN bound.
    if max.is_nan() || min.is_nan() || max < min || left.is_nan() {
        return min;
    }
    left.clamp(min, max)
}
