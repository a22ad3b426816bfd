#![forbid(unsafe_code)]

//! Layout: turning normalized pin anchors into pixels, and placing floating
//! panels next to them.
//!
//! # Role in Pinmap
//! - [`resolver`]: normalized `(x, y)` plus a measured [`ImageFrame`] gives a
//!   marker position, and the inverse mapping for placement clicks.
//! - [`placement`]: anchor point plus panel size gives a panel position that
//!   stays inside the viewport.
//! - [`overlay`]: an always-on-top layer holding the hover and pinned panels.
//!
//! Everything here is pure geometry. Measurement and recomputation triggers
//! live in `pinmap-runtime`.
//!
//! [`ImageFrame`]: pinmap_core::ImageFrame

pub mod overlay;
pub mod placement;
pub mod resolver;

pub use overlay::{OverlayLayer, OverlayPanel, PanelSlot};
pub use placement::{AnchorEdge, GrowthOrigin, PanelPlacement, PlacementMetrics, place};
pub use resolver::{MarkerPlacement, Origin, ResolveMode, Resolver, resolve, unresolve};
