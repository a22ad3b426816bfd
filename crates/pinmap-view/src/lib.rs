#![forbid(unsafe_code)]

//! Pinmap View
//!
//! Composes the layout and runtime crates into one map's on-screen state.
//!
//! # Key Components
//!
//! - [`MapView`] - floor cards, marker recomputation, pointer handling, placement mode
//! - [`FloorCard`] - one floor image with its frame tracker and resolved markers
//! - [`Tooltips`] - hover and pinned panel lifecycle over one overlay layer
//! - [`ViewConfig`] - panel size, hit radius, and tracker and placement tunables
//!
//! # Role in Pinmap
//! The view owns no records. It reads the pipeline's collections, asks the
//! host for measurements, and reports clicks back as selections or
//! placement seeds for the host to feed into the pipeline.

pub mod card;
pub mod config;
pub mod map_view;
pub mod tooltip;

pub use card::{FloorCard, Marker};
pub use config::{DEFAULT_HIT_RADIUS, DEFAULT_PANEL_SIZE, ViewConfig};
pub use map_view::{ClickOutcome, MapView, ViewMode};
pub use tooltip::{Selection, Tooltips};
