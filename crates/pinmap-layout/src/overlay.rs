#![forbid(unsafe_code)]

//! Overlay layer for floating pin panels.
//!
//! The layer sits above all content at a fixed z-order and owns the
//! placement of at most one panel per [`PanelSlot`]. Components request a
//! panel by anchor point and estimated size; the layer runs the placement
//! planner and re-runs it whenever the viewport changes.
//!
//! # Invariants
//!
//! 1. Each slot holds at most one panel. Showing a panel in an occupied slot
//!    replaces it.
//! 2. Every stored placement was computed against the current viewport:
//!    [`OverlayLayer::reflow`] recomputes all of them.
//! 3. [`OverlayLayer::panels`] yields panels bottom-to-top.

use pinmap_core::{PixelPoint, PixelRect, PixelSize};

use crate::placement::{PanelPlacement, PlacementMetrics, place};

/// Base z-index of the overlay layer. Slots stack above it.
pub const OVERLAY_Z_INDEX: i32 = 1000;

/// Lifecycle slot of a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PanelSlot {
    /// Persistent panel opened by a click; closed on dismiss or outside click.
    Pinned,
    /// Ephemeral preview shown while the pointer rests on a marker.
    Hover,
}

impl PanelSlot {
    /// Stacking index within the layer.
    #[must_use]
    pub const fn z_index(self) -> i32 {
        match self {
            Self::Pinned => OVERLAY_Z_INDEX + 1,
            Self::Hover => OVERLAY_Z_INDEX + 2,
        }
    }
}

/// A placed panel.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPanel<K> {
    pub key: K,
    pub slot: PanelSlot,
    pub anchor: PixelPoint,
    pub size: PixelSize,
    pub placement: PanelPlacement,
}

impl<K> OverlayPanel<K> {
    /// Panel box in viewport pixels.
    #[must_use]
    pub fn rect(&self) -> PixelRect {
        self.placement.rect(self.size)
    }
}

/// The always-on-top layer holding hover and pinned panels.
#[derive(Debug, Clone)]
pub struct OverlayLayer<K> {
    viewport: PixelSize,
    metrics: PlacementMetrics,
    pinned: Option<OverlayPanel<K>>,
    hover: Option<OverlayPanel<K>>,
}

impl<K: Clone + PartialEq> OverlayLayer<K> {
    #[must_use]
    pub fn new(viewport: PixelSize, metrics: PlacementMetrics) -> Self {
        Self {
            viewport,
            metrics,
            pinned: None,
            hover: None,
        }
    }

    #[must_use]
    pub const fn viewport(&self) -> PixelSize {
        self.viewport
    }

    #[must_use]
    pub const fn metrics(&self) -> PlacementMetrics {
        self.metrics
    }

    fn slot_mut(&mut self, slot: PanelSlot) -> &mut Option<OverlayPanel<K>> {
        match slot {
            PanelSlot::Pinned => &mut self.pinned,
            PanelSlot::Hover => &mut self.hover,
        }
    }

    /// Panel currently in `slot`.
    #[must_use]
    pub fn get(&self, slot: PanelSlot) -> Option<&OverlayPanel<K>> {
        match slot {
            PanelSlot::Pinned => self.pinned.as_ref(),
            PanelSlot::Hover => self.hover.as_ref(),
        }
    }

    /// Key of the panel in `slot`.
    #[must_use]
    pub fn key(&self, slot: PanelSlot) -> Option<&K> {
        self.get(slot).map(|panel| &panel.key)
    }

    /// Place a panel in `slot`, replacing any previous occupant.
    pub fn show(
        &mut self,
        slot: PanelSlot,
        key: K,
        anchor: PixelPoint,
        size: PixelSize,
    ) -> &OverlayPanel<K> {
        let placement = place(anchor, self.viewport, size, self.metrics);
        self.slot_mut(slot).insert(OverlayPanel {
            key,
            slot,
            anchor,
            size,
            placement,
        })
    }

    /// Follow a moved anchor. Returns false when the slot is empty.
    pub fn move_anchor(&mut self, slot: PanelSlot, anchor: PixelPoint) -> bool {
        let viewport = self.viewport;
        let metrics = self.metrics;
        match self.slot_mut(slot) {
            Some(panel) => {
                panel.anchor = anchor;
                panel.placement = place(anchor, viewport, panel.size, metrics);
                true
            }
            None => false,
        }
    }

    /// Close the panel in `slot`, returning it.
    pub fn hide(&mut self, slot: PanelSlot) -> Option<OverlayPanel<K>> {
        self.slot_mut(slot).take()
    }

    /// Close `slot` only if it currently shows `key`.
    pub fn hide_if(&mut self, slot: PanelSlot, key: &K) -> Option<OverlayPanel<K>> {
        if self.key(slot) == Some(key) {
            self.hide(slot)
        } else {
            None
        }
    }

    /// Close every panel showing `key`.
    pub fn hide_key(&mut self, key: &K) {
        self.hide_if(PanelSlot::Pinned, key);
        self.hide_if(PanelSlot::Hover, key);
    }

    /// Recompute all placements for a new viewport (scroll or resize).
    pub fn reflow(&mut self, viewport: PixelSize) {
        self.viewport = viewport;
        let metrics = self.metrics;
        for panel in [&mut self.pinned, &mut self.hover].into_iter().flatten() {
            panel.placement = place(panel.anchor, viewport, panel.size, metrics);
        }
    }

    /// Panels in z-order, bottom first.
    pub fn panels(&self) -> impl Iterator<Item = &OverlayPanel<K>> {
        self.pinned.iter().chain(self.hover.iter())
    }

    /// Topmost open panel containing `point`.
    #[must_use]
    pub fn hit(&self, point: PixelPoint) -> Option<PanelSlot> {
        self.panels()
            .filter(|panel| panel.rect().contains(point))
            .last()
            .map(|panel| panel.slot)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pinned.is_none() && self.hover.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::AnchorEdge;
    use pretty_assertions::assert_eq;

    fn layer() -> OverlayLayer<&'static str> {
        OverlayLayer::new(PixelSize::new(1024.0, 768.0), PlacementMetrics::default())
    }

    const PANEL: PixelSize = PixelSize::new(200.0, 100.0);

    #[test]
    fn slots_are_independent() {
        let mut overlay = layer();
        overlay.show(PanelSlot::Pinned, "a", PixelPoint::new(500.0, 400.0), PANEL);
        overlay.show(PanelSlot::Hover, "b", PixelPoint::new(300.0, 60.0), PANEL);

        assert_eq!(overlay.key(PanelSlot::Pinned), Some(&"a"));
        assert_eq!(overlay.key(PanelSlot::Hover), Some(&"b"));
        assert_eq!(
            overlay.get(PanelSlot::Hover).map(|p| p.placement.edge),
            Some(AnchorEdge::Below)
        );
        assert_eq!(
            overlay.get(PanelSlot::Pinned).map(|p| p.placement.edge),
            Some(AnchorEdge::Above)
        );
    }

    #[test]
    fn show_replaces_occupant() {
        let mut overlay = layer();
        overlay.show(PanelSlot::Hover, "a", PixelPoint::new(500.0, 400.0), PANEL);
        overlay.show(PanelSlot::Hover, "b", PixelPoint::new(500.0, 400.0), PANEL);
        assert_eq!(overlay.panels().count(), 1);
        assert_eq!(overlay.key(PanelSlot::Hover), Some(&"b"));
    }

    #[test]
    fn z_order_is_pinned_then_hover() {
        let mut overlay = layer();
        overlay.show(PanelSlot::Hover, "h", PixelPoint::new(500.0, 400.0), PANEL);
        overlay.show(PanelSlot::Pinned, "p", PixelPoint::new(500.0, 400.0), PANEL);
        let keys: Vec<_> = overlay.panels().map(|p| p.key).collect();
        assert_eq!(keys, vec!["p", "h"]);
        assert!(PanelSlot::Hover.z_index() > PanelSlot::Pinned.z_index());
        assert!(PanelSlot::Pinned.z_index() > OVERLAY_Z_INDEX);
    }

    #[test]
    fn reflow_reclamps_to_new_viewport() {
        let mut overlay = layer();
        overlay.show(PanelSlot::Pinned, "a", PixelPoint::new(900.0, 400.0), PANEL);
        assert_eq!(overlay.get(PanelSlot::Pinned).map(|p| p.placement.left), Some(800.0));

        overlay.reflow(PixelSize::new(600.0, 768.0));
        // max left = 600 - 200 - 10
        assert_eq!(overlay.get(PanelSlot::Pinned).map(|p| p.placement.left), Some(390.0));
        assert_eq!(overlay.viewport(), PixelSize::new(600.0, 768.0));
    }

    #[test]
    fn move_anchor_replaces_placement() {
        let mut overlay = layer();
        assert!(!overlay.move_anchor(PanelSlot::Hover, PixelPoint::new(0.0, 0.0)));
        overlay.show(PanelSlot::Hover, "a", PixelPoint::new(500.0, 400.0), PANEL);
        assert!(overlay.move_anchor(PanelSlot::Hover, PixelPoint::new(500.0, 50.0)));
        let panel = overlay.get(PanelSlot::Hover).unwrap();
        assert_eq!(panel.anchor, PixelPoint::new(500.0, 50.0));
        assert_eq!(panel.placement.edge, AnchorEdge::Below);
    }

    #[test]
    fn hide_if_checks_key() {
        let mut overlay = layer();
        overlay.show(PanelSlot::Hover, "a", PixelPoint::new(500.0, 400.0), PANEL);
        assert!(overlay.hide_if(PanelSlot::Hover, &"b").is_none());
        assert!(overlay.hide_if(PanelSlot::Hover, &"a").is_some());
        assert!(overlay.is_empty());
    }

    #[test]
    fn hide_key_clears_both_slots() {
        let mut overlay = layer();
        overlay.show(PanelSlot::Hover, "a", PixelPoint::new(500.0, 400.0), PANEL);
        overlay.show(PanelSlot::Pinned, "a", PixelPoint::new(500.0, 400.0), PANEL);
        overlay.hide_key(&"a");
        assert!(overlay.is_empty());
    }

    #[test]
    fn hit_prefers_topmost() {
        let mut overlay = layer();
        overlay.show(PanelSlot::Pinned, "p", PixelPoint::new(500.0, 400.0), PANEL);
        overlay.show(PanelSlot::Hover, "h", PixelPoint::new(500.0, 400.0), PANEL);
        assert_eq!(overlay.hit(PixelPoint::new(500.0, 340.0)), Some(PanelSlot::Hover));
        overlay.hide(PanelSlot::Hover);
        assert_eq!(overlay.hit(PixelPoint::new(500.0, 340.0)), Some(PanelSlot::Pinned));
        assert_eq!(overlay.hit(PixelPoint::new(5.0, 5.0)), None);
    }
}
