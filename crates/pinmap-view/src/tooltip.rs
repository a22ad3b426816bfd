#![forbid(unsafe_code)]

//! Hover and pinned detail panels.
//!
//! Both panels are placed by the same planner and live in one
//! [`OverlayLayer`]; they differ only in lifecycle:
//!
//! ```text
//! hover:   pointer enters marker ──► open      pointer leaves ──► close
//! pinned:  click on marker ──► open   dismiss / click outside ──► close
//! ```
//!
//! Pinning and dismissing are announced on the [`EventBus`] as
//! `AnnotationSelected`. Selections published by other components arrive
//! through [`Tooltips::take_external`]; this controller's own
//! announcements are filtered out there so they are not applied twice.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use pinmap_core::{AnnotationId, BusEvent, FloorId, PixelPoint, PixelSize};
use pinmap_layout::{OverlayLayer, PanelSlot, PlacementMetrics};
use pinmap_runtime::{BusSubscription, EventBus};
use tracing::debug;

/// A selection announced by some other component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub floor: FloorId,
    pub annotation: Option<AnnotationId>,
}

/// Tooltip lifecycle over one overlay layer.
#[derive(Debug)]
pub struct Tooltips {
    overlay: OverlayLayer<AnnotationId>,
    panel_size: PixelSize,
    pinned_floor: Option<FloorId>,
    bus: EventBus,
    inbox: Rc<RefCell<VecDeque<BusEvent>>>,
    echoes: VecDeque<BusEvent>,
    _subscription: BusSubscription,
}

impl Tooltips {
    #[must_use]
    pub fn new(
        viewport: PixelSize,
        metrics: PlacementMetrics,
        panel_size: PixelSize,
        bus: EventBus,
    ) -> Self {
        let inbox = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&inbox);
        let subscription = bus.subscribe(move |event| {
            if matches!(event, BusEvent::AnnotationSelected { .. }) {
                sink.borrow_mut().push_back(event.clone());
            }
        });
        Self {
            overlay: OverlayLayer::new(viewport, metrics),
            panel_size,
            pinned_floor: None,
            bus,
            inbox,
            echoes: VecDeque::new(),
            _subscription: subscription,
        }
    }

    #[must_use]
    pub const fn overlay(&self) -> &OverlayLayer<AnnotationId> {
        &self.overlay
    }

    #[must_use]
    pub fn pinned(&self) -> Option<&AnnotationId> {
        self.overlay.key(PanelSlot::Pinned)
    }

    #[must_use]
    pub fn hovered(&self) -> Option<&AnnotationId> {
        self.overlay.key(PanelSlot::Hover)
    }

    /// True when `point` lands on an open panel.
    #[must_use]
    pub fn contains(&self, point: PixelPoint) -> bool {
        self.overlay.hit(point).is_some()
    }

    /// Pointer entered a marker. A marker that is already pinned gets no
    /// second panel.
    pub fn hover_enter(&mut self, id: AnnotationId, anchor: PixelPoint) {
        if self.pinned() == Some(&id) {
            return;
        }
        self.overlay
            .show(PanelSlot::Hover, id, anchor, self.panel_size);
    }

    /// Pointer left a marker.
    pub fn hover_leave(&mut self, id: &AnnotationId) {
        self.overlay.hide_if(PanelSlot::Hover, id);
    }

    /// Open the pinned panel on `id` and announce the selection.
    pub fn pin(&mut self, floor: FloorId, id: AnnotationId, anchor: PixelPoint) {
        if self.pinned() == Some(&id) {
            return;
        }
        self.show_pinned(floor.clone(), id.clone(), anchor);
        self.announce(floor, Some(id));
    }

    /// Close the pinned panel and announce the dismissal. Returns false
    /// when nothing was pinned.
    pub fn dismiss(&mut self) -> bool {
        let Some(floor) = self.close_pinned() else {
            return false;
        };
        self.announce(floor, None);
        true
    }

    /// Apply a selection from elsewhere without re-announcing it. `anchor`
    /// is `None` when the selected marker is not visible.
    pub fn apply(&mut self, selection: &Selection, anchor: Option<PixelPoint>) {
        match (&selection.annotation, anchor) {
            (Some(id), Some(anchor)) => {
                if self.pinned() != Some(id) {
                    self.show_pinned(selection.floor.clone(), id.clone(), anchor);
                }
            }
            (Some(id), None) => debug!(annotation = %id, "selected pin is not visible"),
            (None, _) => {
                if self.pinned_floor.as_ref() == Some(&selection.floor) {
                    self.close_pinned();
                }
            }
        }
    }

    /// Keep panels on `id` attached to its marker. A marker that lost its
    /// frame closes them.
    pub fn follow(&mut self, id: &AnnotationId, anchor: Option<PixelPoint>) {
        for slot in [PanelSlot::Pinned, PanelSlot::Hover] {
            if self.overlay.key(slot) != Some(id) {
                continue;
            }
            match anchor {
                Some(anchor) => {
                    self.overlay.move_anchor(slot, anchor);
                }
                None if slot == PanelSlot::Pinned => {
                    self.dismiss();
                }
                None => {
                    self.overlay.hide(slot);
                }
            }
        }
    }

    /// The annotation is gone; close its panels.
    pub fn forget(&mut self, id: &AnnotationId) {
        self.overlay.hide_if(PanelSlot::Hover, id);
        if self.pinned() == Some(id) {
            self.dismiss();
        }
    }

    /// Re-place open panels for a scrolled or resized viewport.
    pub fn reflow(&mut self, viewport: PixelSize) {
        self.overlay.reflow(viewport);
    }

    /// Selections published by other components since the last call.
    pub fn take_external(&mut self) -> Vec<Selection> {
        let events: Vec<BusEvent> = self.inbox.borrow_mut().drain(..).collect();
        let mut selections = Vec::new();
        for event in events {
            if self.echoes.front() == Some(&event) {
                self.echoes.pop_front();
                continue;
            }
            if let BusEvent::AnnotationSelected { floor, annotation } = event {
                selections.push(Selection { floor, annotation });
            }
        }
        selections
    }

    fn show_pinned(&mut self, floor: FloorId, id: AnnotationId, anchor: PixelPoint) {
        self.overlay.hide_if(PanelSlot::Hover, &id);
        debug!(annotation = %id, "tooltip pinned");
        self.overlay
            .show(PanelSlot::Pinned, id, anchor, self.panel_size);
        self.pinned_floor = Some(floor);
    }

    fn close_pinned(&mut self) -> Option<FloorId> {
        let panel = self.overlay.hide(PanelSlot::Pinned)?;
        debug!(annotation = %panel.key, "tooltip dismissed");
        self.pinned_floor.take()
    }

    fn announce(&mut self, floor: FloorId, annotation: Option<AnnotationId>) {
        let event = BusEvent::AnnotationSelected { floor, annotation };
        self.echoes.push_back(event.clone());
        self.bus.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use pretty_assertions::assert_eq;

    const VIEWPORT: PixelSize = PixelSize::new(1024.0, 768.0);
    const PANEL: PixelSize = PixelSize::new(200.0, 100.0);

    fn tooltips(bus: &EventBus) -> Tooltips {
        Tooltips::new(VIEWPORT, PlacementMetrics::default(), PANEL, bus.clone())
    }

    fn a(id: &str) -> AnnotationId {
        AnnotationId::stored(id)
    }

    fn f1() -> FloorId {
        FloorId::stored("f1")
    }

    #[test]
    fn hover_opens_and_closes_with_pointer() {
        let mut tips = tooltips(&EventBus::new());
        tips.hover_enter(a("a1"), PixelPoint::new(400.0, 400.0));
        assert_eq!(tips.hovered(), Some(&a("a1")));
        tips.hover_leave(&a("a2"));
        assert_eq!(tips.hovered(), Some(&a("a1")));
        tips.hover_leave(&a("a1"));
        assert!(tips.overlay().is_empty());
    }

    #[test]
    fn pin_announces_and_replaces_hover() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        let mut tips = tooltips(&bus);

        tips.hover_enter(a("a1"), PixelPoint::new(400.0, 400.0));
        tips.pin(f1(), a("a1"), PixelPoint::new(400.0, 400.0));
        assert_eq!(tips.pinned(), Some(&a("a1")));
        assert_eq!(tips.hovered(), None);

        tips.hover_enter(a("a1"), PixelPoint::new(400.0, 400.0));
        assert_eq!(tips.hovered(), None);

        assert!(tips.dismiss());
        assert!(!tips.dismiss());
        assert_eq!(
            *seen.borrow(),
            vec![
                BusEvent::AnnotationSelected {
                    floor: f1(),
                    annotation: Some(a("a1")),
                },
                BusEvent::AnnotationSelected {
                    floor: f1(),
                    annotation: None,
                },
            ]
        );
    }

    #[test]
    fn own_announcements_are_not_external() {
        let bus = EventBus::new();
        let mut tips = tooltips(&bus);
        tips.pin(f1(), a("a1"), PixelPoint::new(400.0, 400.0));
        bus.publish(BusEvent::AnnotationSelected {
            floor: f1(),
            annotation: Some(a("a9")),
        });

        assert_eq!(
            tips.take_external(),
            vec![Selection {
                floor: f1(),
                annotation: Some(a("a9")),
            }]
        );
        assert!(tips.take_external().is_empty());
    }

    #[test]
    fn applied_selection_is_silent() {
        let bus = EventBus::new();
        let published = Rc::new(Cell::new(0));
        let count = Rc::clone(&published);
        let _sub = bus.subscribe(move |_| count.set(count.get() + 1));
        let mut tips = tooltips(&bus);

        let selection = Selection {
            floor: f1(),
            annotation: Some(a("a1")),
        };
        tips.apply(&selection, Some(PixelPoint::new(400.0, 400.0)));
        assert_eq!(tips.pinned(), Some(&a("a1")));
        tips.apply(
            &Selection {
                floor: f1(),
                annotation: None,
            },
            None,
        );
        assert_eq!(tips.pinned(), None);
        assert_eq!(published.get(), 0);
    }

    #[test]
    fn follow_moves_or_closes() {
        let mut tips = tooltips(&EventBus::new());
        tips.pin(f1(), a("a1"), PixelPoint::new(400.0, 400.0));
        tips.follow(&a("a1"), Some(PixelPoint::new(500.0, 400.0)));
        let panel = tips.overlay().get(PanelSlot::Pinned).map(|p| p.anchor);
        assert_eq!(panel, Some(PixelPoint::new(500.0, 400.0)));

        tips.follow(&a("a1"), None);
        assert_eq!(tips.pinned(), None);
    }

    #[test]
    fn forgetting_the_pinned_pin_closes_it() {
        let mut tips = tooltips(&EventBus::new());
        tips.pin(f1(), a("a1"), PixelPoint::new(400.0, 400.0));
        tips.hover_enter(a("a2"), PixelPoint::new(300.0, 300.0));
        tips.forget(&a("a1"));
        assert_eq!(tips.pinned(), None);
        assert_eq!(tips.hovered(), Some(&a("a2")));
    }

    #[test]
    fn panel_hit_detects_clicks_inside() {
        let mut tips = tooltips(&EventBus::new());
        tips.pin(f1(), a("a1"), PixelPoint::new(400.0, 400.0));
        // Above the anchor: bottom edge at 390, 200 wide, centered.
        assert!(tips.contains(PixelPoint::new(400.0, 350.0)));
        assert!(!tips.contains(PixelPoint::new(400.0, 450.0)));
    }
}
