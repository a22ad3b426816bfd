#![forbid(unsafe_code)]

//! One floor image with its tracked frame and resolved markers.
//!
//! # Invariants
//!
//! 1. `markers` were resolved against the tracker's frame at
//!    `resolved_at`; [`FloorCard::is_stale`] reports a newer frame.
//! 2. A marker without a frame is [`MarkerPlacement::Hidden`] and has no
//!    anchor; it is never drawn at the origin.
//! 3. The animation poll lives exactly as long as the card holds its
//!    [`PollGuard`]; dropping the card cancels it.

use pinmap_core::{Annotation, AnnotationId, Floor, FloorId, ImageFrame, PixelPoint, Position};
use pinmap_layout::{MarkerPlacement, Origin, Resolver, resolve, unresolve};
use pinmap_runtime::{EventBus, FrameTracker, PollGuard, TrackerConfig};
use tracing::debug;
use web_time::Duration;

/// A resolved pin marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: AnnotationId,
    pub title: String,
    /// Optimistic entry awaiting confirmation.
    pub pending: bool,
    /// Where to draw, in the resolver's origin.
    pub placement: MarkerPlacement,
    /// Viewport point tooltips anchor to.
    pub anchor: Option<PixelPoint>,
}

/// A floor image, its frame tracker, and its markers.
#[derive(Debug)]
pub struct FloorCard {
    floor: Floor,
    tracker: FrameTracker,
    markers: Vec<Marker>,
    resolved_at: Option<u64>,
    animation: Option<PollGuard>,
}

impl FloorCard {
    #[must_use]
    pub fn new(floor: Floor, config: TrackerConfig, bus: &EventBus) -> Self {
        let mut tracker = FrameTracker::with_image(config, floor.image.clone());
        tracker.connect_bus(bus);
        Self {
            floor,
            tracker,
            markers: Vec::new(),
            resolved_at: None,
            animation: None,
        }
    }

    #[must_use]
    pub const fn floor(&self) -> &Floor {
        &self.floor
    }

    #[must_use]
    pub const fn id(&self) -> &FloorId {
        &self.floor.id
    }

    /// Replace the floor record, swapping the tracked image if it changed.
    pub fn set_floor(&mut self, floor: Floor) {
        self.tracker.set_image(floor.image.clone());
        self.floor = floor;
    }

    #[must_use]
    pub const fn tracker(&self) -> &FrameTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut FrameTracker {
        &mut self.tracker
    }

    #[must_use]
    pub fn frame(&self) -> Option<ImageFrame> {
        self.tracker.frame()
    }

    #[must_use]
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    #[must_use]
    pub fn marker(&self, id: &AnnotationId) -> Option<&Marker> {
        self.markers.iter().find(|m| &m.id == id)
    }

    /// The frame changed since markers were last resolved.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.resolved_at != Some(self.tracker.version())
    }

    /// Resolve this floor's annotations against the current frame.
    pub fn resolve(&mut self, resolver: &Resolver, annotations: &[Annotation]) {
        let frame = self.tracker.frame();
        self.markers = annotations
            .iter()
            .filter(|a| a.floor_id == self.floor.id)
            .map(|a| Marker {
                id: a.id.clone(),
                title: a.title.clone(),
                pending: a.pending,
                placement: resolver.resolve(a.position, frame.as_ref()),
                anchor: resolve(a.position, frame.as_ref(), Origin::Viewport).point(),
            })
            .collect();
        self.resolved_at = Some(self.tracker.version());
    }

    /// Topmost visible marker within `radius` of a viewport point.
    #[must_use]
    pub fn marker_at(&self, point: PixelPoint, radius: f64) -> Option<&Marker> {
        self.markers
            .iter()
            .rev()
            .filter_map(|m| m.anchor.map(|anchor| (m, anchor.distance(point))))
            .filter(|(_, distance)| *distance <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(m, _)| m)
    }

    /// Normalized position of a viewport point inside the image, if it
    /// lands on it.
    #[must_use]
    pub fn position_at(&self, point: PixelPoint) -> Option<Position> {
        let frame = self.tracker.frame()?;
        if !frame.image.contains(point) {
            return None;
        }
        unresolve(point, &frame, Origin::Viewport)
    }

    /// Start re-measuring on every animation poll until
    /// [`end_animation`](Self::end_animation).
    pub fn start_animation(&mut self, now: Duration) {
        self.animation = Some(self.tracker.start_animation(now));
    }

    pub fn end_animation(&mut self) {
        if let Some(guard) = self.animation.take() {
            guard.cancel();
        }
        self.tracker.end_animation();
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.animation.is_some() && self.tracker.is_animating()
    }
}

impl Drop for FloorCard {
    fn drop(&mut self) {
        if self.animation.is_some() {
            debug!(floor = %self.floor.id, "card dropped, cancelling animation poll");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinmap_core::{ImageRef, MapId, PixelRect};
    use pinmap_layout::ResolveMode;
    use pinmap_runtime::{FrameTrigger, Measurement};
    use pretty_assertions::assert_eq;

    fn floor(id: &str) -> Floor {
        Floor {
            id: FloorId::stored(id),
            map_id: MapId::new("m1"),
            number: 1,
            name: "Ground".into(),
            image: Some(ImageRef::new(format!("{id}.png"))),
            pending: false,
        }
    }

    fn pin(id: &str, floor: &str, x: f64, y: f64) -> Annotation {
        Annotation {
            id: AnnotationId::stored(id),
            floor_id: FloorId::stored(floor),
            title: id.to_uppercase(),
            description: String::new(),
            position: Position::new(x, y),
            image: None,
            author: None,
            pending: false,
        }
    }

    fn measured_card() -> FloorCard {
        let mut card = FloorCard::new(floor("f1"), TrackerConfig::default(), &EventBus::new());
        card.tracker_mut().observe(
            FrameTrigger::ImageLoad,
            Measurement::at_viewport(PixelRect::new(100.0, 50.0, 600.0, 480.0)),
        );
        card
    }

    #[test]
    fn resolves_only_its_own_floor() {
        let mut card = measured_card();
        let pins = [pin("a1", "f1", 50.0, 50.0), pin("a2", "f2", 10.0, 10.0)];
        card.resolve(&Resolver::default(), &pins);

        assert_eq!(card.markers().len(), 1);
        assert_eq!(card.markers()[0].anchor, Some(PixelPoint::new(400.0, 290.0)));
        assert!(!card.is_stale());
    }

    #[test]
    fn unmeasured_card_hides_markers() {
        let mut card = FloorCard::new(floor("f1"), TrackerConfig::default(), &EventBus::new());
        card.resolve(
            &Resolver::new(ResolveMode::Carousel, Origin::Container),
            &[pin("a1", "f1", 50.0, 50.0)],
        );
        assert_eq!(card.markers()[0].placement, MarkerPlacement::Hidden);
        assert_eq!(card.markers()[0].anchor, None);
    }

    #[test]
    fn new_frame_makes_markers_stale() {
        let mut card = measured_card();
        card.resolve(&Resolver::default(), &[]);
        card.tracker_mut().observe(
            FrameTrigger::Resize,
            Measurement::at_viewport(PixelRect::new(0.0, 0.0, 300.0, 240.0)),
        );
        assert!(card.is_stale());
    }

    #[test]
    fn marker_hit_prefers_nearest() {
        let mut card = measured_card();
        card.resolve(
            &Resolver::default(),
            &[pin("a1", "f1", 50.0, 50.0), pin("a2", "f1", 51.0, 50.0)],
        );
        let hit = card.marker_at(PixelPoint::new(407.0, 290.0), 12.0);
        assert_eq!(hit.map(|m| m.id.clone()), Some(AnnotationId::stored("a2")));
        assert!(card.marker_at(PixelPoint::new(10.0, 10.0), 12.0).is_none());
    }

    #[test]
    fn position_at_inverts_resolution() {
        let card = measured_card();
        assert_eq!(
            card.position_at(PixelPoint::new(400.0, 290.0)),
            Some(Position::new(50.0, 50.0))
        );
        assert_eq!(card.position_at(PixelPoint::new(20.0, 20.0)), None);
    }

    #[test]
    fn ending_animation_cancels_poll() {
        let mut card = measured_card();
        card.start_animation(Duration::ZERO);
        assert!(card.is_animating());
        card.end_animation();
        assert!(!card.is_animating());
        assert!(!card.tracker_mut().poll_due(Duration::from_secs(1)));
    }
}
