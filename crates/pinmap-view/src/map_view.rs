#![forbid(unsafe_code)]

//! Composition of one map: floor cards, marker layout, tooltips, and pin
//! placement.
//!
//! # Design
//!
//! The view is driven by its host like every other runtime component:
//!
//! ```text
//! sync(pipeline) ───────────► floors changed?      rebuild cards
//!                             annotations changed? re-resolve every card
//! pending_measurements() ───► host measures ──► observe(floor, ..)
//!                                               frame changed? re-resolve card
//! tick(now) ────────────────► animation polls make cards dirty
//! pointer_move / click ─────► hover, pin, dismiss, placement seed
//! ```
//!
//! Markers are recomputed on every frame change, on every collection
//! change, and, while a pin is being placed, on every pointer move.
//!
//! # Invariants
//!
//! 1. One card per floor in the collection, in collection order. A card is
//!    dropped, and its animation poll cancelled, when its floor leaves the
//!    collection.
//! 2. Open panels always point at a resolved marker: they follow the marker
//!    when it moves and close when it disappears.
//! 3. Only the active card takes pointer input. In carousel mode the other
//!    cards stay mounted and measured.

use std::sync::Arc;

use pinmap_core::{Annotation, AnnotationDraft, AnnotationId, Floor, FloorId, PixelPoint, PixelSize};
use pinmap_layout::{Origin, ResolveMode, Resolver};
use pinmap_runtime::{EventBus, FrameTrigger, Measurement, MutationPipeline, TrackOutcome};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use web_time::Duration;

use crate::card::{FloorCard, Marker};
use crate::config::ViewConfig;
use crate::tooltip::{Selection, Tooltips};

/// How floors are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    /// One floor at a time.
    #[default]
    Single,
    /// Stacked floor cards; the active one is in front.
    Carousel,
    /// One floor under a zoom/pan transform.
    ZoomPan,
}

impl ViewMode {
    #[must_use]
    pub const fn resolve_mode(self) -> ResolveMode {
        match self {
            Self::Single => ResolveMode::Plain,
            Self::Carousel => ResolveMode::Carousel,
            Self::ZoomPan => ResolveMode::ZoomPan,
        }
    }
}

/// What a click did.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// A marker was clicked and its panel pinned.
    Selected(AnnotationId),
    /// The pinned panel was closed by a click outside it.
    Dismissed,
    /// Placement mode: a new pin should be created here. Title and
    /// description are left for the user to fill in.
    PlacementSeed { floor: FloorId, draft: AnnotationDraft },
    /// Nothing happened.
    Ignored,
}

/// One map's view state.
#[derive(Debug)]
pub struct MapView {
    config: ViewConfig,
    mode: ViewMode,
    resolver: Resolver,
    bus: EventBus,
    cards: Vec<FloorCard>,
    active: usize,
    tooltips: Tooltips,
    annotations: Arc<Vec<Annotation>>,
    floors_seen: Option<u64>,
    annotations_seen: Option<u64>,
    placing: bool,
}

impl MapView {
    #[must_use]
    pub fn new(config: ViewConfig, viewport: PixelSize, bus: EventBus) -> Self {
        let tooltips = Tooltips::new(viewport, config.metrics, config.panel_size, bus.clone());
        Self {
            config,
            mode: ViewMode::default(),
            resolver: Resolver::new(ViewMode::default().resolve_mode(), Origin::Container),
            bus,
            cards: Vec::new(),
            active: 0,
            tooltips,
            annotations: Arc::new(Vec::new()),
            floors_seen: None,
            annotations_seen: None,
            placing: false,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> ViewMode {
        self.mode
    }

    #[must_use]
    pub fn cards(&self) -> &[FloorCard] {
        &self.cards
    }

    #[must_use]
    pub fn card(&self, floor: &FloorId) -> Option<&FloorCard> {
        self.cards.iter().find(|c| c.id() == floor)
    }

    #[must_use]
    pub fn active_card(&self) -> Option<&FloorCard> {
        self.cards.get(self.active)
    }

    #[must_use]
    pub const fn active_index(&self) -> usize {
        self.active
    }

    /// Markers of `floor`, empty for an unknown floor.
    #[must_use]
    pub fn markers(&self, floor: &FloorId) -> &[Marker] {
        self.card(floor).map(FloorCard::markers).unwrap_or_default()
    }

    #[must_use]
    pub const fn tooltips(&self) -> &Tooltips {
        &self.tooltips
    }

    #[must_use]
    pub const fn is_placing(&self) -> bool {
        self.placing
    }

    /// Pick up collection changes from the pipeline. Returns true when
    /// markers were recomputed.
    pub fn sync(&mut self, pipeline: &MutationPipeline) -> bool {
        let floors = pipeline.floors();
        let annotations = pipeline.annotations();
        let floors_changed = self.floors_seen != Some(floors.version());
        let annotations_changed = self.annotations_seen != Some(annotations.version());

        if floors_changed {
            self.rebuild_cards(floors.snapshot().as_slice());
            self.floors_seen = Some(floors.version());
        }
        if annotations_changed {
            self.annotations = annotations.snapshot();
            self.annotations_seen = Some(annotations.version());
        }

        let recomputed = if floors_changed || annotations_changed {
            self.resolve_all();
            self.drop_orphaned_panels();
            true
        } else {
            self.resolve_stale()
        };
        self.apply_external_selections();
        recomputed
    }

    fn rebuild_cards(&mut self, floors: &[Floor]) {
        let active = self.active_card().map(|c| c.id().clone());
        let mut old = std::mem::take(&mut self.cards);
        for floor in floors {
            let card = match old.iter().position(|c| c.id() == &floor.id) {
                Some(index) => {
                    let mut card = old.swap_remove(index);
                    card.set_floor(floor.clone());
                    card
                }
                None => {
                    debug!(floor = %floor.id, "floor card added");
                    FloorCard::new(floor.clone(), self.config.tracker, &self.bus)
                }
            };
            self.cards.push(card);
        }
        for removed in old {
            for marker in removed.markers() {
                self.tooltips.forget(&marker.id);
            }
            info!(floor = %removed.id(), "floor card removed");
        }
        self.active = active
            .and_then(|id| self.cards.iter().position(|c| c.id() == &id))
            .unwrap_or_else(|| self.active.min(self.cards.len().saturating_sub(1)));
    }

    fn resolve_card(&mut self, index: usize) {
        let Some(card) = self.cards.get_mut(index) else {
            return;
        };
        card.resolve(&self.resolver, &self.annotations);
        for marker in card.markers() {
            self.tooltips.follow(&marker.id, marker.anchor);
        }
    }

    fn resolve_all(&mut self) {
        for index in 0..self.cards.len() {
            self.resolve_card(index);
        }
    }

    fn resolve_stale(&mut self) -> bool {
        let mut any = false;
        for index in 0..self.cards.len() {
            if self.cards[index].is_stale() {
                self.resolve_card(index);
                any = true;
            }
        }
        any
    }

    fn drop_orphaned_panels(&mut self) {
        let open: Vec<AnnotationId> = self
            .tooltips
            .overlay()
            .panels()
            .map(|panel| panel.key.clone())
            .collect();
        for id in open {
            if !self.cards.iter().any(|c| c.marker(&id).is_some()) {
                self.tooltips.forget(&id);
            }
        }
    }

    fn apply_external_selections(&mut self) {
        for selection in self.tooltips.take_external() {
            self.apply_selection(&selection);
        }
    }

    fn apply_selection(&mut self, selection: &Selection) {
        let Some(index) = self.cards.iter().position(|c| c.id() == &selection.floor) else {
            debug!(floor = %selection.floor, "selection for unknown floor");
            return;
        };
        if selection.annotation.is_some() {
            self.active = index;
        }
        let anchor = selection
            .annotation
            .as_ref()
            .and_then(|id| self.cards[index].marker(id))
            .and_then(|marker| marker.anchor);
        self.tooltips.apply(selection, anchor);
    }

    /// Floors whose image the host should measure now.
    #[must_use]
    pub fn pending_measurements(&self) -> Vec<FloorId> {
        self.cards
            .iter()
            .filter(|c| c.tracker().needs_measure())
            .map(|c| c.id().clone())
            .collect()
    }

    /// Feed a measurement for `floor`. Re-resolves the card's markers when
    /// the frame changed.
    pub fn observe(
        &mut self,
        floor: &FloorId,
        trigger: FrameTrigger,
        measurement: Measurement,
    ) -> Option<TrackOutcome> {
        let index = self.cards.iter().position(|c| c.id() == floor)?;
        let outcome = self.cards[index].tracker_mut().observe(trigger, measurement);
        if self.cards[index].is_stale() {
            self.resolve_card(index);
        }
        Some(outcome)
    }

    /// Mark every card for re-measurement.
    pub fn invalidate_all(&mut self, trigger: FrameTrigger) {
        for card in &mut self.cards {
            card.tracker_mut().invalidate(trigger);
        }
    }

    /// The window was resized.
    pub fn resize(&mut self, viewport: PixelSize) {
        self.tooltips.reflow(viewport);
        self.invalidate_all(FrameTrigger::Resize);
    }

    /// An ancestor scrolled.
    pub fn scrolled(&mut self, viewport: PixelSize) {
        self.tooltips.reflow(viewport);
        self.invalidate_all(FrameTrigger::Scroll);
    }

    /// Advance animation polls. Returns true when any card needs measuring.
    pub fn tick(&mut self, now: Duration) -> bool {
        let mut fired = false;
        for card in &mut self.cards {
            fired |= card.tracker_mut().poll_due(now);
        }
        fired
    }

    /// Earliest animation poll deadline.
    #[must_use]
    pub fn next_wakeup(&self) -> Option<Duration> {
        self.cards
            .iter()
            .filter_map(|c| c.tracker().next_wakeup())
            .min()
    }

    /// Switch presentation. Every card is re-measured.
    pub fn set_mode(&mut self, mode: ViewMode) {
        if mode == self.mode {
            return;
        }
        debug!(from = ?self.mode, to = ?mode, "view mode changed");
        if self.mode == ViewMode::Carousel {
            self.transition_finished();
        }
        self.mode = mode;
        self.resolver = Resolver::new(mode.resolve_mode(), Origin::Container);
        self.invalidate_all(FrameTrigger::Resize);
        self.resolve_all();
    }

    /// Bring card `index` to the front. In carousel mode every card
    /// animates until [`transition_finished`](Self::transition_finished).
    pub fn select_card(&mut self, index: usize, now: Duration) -> bool {
        if index >= self.cards.len() || index == self.active {
            return false;
        }
        self.active = index;
        self.tooltips.dismiss();
        if self.mode == ViewMode::Carousel {
            for card in &mut self.cards {
                card.start_animation(now);
            }
        } else if let Some(card) = self.cards.get_mut(index) {
            card.tracker_mut().invalidate(FrameTrigger::Resize);
        }
        true
    }

    pub fn next_card(&mut self, now: Duration) -> bool {
        match self.cards.len() {
            0 => false,
            len => self.select_card((self.active + 1) % len, now),
        }
    }

    pub fn previous_card(&mut self, now: Duration) -> bool {
        match self.cards.len() {
            0 => false,
            len => self.select_card((self.active + len - 1) % len, now),
        }
    }

    /// The carousel transform settled; stop polling.
    pub fn transition_finished(&mut self) {
        for card in &mut self.cards {
            card.end_animation();
        }
    }

    /// Enter placement mode. Returns false when there is no card to place on.
    pub fn begin_placement(&mut self) -> bool {
        if self.cards.is_empty() {
            return false;
        }
        self.placing = true;
        self.tooltips.dismiss();
        true
    }

    pub fn cancel_placement(&mut self) {
        self.placing = false;
    }

    /// Pointer moved to a viewport point.
    pub fn pointer_move(&mut self, point: PixelPoint) {
        self.apply_external_selections();
        let radius = self.config.hit_radius;
        let Some(card) = self.cards.get_mut(self.active) else {
            return;
        };
        if self.placing {
            card.tracker_mut().invalidate(FrameTrigger::Pointer);
        }
        let hit = card
            .marker_at(point, radius)
            .and_then(|m| m.anchor.map(|anchor| (m.id.clone(), anchor)));

        let hovered = self.tooltips.hovered().cloned();
        match (hovered, hit) {
            (Some(old), Some((id, _))) if old == id => {}
            (old, Some((id, anchor))) => {
                if let Some(old) = old {
                    self.tooltips.hover_leave(&old);
                }
                self.tooltips.hover_enter(id, anchor);
            }
            (Some(old), None) => self.tooltips.hover_leave(&old),
            (None, None) => {}
        }
    }

    /// Pointer left the view.
    pub fn pointer_leave(&mut self) {
        if let Some(old) = self.tooltips.hovered().cloned() {
            self.tooltips.hover_leave(&old);
        }
    }

    /// Click at a viewport point.
    ///
    /// In placement mode a click on the active image yields a
    /// [`ClickOutcome::PlacementSeed`] and ends placement; markers are not
    /// clickable meanwhile. Otherwise a click on a marker pins its panel, a
    /// click inside an open panel does nothing, and any other click closes
    /// the pinned panel.
    pub fn click(&mut self, point: PixelPoint) -> ClickOutcome {
        self.apply_external_selections();
        let Some(card) = self.cards.get(self.active) else {
            return ClickOutcome::Ignored;
        };

        if self.placing {
            let Some(position) = card.position_at(point) else {
                return ClickOutcome::Ignored;
            };
            let floor = card.id().clone();
            self.placing = false;
            debug!(floor = %floor, x = position.x, y = position.y, "placement seed");
            return ClickOutcome::PlacementSeed {
                floor,
                draft: AnnotationDraft::new("", "", position),
            };
        }

        if self.tooltips.contains(point) {
            return ClickOutcome::Ignored;
        }
        let hit = card
            .marker_at(point, self.config.hit_radius)
            .and_then(|m| m.anchor.map(|anchor| (m.id.clone(), anchor)));
        if let Some((id, anchor)) = hit {
            let floor = card.id().clone();
            self.tooltips.pin(floor, id.clone(), anchor);
            return ClickOutcome::Selected(id);
        }
        if self.tooltips.dismiss() {
            ClickOutcome::Dismissed
        } else {
            ClickOutcome::Ignored
        }
    }

    /// Close the pinned panel. Returns false when none was open.
    pub fn dismiss(&mut self) -> bool {
        self.tooltips.dismiss()
    }
}
