#![forbid(unsafe_code)]

//! Live tracking of a floor image's on-screen box.
//!
//! # Design
//!
//! The tracker does not measure anything itself. The host measures the
//! rendered image (post-transform bounding box) whenever the tracker asks
//! for it and pushes the result into [`FrameTracker::observe`]. The tracker
//! decides what to publish:
//!
//! ```text
//! trigger ──► needs_measure() ──host measures──► observe(measurement)
//!                                                   │
//!                 Present, non-empty ───────────────┼──► publish Some(frame)
//!                 Absent / zero size ───────────────┴──► publish None, defer
//! ```
//!
//! Triggers are image load, window resize, ancestor scroll, an
//! `ImageLoaded` bus broadcast for the tracked image, and, only while an
//! animation is running, a 100 ms poll owned by a [`PollGuard`].
//!
//! # Invariants
//!
//! 1. The published frame is never empty: a zero-size or absent measurement
//!    publishes `None`, which consumers treat as "not yet visible".
//! 2. Subscribers hear only changes.
//! 3. Deferral is bounded by `max_deferred_frames`; past the bound the
//!    tracker reports [`TrackOutcome::GaveUp`] and waits for the next
//!    external trigger.
//! 4. The animation poll never outlives its guard or the tracker.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pinmap_core::{BusEvent, ImageFrame, ImageRef, PixelPoint, PixelRect};
use serde::{Deserialize, Serialize};
use tracing::debug;
use web_time::Duration;

use crate::bus::{BusSubscription, EventBus};
use crate::reactive::{Observable, Subscription};
use crate::timer::{IntervalTimer, PollGuard};

/// What the host measured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    /// No image element is mounted yet.
    Absent,
    /// The image's bounding box and its container's origin, both in
    /// viewport coordinates.
    Present {
        image: PixelRect,
        container: PixelPoint,
    },
}

impl Measurement {
    /// Measurement of an image whose container sits at the viewport origin.
    #[must_use]
    pub const fn at_viewport(image: PixelRect) -> Self {
        Self::Present {
            image,
            container: PixelPoint::ORIGIN,
        }
    }
}

/// Why a measurement was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameTrigger {
    ImageLoad,
    Resize,
    Scroll,
    ImageLoadedBroadcast,
    AnimationTick,
    DeferredFrame,
    /// Pointer activity that may shift layout while a pin is being placed.
    Pointer,
}

impl FrameTrigger {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ImageLoad => "image-load",
            Self::Resize => "resize",
            Self::Scroll => "scroll",
            Self::ImageLoadedBroadcast => "image-loaded-broadcast",
            Self::AnimationTick => "animation-tick",
            Self::DeferredFrame => "deferred-frame",
            Self::Pointer => "pointer",
        }
    }
}

/// Result of feeding one measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// A new frame was published.
    Published,
    /// Same frame as before; nothing published.
    Unchanged,
    /// Not laid out yet; measure again on the next animation frame.
    Deferred { attempt: u32 },
    /// Deferred too many times; waiting for an external trigger.
    GaveUp,
}

/// Tracker tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub animation_poll: Duration,
    pub max_deferred_frames: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            animation_poll: Duration::from_millis(100),
            max_deferred_frames: 60,
        }
    }
}

/// Tracks one container/image pair.
#[derive(Debug)]
pub struct FrameTracker {
    config: TrackerConfig,
    image: Rc<RefCell<Option<ImageRef>>>,
    frame: Observable<Option<ImageFrame>>,
    dirty: Rc<Cell<bool>>,
    deferred: u32,
    animation: Option<IntervalTimer>,
    bus: Option<BusSubscription>,
}

impl FrameTracker {
    /// A tracker with no image; it starts dirty so the first layout pass
    /// measures.
    #[must_use]
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            image: Rc::new(RefCell::new(None)),
            frame: Observable::new(None),
            dirty: Rc::new(Cell::new(true)),
            deferred: 0,
            animation: None,
            bus: None,
        }
    }

    #[must_use]
    pub fn with_image(config: TrackerConfig, image: Option<ImageRef>) -> Self {
        let tracker = Self::new(config);
        *tracker.image.borrow_mut() = image;
        tracker
    }

    /// Listen for `ImageLoaded` broadcasts of the tracked image.
    pub fn connect_bus(&mut self, bus: &EventBus) {
        let image = Rc::clone(&self.image);
        let dirty = Rc::clone(&self.dirty);
        self.bus = Some(bus.subscribe(move |event| {
            if let BusEvent::ImageLoaded { image: loaded } = event
                && image.borrow().as_ref() == Some(loaded)
            {
                debug!(image = %loaded, "image-loaded broadcast, re-measure");
                dirty.set(true);
            }
        }));
    }

    #[must_use]
    pub fn image(&self) -> Option<ImageRef> {
        self.image.borrow().clone()
    }

    /// Swap the displayed image. The old frame is withdrawn until the new
    /// image is measured.
    pub fn set_image(&mut self, image: Option<ImageRef>) {
        if *self.image.borrow() == image {
            return;
        }
        debug!(?image, "tracked image changed");
        *self.image.borrow_mut() = image;
        self.frame.set(None);
        self.deferred = 0;
        self.dirty.set(true);
    }

    /// Record an external trigger; the host should measure next frame.
    pub fn invalidate(&mut self, trigger: FrameTrigger) {
        debug!(trigger = trigger.as_str(), "frame invalidated");
        if trigger != FrameTrigger::DeferredFrame {
            self.deferred = 0;
        }
        self.dirty.set(true);
    }

    /// True when the host should measure and call [`observe`](Self::observe).
    #[must_use]
    pub fn needs_measure(&self) -> bool {
        self.dirty.get()
    }

    /// Feed a measurement.
    pub fn observe(&mut self, trigger: FrameTrigger, measurement: Measurement) -> TrackOutcome {
        let frame = match measurement {
            Measurement::Present { image, container } => Some(ImageFrame::new(image, container)),
            Measurement::Absent => None,
        }
        .filter(|frame| !frame.is_empty());

        let Some(frame) = frame else {
            self.frame.set(None);
            self.deferred += 1;
            if self.deferred > self.config.max_deferred_frames {
                debug!(
                    trigger = trigger.as_str(),
                    attempts = self.deferred - 1,
                    "frame still not laid out, giving up until next trigger"
                );
                self.deferred = 0;
                self.dirty.set(false);
                return TrackOutcome::GaveUp;
            }
            self.dirty.set(true);
            return TrackOutcome::Deferred {
                attempt: self.deferred,
            };
        };

        self.deferred = 0;
        self.dirty.set(false);
        if self.frame.set(Some(frame)) {
            debug!(
                trigger = trigger.as_str(),
                left = frame.image.left,
                top = frame.image.top,
                width = frame.image.width,
                height = frame.image.height,
                "frame published"
            );
            TrackOutcome::Published
        } else {
            TrackOutcome::Unchanged
        }
    }

    /// The current published frame.
    #[must_use]
    pub fn frame(&self) -> Option<ImageFrame> {
        self.frame.get()
    }

    /// Publication version, bumped on every change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.frame.version()
    }

    /// Subscribe to frame changes.
    pub fn subscribe(&self, callback: impl Fn(&Option<ImageFrame>) + 'static) -> Subscription {
        self.frame.subscribe(callback)
    }

    /// Begin the animation poll. Dropping the returned guard, calling
    /// [`end_animation`](Self::end_animation), or dropping the tracker ends
    /// it. Starting again replaces any running poll.
    pub fn start_animation(&mut self, now: Duration) -> PollGuard {
        let (timer, guard) = IntervalTimer::start(now, self.config.animation_poll);
        debug!(
            interval_ms = self.config.animation_poll.as_millis() as u64,
            "animation poll started"
        );
        self.animation = Some(timer);
        self.dirty.set(true);
        guard
    }

    /// Stop the animation poll and take one settling measurement.
    pub fn end_animation(&mut self) {
        if self.animation.take().is_some() {
            debug!("animation poll ended");
            self.dirty.set(true);
        }
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.animation
            .as_ref()
            .is_some_and(|timer| !timer.is_cancelled())
    }

    /// Advance the animation poll. Returns `true` when a tick fired; the
    /// tracker is then dirty.
    pub fn poll_due(&mut self, now: Duration) -> bool {
        let Some(timer) = self.animation.as_mut() else {
            return false;
        };
        if timer.is_cancelled() {
            debug!("animation poll guard dropped");
            self.animation = None;
            return false;
        }
        if timer.poll(now) {
            self.dirty.set(true);
            return true;
        }
        false
    }

    /// When the animation poll next fires.
    #[must_use]
    pub fn next_wakeup(&self) -> Option<Duration> {
        self.animation.as_ref().and_then(IntervalTimer::next_due)
    }
}

impl Drop for FrameTracker {
    fn drop(&mut self) {
        if self.animation.take().is_some() {
            debug!("tracker dropped with animation poll active");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> PixelRect {
        PixelRect::new(100.0, 50.0, 600.0, 480.0)
    }

    fn tracker() -> FrameTracker {
        FrameTracker::with_image(TrackerConfig::default(), Some(ImageRef::new("f1.png")))
    }

    #[test]
    fn publishes_non_empty_frame() {
        let mut t = tracker();
        assert!(t.needs_measure());
        assert_eq!(
            t.observe(FrameTrigger::ImageLoad, Measurement::at_viewport(rect())),
            TrackOutcome::Published
        );
        assert_eq!(t.frame(), Some(ImageFrame::at_viewport(rect())));
        assert!(!t.needs_measure());
    }

    #[test]
    fn identical_measurement_is_unchanged() {
        let mut t = tracker();
        t.observe(FrameTrigger::ImageLoad, Measurement::at_viewport(rect()));
        let version = t.version();
        assert_eq!(
            t.observe(FrameTrigger::Scroll, Measurement::at_viewport(rect())),
            TrackOutcome::Unchanged
        );
        assert_eq!(t.version(), version);
    }

    #[test]
    fn zero_size_is_never_published() {
        let mut t = tracker();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = t.subscribe(move |f| s.borrow_mut().push(*f));

        let zero = PixelRect::new(100.0, 50.0, 0.0, 0.0);
        assert_eq!(
            t.observe(FrameTrigger::ImageLoad, Measurement::at_viewport(zero)),
            TrackOutcome::Deferred { attempt: 1 }
        );
        assert!(t.needs_measure());
        assert_eq!(
            t.observe(FrameTrigger::DeferredFrame, Measurement::Absent),
            TrackOutcome::Deferred { attempt: 2 }
        );
        assert_eq!(t.frame(), None);
        assert!(seen.borrow().iter().all(|f| f.is_none_or(|f| !f.is_empty())));
    }

    #[test]
    fn measurement_after_publish_withdraws_stale_frame() {
        let mut t = tracker();
        t.observe(FrameTrigger::ImageLoad, Measurement::at_viewport(rect()));
        t.observe(FrameTrigger::Resize, Measurement::Absent);
        assert_eq!(t.frame(), None);
    }

    #[test]
    fn deferral_is_bounded() {
        let config = TrackerConfig {
            max_deferred_frames: 3,
            ..TrackerConfig::default()
        };
        let mut t = FrameTracker::new(config);
        for attempt in 1..=3 {
            assert_eq!(
                t.observe(FrameTrigger::DeferredFrame, Measurement::Absent),
                TrackOutcome::Deferred { attempt }
            );
        }
        assert_eq!(
            t.observe(FrameTrigger::DeferredFrame, Measurement::Absent),
            TrackOutcome::GaveUp
        );
        assert!(!t.needs_measure());

        t.invalidate(FrameTrigger::Resize);
        assert!(t.needs_measure());
        assert_eq!(
            t.observe(FrameTrigger::Resize, Measurement::Absent),
            TrackOutcome::Deferred { attempt: 1 }
        );
    }

    #[test]
    fn bus_broadcast_for_own_image_marks_dirty() {
        let bus = EventBus::new();
        let mut t = tracker();
        t.connect_bus(&bus);
        t.observe(FrameTrigger::ImageLoad, Measurement::at_viewport(rect()));
        assert!(!t.needs_measure());

        bus.publish(BusEvent::ImageLoaded {
            image: ImageRef::new("other.png"),
        });
        assert!(!t.needs_measure());

        bus.publish(BusEvent::ImageLoaded {
            image: ImageRef::new("f1.png"),
        });
        assert!(t.needs_measure());
    }

    #[test]
    fn dropping_tracker_releases_bus_listener() {
        let bus = EventBus::new();
        let mut t = tracker();
        t.connect_bus(&bus);
        drop(t);
        bus.publish(BusEvent::ImageLoaded {
            image: ImageRef::new("f1.png"),
        });
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn image_swap_withdraws_frame() {
        let mut t = tracker();
        t.observe(FrameTrigger::ImageLoad, Measurement::at_viewport(rect()));
        t.set_image(Some(ImageRef::new("f2.png")));
        assert_eq!(t.frame(), None);
        assert!(t.needs_measure());
    }

    #[test]
    fn animation_poll_fires_every_interval() {
        let mut t = tracker();
        t.observe(FrameTrigger::ImageLoad, Measurement::at_viewport(rect()));
        let _guard = t.start_animation(Duration::ZERO);
        assert!(t.is_animating());
        assert_eq!(t.next_wakeup(), Some(Duration::from_millis(100)));
        assert!(!t.poll_due(Duration::from_millis(99)));
        assert!(t.poll_due(Duration::from_millis(100)));
        assert!(t.needs_measure());
        t.observe(FrameTrigger::AnimationTick, Measurement::at_viewport(rect()));
        assert!(t.poll_due(Duration::from_millis(200)));
    }

    #[test]
    fn dropped_guard_cancels_poll() {
        let mut t = tracker();
        let guard = t.start_animation(Duration::ZERO);
        drop(guard);
        assert!(!t.is_animating());
        assert!(!t.poll_due(Duration::from_secs(1)));
        assert_eq!(t.next_wakeup(), None);
    }

    #[test]
    fn end_animation_cancels_poll() {
        let mut t = tracker();
        let _guard = t.start_animation(Duration::ZERO);
        t.end_animation();
        assert!(!t.poll_due(Duration::from_secs(1)));
        assert!(t.needs_measure());
    }
}
