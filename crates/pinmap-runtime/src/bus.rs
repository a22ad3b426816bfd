#![forbid(unsafe_code)]

//! In-process publish/subscribe channel for [`BusEvent`]s.
//!
//! The bus is a cloneable handle injected into each component that needs
//! it; there is no global instance.
//!
//! # Invariants
//!
//! 1. Subscribers are called in registration order.
//! 2. An event published while another is being delivered is queued and
//!    delivered after the current event reaches every subscriber, so
//!    delivery order equals publish order.
//! 3. A dropped [`BusSubscription`] receives nothing published afterwards.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use pinmap_core::BusEvent;
use tracing::debug;

type Listener = Rc<dyn Fn(&BusEvent)>;

#[derive(Default)]
struct BusInner {
    listeners: Vec<Weak<dyn Fn(&BusEvent)>>,
    queue: VecDeque<BusEvent>,
    delivering: bool,
}

/// Cloneable handle to a shared event bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventBus")
            .field("listeners", &inner.listeners.len())
            .field("queued", &inner.queue.len())
            .finish()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Dropping the returned guard unsubscribes it.
    pub fn subscribe(&self, listener: impl Fn(&BusEvent) + 'static) -> BusSubscription {
        let strong: Listener = Rc::new(listener);
        self.inner.borrow_mut().listeners.push(Rc::downgrade(&strong));
        BusSubscription { _listener: strong }
    }

    /// Publish an event to every live listener.
    pub fn publish(&self, event: BusEvent) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.queue.push_back(event);
            if inner.delivering {
                return;
            }
            inner.delivering = true;
        }

        loop {
            let next = {
                let mut inner = self.inner.borrow_mut();
                match inner.queue.pop_front() {
                    Some(event) => {
                        inner.listeners.retain(|w| w.strong_count() > 0);
                        let listeners: Vec<Listener> =
                            inner.listeners.iter().filter_map(Weak::upgrade).collect();
                        Some((event, listeners))
                    }
                    None => {
                        inner.delivering = false;
                        None
                    }
                }
            };
            let Some((event, listeners)) = next else {
                break;
            };
            debug!(event = event.name(), listeners = listeners.len(), "bus deliver");
            for listener in &listeners {
                listener(&event);
            }
        }
    }

    /// Live listeners, including dropped ones not yet pruned.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

/// RAII guard for a bus listener.
pub struct BusSubscription {
    _listener: Listener,
}

impl fmt::Debug for BusSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusSubscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinmap_core::{AnnotationId, FloorId, ImageRef};

    fn loaded(name: &str) -> BusEvent {
        BusEvent::ImageLoaded {
            image: ImageRef::new(name),
        }
    }

    #[test]
    fn delivers_to_all_listeners_in_order() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (Rc::clone(&log), Rc::clone(&log));
        let _s1 = bus.subscribe(move |e| a.borrow_mut().push(format!("1:{}", e.name())));
        let _s2 = bus.subscribe(move |e| b.borrow_mut().push(format!("2:{}", e.name())));
        bus.publish(loaded("f1.png"));
        assert_eq!(*log.borrow(), vec!["1:image-loaded", "2:image-loaded"]);
    }

    #[test]
    fn dropped_guard_stops_delivery() {
        let bus = EventBus::new();
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        let sub = bus.subscribe(move |_| *c.borrow_mut() += 1);
        bus.publish(loaded("a"));
        drop(sub);
        bus.publish(loaded("b"));
        assert_eq!(*count.borrow(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn publish_during_delivery_is_queued() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let republisher = bus.clone();
        let first_log = Rc::clone(&log);
        let _s1 = bus.subscribe(move |e| {
            first_log.borrow_mut().push(format!("first:{}", e.name()));
            if matches!(e, BusEvent::ImageLoaded { .. }) {
                republisher.publish(BusEvent::AnnotationSelected {
                    floor: FloorId::stored("f"),
                    annotation: Some(AnnotationId::stored("p")),
                });
            }
        });
        let second_log = Rc::clone(&log);
        let _s2 = bus.subscribe(move |e| {
            second_log.borrow_mut().push(format!("second:{}", e.name()));
        });

        bus.publish(loaded("a"));
        assert_eq!(
            *log.borrow(),
            vec![
                "first:image-loaded",
                "second:image-loaded",
                "first:annotation-selected",
                "second:annotation-selected",
            ]
        );
    }

    #[test]
    fn clones_share_listeners() {
        let bus = EventBus::new();
        let other = bus.clone();
        let hit = Rc::new(RefCell::new(false));
        let h = Rc::clone(&hit);
        let _s = other.subscribe(move |_| *h.borrow_mut() = true);
        bus.publish(loaded("x"));
        assert!(*hit.borrow());
    }
}
