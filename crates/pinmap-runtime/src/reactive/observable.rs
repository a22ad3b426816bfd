#![forbid(unsafe_code)]

//! Versioned values that notify on change.
//!
//! # Design
//!
//! An [`Observable`] is a shared cell holding the current frame, the
//! current identity state, or a whole entity collection. Writers replace
//! the value; if it differs from the old one (`PartialEq`) the version is
//! bumped and every live subscriber is called with the new value.
//!
//! Collections are stored as `Arc<Vec<_>>`, so a renderer holding an older
//! snapshot keeps a consistent view while the pipeline swaps in a new one.
//!
//! # Invariants
//!
//! 1. The version grows by one per effective change and never otherwise.
//! 2. Subscribers run in registration order, after the write has landed and
//!    with no borrow held, so they may read or write the observable again.
//! 3. A dropped [`Subscription`] is never called again; its slot is pruned
//!    on the next notification.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

type Callback<T> = dyn Fn(&T);

struct Slot<T> {
    value: T,
    version: u64,
    listeners: Vec<Weak<Callback<T>>>,
}

/// Shared handle to a versioned value. Clones share the value.
pub struct Observable<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.borrow();
        f.debug_struct("Observable")
            .field("value", &slot.value)
            .field("version", &slot.version)
            .field("listeners", &slot.listeners.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot {
                value,
                version: 0,
                listeners: Vec::new(),
            })),
        }
    }

    #[must_use]
    pub fn get(&self) -> T {
        self.slot.borrow().value.clone()
    }

    /// Read the value in place.
    pub fn with<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        read(&self.slot.borrow().value)
    }

    /// Store `value`. Returns false, and notifies nobody, when it equals
    /// the current value.
    pub fn set(&self, value: T) -> bool {
        let (listeners, current, version) = {
            let mut slot = self.slot.borrow_mut();
            if slot.value == value {
                return false;
            }
            slot.value = value;
            slot.version += 1;
            slot.listeners.retain(|l| l.strong_count() > 0);
            let listeners: Vec<Rc<Callback<T>>> =
                slot.listeners.iter().filter_map(Weak::upgrade).collect();
            (listeners, slot.value.clone(), slot.version)
        };
        if !listeners.is_empty() {
            trace!(version, listeners = listeners.len(), "observable changed");
        }
        for listener in &listeners {
            listener(&current);
        }
        true
    }

    /// Call `listener` after every change until the returned guard drops.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        let strong: Rc<Callback<T>> = Rc::new(listener);
        self.slot.borrow_mut().listeners.push(Rc::downgrade(&strong));
        Subscription {
            _listener: Box::new(strong),
        }
    }

    /// Change counter, for dirty checks.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.slot.borrow().version
    }

    /// Registered listeners, counting dropped ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.slot.borrow().listeners.len()
    }
}

/// Keeps a listener registered while alive.
pub struct Subscription {
    _listener: Box<dyn std::any::Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
