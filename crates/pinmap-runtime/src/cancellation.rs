#![forbid(unsafe_code)]

//! Cancellation flags for polled work.
//!
//! The runtime is single-threaded, so a flag is a shared `Cell<bool>`. The
//! [`CancellationSource`] belongs to whoever decides when the work stops;
//! the work holds a [`CancellationToken`] and checks it on every poll.
//!
//! ```
//! use pinmap_runtime::cancellation::CancellationSource;
//!
//! let source = CancellationSource::new();
//! let token = source.token();
//! source.cancel();
//! assert!(token.is_cancelled());
//! ```

use std::cell::Cell;
use std::rc::Rc;

/// Read side of a cancellation flag.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    flag: Rc<Cell<bool>>,
}

impl CancellationToken {
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.get()
    }
}

/// Write side of a cancellation flag.
///
/// Dropping a source leaves its tokens live. [`PollGuard`] wraps a source
/// to cancel on drop.
///
/// [`PollGuard`]: crate::timer::PollGuard
#[derive(Debug, Default)]
pub struct CancellationSource {
    flag: Rc<Cell<bool>>,
}

impl CancellationSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            flag: Rc::clone(&self.flag),
        }
    }

    /// Raise the flag. Repeated calls are no-ops.
    pub fn cancel(&self) {
        self.flag.set(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.get()
    }
}
