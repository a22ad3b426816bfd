#![forbid(unsafe_code)]

//! Optional subscriber installation for native hosts.
//!
//! The library only emits `tracing` events. Hosts that have no subscriber
//! of their own can enable the `logging` feature and call [`init`] or
//! [`init_from_env`] once at startup.

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Environment variable read by [`init_from_env`].
pub const LOG_ENV: &str = "PINMAP_LOG";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("a global subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Install a formatted subscriber filtered by `filter`
/// (e.g. `"pinmap_runtime=debug,info"`).
pub fn init(filter: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(filter)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()?;
    Ok(())
}

/// [`init`] with the filter from `PINMAP_LOG`, defaulting to `info`.
pub fn init_from_env() -> Result<(), LoggingError> {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| "info".to_owned());
    init(&filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filter_is_rejected() {
        assert!(matches!(init("pinmap_runtime=loudest"), Err(LoggingError::Filter(_))));
    }
}
