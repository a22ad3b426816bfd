#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! Groups every tunable into one [`PinmapConfig`] that can be loaded from
//! TOML or JSON at startup.
//!
//! ```toml
//! # pinmap.toml
//! [retry]
//! max_attempts = 5
//! backoff_step_ms = 250
//!
//! [tracker]
//! animation_poll_ms = 50
//! ```
//!
//! # Defaults
//!
//! `PinmapConfig::default()` reproduces the built-in behavior: three
//! attempts with 500 ms linear backoff, a 100 ms animation poll, 10 px
//! panel gap and viewport margin.

use std::path::Path;

use pinmap_layout::PlacementMetrics;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::Duration;

use crate::frame_tracker::TrackerConfig;
use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinmapConfig {
    pub retry: RetryConfig,
    pub tracker: TrackerSection,
    pub overlay: OverlayConfig,
    pub identity: IdentityConfig,
    pub status: StatusConfig,
}

/// Remote commit retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Linear backoff step; the delay after attempt `n` is `n × step`.
    pub backoff_step_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step_ms: 500,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::linear(self.max_attempts, self.backoff_step_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSection {
    pub animation_poll_ms: u64,
    pub max_deferred_frames: u32,
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            animation_poll_ms: 100,
            max_deferred_frames: 60,
        }
    }
}

impl TrackerSection {
    #[must_use]
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            animation_poll: Duration::from_millis(self.animation_poll_ms),
            max_deferred_frames: self.max_deferred_frames,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub gap_px: f64,
    pub viewport_margin_px: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            gap_px: 10.0,
            viewport_margin_px: 10.0,
        }
    }
}

impl OverlayConfig {
    #[must_use]
    pub fn metrics(&self) -> PlacementMetrics {
        PlacementMetrics {
            gap: self.gap_px,
            margin: self.viewport_margin_px,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Prefix of persisted identity keys; the map id is appended.
    pub storage_namespace: String,
    pub max_nickname_len: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            storage_namespace: "pinmap.editor".into(),
            max_nickname_len: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub message_ttl_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            message_ttl_ms: 4000,
        }
    }
}

impl StatusConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.message_ttl_ms)
    }
}

impl PinmapConfig {
    /// Load and validate a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str::<Self>(s)?.validated()
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load and validate a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<Self>(s)?.validated()
    }

    /// Check every parameter. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be > 0".into());
        }
        if self.tracker.animation_poll_ms == 0 {
            errors.push("tracker.animation_poll_ms must be > 0".into());
        }
        if !(self.overlay.gap_px.is_finite() && self.overlay.gap_px >= 0.0) {
            errors.push(format!(
                "overlay.gap_px must be >= 0, got {}",
                self.overlay.gap_px
            ));
        }
        if !(self.overlay.viewport_margin_px.is_finite() && self.overlay.viewport_margin_px >= 0.0)
        {
            errors.push(format!(
                "overlay.viewport_margin_px must be >= 0, got {}",
                self.overlay.viewport_margin_px
            ));
        }
        if self.identity.storage_namespace.trim().is_empty() {
            errors.push("identity.storage_namespace must not be empty".into());
        }
        if self.identity.max_nickname_len == 0 {
            errors.push("identity.max_nickname_len must be > 0".into());
        }
        errors
    }

    /// [`validate`](Self::validate), as a `Result`.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}
