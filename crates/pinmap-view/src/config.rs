#![forbid(unsafe_code)]

//! View tunables.

use pinmap_core::PixelSize;
use pinmap_layout::PlacementMetrics;
use pinmap_runtime::{PinmapConfig, TrackerConfig};
use serde::{Deserialize, Serialize};

/// Estimated size of a detail panel before it has rendered.
pub const DEFAULT_PANEL_SIZE: PixelSize = PixelSize::new(260.0, 120.0);

/// Pointer distance, in pixels, within which a marker counts as hit.
pub const DEFAULT_HIT_RADIUS: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub tracker: TrackerConfig,
    pub metrics: PlacementMetrics,
    pub panel_size: PixelSize,
    pub hit_radius: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            metrics: PlacementMetrics::default(),
            panel_size: DEFAULT_PANEL_SIZE,
            hit_radius: DEFAULT_HIT_RADIUS,
        }
    }
}

impl ViewConfig {
    /// Take tracker and overlay settings from the runtime configuration.
    #[must_use]
    pub fn from_config(config: &PinmapConfig) -> Self {
        Self {
            tracker: config.tracker.tracker_config(),
            metrics: config.overlay.metrics(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_section_feeds_metrics() {
        let config = PinmapConfig::from_toml_str("[overlay]\ngap_px = 6.0\n").unwrap();
        let view = ViewConfig::from_config(&config);
        assert_eq!(view.metrics.gap, 6.0);
        assert_eq!(view.metrics.margin, 10.0);
        assert_eq!(view.panel_size, DEFAULT_PANEL_SIZE);
    }
}
