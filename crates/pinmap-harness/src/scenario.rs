#![forbid(unsafe_code)]

//! Ready-made worlds for scenario tests.

use pinmap_core::{Floor, Map, Position};
use pinmap_runtime::config::PinmapConfig;
use pinmap_runtime::{CallSource, MapAccess, MutationPipeline};

use crate::driver::{Driver, DriverError};
use crate::service::InMemoryRecordService;

/// A service holding one map, plus the driver talking to it.
#[derive(Debug)]
pub struct Scenario {
    pub service: InMemoryRecordService,
    pub driver: Driver,
    pub map: Map,
    pub config: PinmapConfig,
}

impl Scenario {
    #[must_use]
    pub fn new(publicly_editable: bool) -> Self {
        let service = InMemoryRecordService::new();
        let map = service.add_map("m1", publicly_editable);
        Self {
            service,
            driver: Driver::new(),
            map,
            config: PinmapConfig::default(),
        }
    }

    /// Seed `floors` floors with `pins` owner-authored annotations each,
    /// laid out on a diagonal.
    pub fn seed(&self, floors: usize, pins: usize) -> Vec<Floor> {
        (0..floors)
            .map(|f| {
                let number = i32::try_from(f + 1).unwrap_or(i32::MAX);
                let floor = self
                    .service
                    .seed_floor(&self.map.id, number, &format!("Floor {number}"));
                for p in 0..pins {
                    let at = (p as f64 + 1.0) * 100.0 / (pins as f64 + 1.0);
                    self.service.seed_annotation(
                        &floor.id,
                        &format!("Pin {number}.{p}"),
                        Position::new(at, at),
                        None,
                    );
                }
                floor
            })
            .collect()
    }

    /// A pipeline for this map, configured from `self.config`.
    #[must_use]
    pub fn pipeline(&self) -> MutationPipeline {
        MutationPipeline::from_config(
            MapAccess::new(self.map.id.clone(), self.map.publicly_editable),
            &self.config,
        )
    }

    /// Drive `source` until it is idle.
    pub fn settle(&mut self, source: &mut dyn CallSource) -> Result<usize, DriverError> {
        self.driver.run_until_idle(source, &self.service)
    }

    /// Load floors, then every floor's annotations.
    pub fn load(&mut self, pipeline: &mut MutationPipeline) -> Result<(), DriverError> {
        pipeline.load_floors();
        self.settle(pipeline)?;
        pipeline.load_all_annotations();
        self.settle(pipeline)?;
        Ok(())
    }
}
