#![forbid(unsafe_code)]

//! Scripted walkthrough of the optimistic pipeline.
//!
//! Seeds a map, loads it, creates a pin, and submits an edit that the
//! transport keeps failing until the retry budget runs out. The transport
//! transcript is printed as JSONL on stdout; runtime logs go to stderr,
//! filtered by `PINMAP_LOG`.
//!
//! ```sh
//! PINMAP_LOG=pinmap_runtime=debug cargo run -p pinmap-harness
//! ```

use std::error::Error;
use std::io::{self, Write};

use pinmap_core::{Actor, AnnotationDraft, AnnotationPatch, Position, ServiceError};
use pinmap_harness::Scenario;
use pinmap_runtime::logging;

fn main() -> Result<(), Box<dyn Error>> {
    logging::init_from_env()?;

    let mut scenario = Scenario::new(false);
    let floors = scenario.seed(2, 2);
    let mut pipeline = scenario.pipeline();
    scenario.load(&mut pipeline)?;

    let ground = &floors[0].id;
    pipeline.create_annotation(
        &Actor::Owner,
        ground,
        AnnotationDraft::new("Fire exit", "North stairwell", Position::new(12.5, 80.0)),
    )?;
    scenario.settle(&mut pipeline)?;

    let target = pipeline
        .annotations_on(ground)
        .first()
        .map(|a| a.id.clone())
        .ok_or("seeded floor has no pins")?;
    scenario
        .driver
        .fail_op("updateAnnotation", ServiceError::network("connection reset"));
    pipeline.update_annotation(&Actor::Owner, &target, AnnotationPatch::new("Renamed", ""))?;
    scenario.settle(&mut pipeline)?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(scenario.driver.transcript_jsonl()?.as_bytes())?;
    for message in pipeline.status().messages() {
        writeln!(io::stderr(), "status: {}", message.text)?;
    }
    Ok(())
}
