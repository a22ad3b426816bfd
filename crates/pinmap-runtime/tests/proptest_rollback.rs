//! Property tests for optimistic rollback.
//!
//! Whatever mix of updates and deletes is in flight, and in whatever order
//! their failures arrive, rolling everything back restores the collection
//! exactly, order included.

use pinmap_core::{
    Actor, Annotation, AnnotationDraft, AnnotationId, AnnotationPatch, Floor, FloorId, MapId,
    Position, ServiceError,
};
use pinmap_runtime::{CallSource, MapAccess, MutationPipeline, RemoteReply, RetryPolicy};
use proptest::prelude::*;
use web_time::Duration;

#[derive(Debug, Clone, Copy)]
enum Op {
    Update(usize),
    Delete(usize),
    Create,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..8).prop_map(Op::Update),
        (0usize..8).prop_map(Op::Delete),
        Just(Op::Create),
    ]
}

fn pipeline(count: usize) -> MutationPipeline {
    let pipeline = MutationPipeline::new(
        MapAccess::new(MapId::new("m"), true),
        RetryPolicy::no_retry(),
        Duration::from_secs(4),
    );
    pipeline.floors().replace_all(vec![Floor {
        id: FloorId::stored("f"),
        map_id: MapId::new("m"),
        number: 1,
        name: "Ground".into(),
        image: None,
        pending: false,
    }]);
    pipeline.annotations().replace_all(
        (0..count)
            .map(|i| Annotation {
                id: AnnotationId::stored(format!("a{i}")),
                floor_id: FloorId::stored("f"),
                title: format!("Pin {i}"),
                description: String::new(),
                position: Position::new(i as f64, 100.0 - i as f64),
                image: None,
                author: None,
                pending: false,
            })
            .collect(),
    );
    pipeline
}

fn submit(pipeline: &mut MutationPipeline, count: usize, op: Op) {
    // Busy refusals are part of the property; ignore them.
    let _ = match op {
        Op::Update(i) => pipeline.update_annotation(
            &Actor::Owner,
            &AnnotationId::stored(format!("a{}", i % count)),
            AnnotationPatch::new("changed", "changed"),
        ),
        Op::Delete(i) => pipeline.delete_annotation(
            &Actor::Owner,
            &AnnotationId::stored(format!("a{}", i % count)),
        ),
        Op::Create => pipeline.create_annotation(
            &Actor::Owner,
            &FloorId::stored("f"),
            AnnotationDraft::new("new", "", Position::new(10.0, 10.0)),
        ),
    };
}

proptest! {
    #[test]
    fn failed_mutations_restore_the_exact_snapshot(
        count in 1usize..8,
        ops in prop::collection::vec(op(), 1..12),
        order in prop::collection::vec(any::<prop::sample::Index>(), 12),
    ) {
        let mut pipeline = pipeline(count);
        let before = pipeline.annotations().snapshot();

        for op in &ops {
            submit(&mut pipeline, count, *op);
        }
        let mut calls = pipeline.take_calls();
        for pick in &order {
            if calls.is_empty() {
                break;
            }
            let call = calls.remove(pick.index(calls.len()));
            pipeline.complete(call.id, Err(ServiceError::denied("no")));
        }
        for call in calls {
            pipeline.complete(call.id, Err(ServiceError::denied("no")));
        }

        prop_assert!(pipeline.is_idle());
        prop_assert_eq!(&*pipeline.annotations().snapshot(), &*before);
    }

    #[test]
    fn confirmed_deletes_never_come_back(
        count in 1usize..8,
        deletes in prop::collection::vec(0usize..8, 1..8),
    ) {
        let mut pipeline = pipeline(count);
        for i in &deletes {
            submit(&mut pipeline, count, Op::Delete(*i));
            submit(&mut pipeline, count, Op::Delete(*i));
        }
        let calls = pipeline.take_calls();
        for call in calls {
            pipeline.complete(call.id, Ok(RemoteReply::Done));
        }

        let remaining = pipeline.annotations().snapshot();
        for i in &deletes {
            let id = AnnotationId::stored(format!("a{}", i % count));
            prop_assert!(remaining.iter().all(|a| a.id != id));
        }
        prop_assert!(pipeline.status().is_empty());
    }
}
