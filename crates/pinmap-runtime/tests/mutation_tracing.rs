//! Structured log output of the mutation pipeline and identity manager.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pinmap_core::{
    Actor, Annotation, AnnotationId, AnnotationPatch, Floor, FloorId, Map, MapId, Position,
    ServiceError,
};
use pinmap_runtime::config::IdentityConfig;
use pinmap_runtime::{
    CallSource, IdentityManager, MapAccess, MemoryStorage, MutationPipeline, RemoteReply,
    RetryPolicy,
};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// One span opening or one event, flattened to strings.
#[derive(Debug, Clone)]
struct Record {
    span: Option<&'static str>,
    level: Level,
    fields: HashMap<&'static str, String>,
}

impl Record {
    fn message(&self) -> &str {
        self.fields.get("message").map_or("", String::as_str)
    }
}

#[derive(Default)]
struct Fields(HashMap<&'static str, String>);

impl Visit for Fields {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name(), format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name(), value.to_owned());
    }
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Record>>>);

impl Recorder {
    fn push(&self, record: Record) {
        if let Ok(mut log) = self.0.lock() {
            log.push(record);
        }
    }

    fn spans(&self) -> Vec<Record> {
        self.records().into_iter().filter(|r| r.span.is_some()).collect()
    }

    fn events(&self) -> Vec<Record> {
        self.records().into_iter().filter(|r| r.span.is_none()).collect()
    }

    fn records(&self) -> Vec<Record> {
        self.0.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

impl<S: Subscriber> Layer<S> for Recorder {
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: Context<'_, S>,
    ) {
        let mut fields = Fields::default();
        attrs.record(&mut fields);
        self.push(Record {
            span: Some(attrs.metadata().name()),
            level: *attrs.metadata().level(),
            fields: fields.0,
        });
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        event.record(&mut fields);
        self.push(Record {
            span: None,
            level: *event.metadata().level(),
            fields: fields.0,
        });
    }
}

fn record(run: impl FnOnce()) -> Recorder {
    let recorder = Recorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());
    tracing::subscriber::with_default(subscriber, run);
    recorder
}

fn seeded_pipeline() -> MutationPipeline {
    let pipeline = MutationPipeline::new(
        MapAccess::new(MapId::new("m"), false),
        RetryPolicy::default(),
        Duration::from_secs(4),
    );
    pipeline.floors().replace_all(vec![Floor {
        id: FloorId::stored("f1"),
        map_id: MapId::new("m"),
        number: 1,
        name: "Ground".into(),
        image: None,
        pending: false,
    }]);
    pipeline.annotations().replace_all(vec![Annotation {
        id: AnnotationId::stored("a1"),
        floor_id: FloorId::stored("f1"),
        title: "Exit".into(),
        description: String::new(),
        position: Position::new(50.0, 50.0),
        image: None,
        author: None,
        pending: false,
    }]);
    pipeline
}

#[test]
fn rollback_is_logged_at_warn_inside_mutation_span() {
    let handle = record(|| {
        let mut pipeline = seeded_pipeline();
        pipeline
            .update_annotation(
                &Actor::Owner,
                &AnnotationId::stored("a1"),
                AnnotationPatch::new("Fire exit", ""),
            )
            .unwrap();
        let call = pipeline.take_calls().remove(0);
        pipeline.complete(call.id, Err(ServiceError::denied("locked")));
    });

    let spans = handle.spans();
    let mutation = spans
        .iter()
        .find(|s| s.span == Some("pinmap.mutation"))
        .expect("pinmap.mutation span");
    assert_eq!(mutation.fields.get("op").map(String::as_str), Some("update_annotation"));
    assert_eq!(mutation.fields.get("entity").map(String::as_str), Some("a1"));

    let events = handle.events();
    let rollback = events
        .iter()
        .find(|e| e.message() == "mutation rolled back")
        .expect("rollback event");
    assert_eq!(rollback.level, Level::WARN);
    assert!(rollback.fields["error"].contains("locked"));
}

#[test]
fn retries_are_logged_with_attempt_and_delay() {
    let handle = record(|| {
        let mut pipeline = seeded_pipeline();
        pipeline.load_floors();
        let call = pipeline.take_calls().remove(0);
        pipeline.complete(call.id, Err(ServiceError::network("reset")));
    });

    let events = handle.events();
    let retry = events
        .iter()
        .find(|e| e.message() == "retrying call")
        .expect("retry event");
    assert_eq!(retry.level, Level::WARN);
    assert_eq!(retry.fields["attempt"], "2");
    assert_eq!(retry.fields["delay_ms"], "500");
}

#[test]
fn committed_create_is_logged_at_info() {
    let handle = record(|| {
        let mut pipeline = seeded_pipeline();
        pipeline.load_floors();
        let call = pipeline.take_calls().remove(0);
        pipeline.complete(call.id, Ok(RemoteReply::Floors(Vec::new())));
    });
    assert!(handle
        .events()
        .iter()
        .any(|e| e.level == Level::INFO && e.message() == "floors loaded"));
}

#[test]
fn identity_transitions_are_logged() {
    let handle = record(|| {
        let mut identities = IdentityManager::new(
            MemoryStorage::new(),
            IdentityConfig::default(),
            RetryPolicy::no_retry(),
        );
        identities
            .begin_session(&Map {
                id: MapId::new("m"),
                title: "Office".into(),
                description: String::new(),
                publicly_editable: true,
            })
            .unwrap();
        identities.register("Sam").unwrap();
    });

    let transition = handle
        .events()
        .into_iter()
        .find(|e| e.message() == "identity state changed")
        .expect("transition event");
    assert_eq!(transition.fields["from"], "unregistered");
    assert_eq!(transition.fields["to"], "verifying");
}

#[test]
fn editor_tokens_never_reach_the_log() {
    let handle = record(|| {
        let mut identities = IdentityManager::new(
            MemoryStorage::new(),
            IdentityConfig::default(),
            RetryPolicy::no_retry(),
        );
        identities
            .begin_session(&Map {
                id: MapId::new("m"),
                title: "Office".into(),
                description: String::new(),
                publicly_editable: true,
            })
            .unwrap();
        let call = identities.register("Sam").unwrap();
        identities.take_calls();
        identities.complete(
            call,
            Ok(RemoteReply::Editor(pinmap_core::EditorIdentity {
                id: pinmap_core::EditorId::new("e1"),
                map_id: MapId::new("m"),
                nickname: "Sam".into(),
                token: "hunter2".into(),
            })),
        );
    });
    for event in handle.events() {
        for value in event.fields.values() {
            assert!(!value.contains("hunter2"), "token leaked: {value}");
        }
    }
}
