#![forbid(unsafe_code)]

//! Contract with the external record service.
//!
//! The runtime never performs I/O. Components that need the record service
//! queue [`RemoteCall`]s; the host drains them through [`CallSource`],
//! performs them over whatever transport it has, and reports each result
//! back with [`CallSource::complete`].
//!
//! Hosts that can block (native tools, tests) may execute a call directly
//! against a [`RecordService`] implementation with [`RemoteCall::dispatch`].

use std::fmt;

use pinmap_core::{
    Actor, Annotation, AnnotationDraft, AnnotationPatch, EditorId, EditorIdentity, Floor,
    FloorDraft, MapId, ServiceResult, Verification,
};
use web_time::Duration;

/// The record service operations the core depends on.
///
/// Record identifiers are the service-assigned strings; temporary ids never
/// reach this trait. Implementations are authoritative: they re-check
/// permissions and report `PermissionDenied` as an ordinary failure.
pub trait RecordService {
    fn list_floors(&self, map: &MapId) -> ServiceResult<Vec<Floor>>;

    fn create_floor(&self, actor: &Actor, map: &MapId, draft: &FloorDraft) -> ServiceResult<Floor>;

    /// Idempotent: deleting an absent floor may report `NotFound`.
    fn delete_floor(&self, actor: &Actor, floor: &str) -> ServiceResult<()>;

    fn list_annotations(&self, floor: &str) -> ServiceResult<Vec<Annotation>>;

    fn create_annotation(
        &self,
        actor: &Actor,
        floor: &str,
        draft: &AnnotationDraft,
    ) -> ServiceResult<Annotation>;

    fn update_annotation(
        &self,
        actor: &Actor,
        annotation: &str,
        patch: &AnnotationPatch,
    ) -> ServiceResult<Annotation>;

    /// Idempotent: deleting an absent annotation may report `NotFound`.
    fn delete_annotation(&self, actor: &Actor, annotation: &str) -> ServiceResult<()>;

    fn register_editor(&self, map: &MapId, nickname: &str) -> ServiceResult<EditorIdentity>;

    fn verify_editor(&self, editor: &EditorId, token: &str) -> ServiceResult<Verification>;
}

/// Identifier of one logical remote call. Retries reuse the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// A queued request to the record service.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    ListFloors {
        map: MapId,
    },
    CreateFloor {
        actor: Actor,
        map: MapId,
        draft: FloorDraft,
    },
    DeleteFloor {
        actor: Actor,
        floor: String,
    },
    ListAnnotations {
        floor: String,
    },
    CreateAnnotation {
        actor: Actor,
        floor: String,
        draft: AnnotationDraft,
    },
    UpdateAnnotation {
        actor: Actor,
        annotation: String,
        patch: AnnotationPatch,
    },
    DeleteAnnotation {
        actor: Actor,
        annotation: String,
    },
    RegisterEditor {
        map: MapId,
        nickname: String,
    },
    VerifyEditor {
        editor: EditorId,
        token: String,
    },
}

impl RemoteCall {
    /// Operation name as the record service knows it.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ListFloors { .. } => "listFloors",
            Self::CreateFloor { .. } => "createFloor",
            Self::DeleteFloor { .. } => "deleteFloor",
            Self::ListAnnotations { .. } => "listAnnotations",
            Self::CreateAnnotation { .. } => "createAnnotation",
            Self::UpdateAnnotation { .. } => "updateAnnotation",
            Self::DeleteAnnotation { .. } => "deleteAnnotation",
            Self::RegisterEditor { .. } => "registerEditor",
            Self::VerifyEditor { .. } => "verifyEditor",
        }
    }

    /// True for operations that only read.
    #[must_use]
    pub const fn is_read(&self) -> bool {
        matches!(
            self,
            Self::ListFloors { .. } | Self::ListAnnotations { .. } | Self::VerifyEditor { .. }
        )
    }

    /// Execute the call synchronously.
    pub fn dispatch(&self, service: &dyn RecordService) -> ServiceResult<RemoteReply> {
        match self {
            Self::ListFloors { map } => service.list_floors(map).map(RemoteReply::Floors),
            Self::CreateFloor { actor, map, draft } => {
                service.create_floor(actor, map, draft).map(RemoteReply::Floor)
            }
            Self::DeleteFloor { actor, floor } => {
                service.delete_floor(actor, floor).map(|()| RemoteReply::Done)
            }
            Self::ListAnnotations { floor } => {
                service.list_annotations(floor).map(RemoteReply::Annotations)
            }
            Self::CreateAnnotation {
                actor,
                floor,
                draft,
            } => service
                .create_annotation(actor, floor, draft)
                .map(RemoteReply::Annotation),
            Self::UpdateAnnotation {
                actor,
                annotation,
                patch,
            } => service
                .update_annotation(actor, annotation, patch)
                .map(RemoteReply::Annotation),
            Self::DeleteAnnotation { actor, annotation } => service
                .delete_annotation(actor, annotation)
                .map(|()| RemoteReply::Done),
            Self::RegisterEditor { map, nickname } => service
                .register_editor(map, nickname)
                .map(RemoteReply::Editor),
            Self::VerifyEditor { editor, token } => service
                .verify_editor(editor, token)
                .map(RemoteReply::Verification),
        }
    }
}

/// Successful response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteReply {
    Floors(Vec<Floor>),
    Floor(Floor),
    Annotations(Vec<Annotation>),
    Annotation(Annotation),
    Editor(EditorIdentity),
    Verification(Verification),
    /// Void success (deletes).
    Done,
}

impl RemoteReply {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Floors(_) => "floors",
            Self::Floor(_) => "floor",
            Self::Annotations(_) => "annotations",
            Self::Annotation(_) => "annotation",
            Self::Editor(_) => "editor",
            Self::Verification(_) => "verification",
            Self::Done => "done",
        }
    }
}

/// A call handed to the host for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingCall {
    pub id: CallId,
    /// 1-based attempt number.
    pub attempt: u32,
    pub call: RemoteCall,
}

/// Anything that emits remote calls and consumes their results.
pub trait CallSource {
    /// Drain calls ready to be sent.
    fn take_calls(&mut self) -> Vec<OutgoingCall>;

    /// Report the result of a call previously returned by `take_calls`.
    fn complete(&mut self, id: CallId, result: ServiceResult<RemoteReply>);

    /// Advance time; releases retries whose backoff elapsed.
    fn tick(&mut self, now: Duration);

    /// Earliest time at which `tick` would release more work.
    fn next_wakeup(&self) -> Option<Duration>;

    /// True when nothing is queued, in flight, or waiting on backoff.
    fn is_idle(&self) -> bool;
}
