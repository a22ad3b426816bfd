#![forbid(unsafe_code)]

//! The optimistic mutation pipeline.
//!
//! # Design
//!
//! Every mutation runs in three phases:
//!
//! 1. **Optimistic apply**: the local collection changes immediately. New
//!    entities get a temporary id and `pending = true`.
//! 2. **Remote commit**: a [`RemoteCall`] is queued; the host drains it via
//!    [`CallSource::take_calls`].
//! 3. **Reconcile**: [`CallSource::complete`] either installs the
//!    authoritative entity or rolls the optimistic change back.
//!
//! Network-class failures are retried on the host clock within a bounded
//! budget before rollback. A delete that the service answers with
//! `NotFound` is a success: the entity is gone either way.
//!
//! # Invariants
//!
//! 1. At most one mutation per entity is in flight. A second one is
//!    refused with [`MutationError::EntityBusy`]; a repeated delete returns
//!    the ticket of the delete already in flight.
//! 2. A failed update restores the retained prior entity exactly.
//! 3. A failed create leaves no temporary entity behind.
//! 4. A failed delete re-inserts the entity where it was, relative to the
//!    entities that followed it.
//! 5. A locally forbidden mutation changes nothing and issues no call.
//!
//! # Failure Modes
//!
//! Every rollback posts an error to the [`StatusBoard`] and emits a
//! [`MutationEvent::RolledBack`]; nothing fails silently.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use pinmap_core::{
    Actor, Annotation, AnnotationDraft, AnnotationId, AnnotationPatch, Floor, FloorDraft,
    FloorId, ServiceError, ServiceResult,
};
use tracing::{debug, info, info_span, warn};
use web_time::Duration;

use crate::call_queue::{CallQueue, RetryDecision};
use crate::config::PinmapConfig;
use crate::retry::RetryPolicy;
use crate::service::{CallId, CallSource, OutgoingCall, RemoteCall, RemoteReply};

use super::gate::{Action, MapAccess};
use super::status::{StatusBoard, StatusLevel};
use super::store::EntityStore;
use super::MutationError;

/// Entity a mutation targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Annotation(AnnotationId),
    Floor(FloorId),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Annotation(id) => write!(f, "annotation {id}"),
            Self::Floor(id) => write!(f, "floor {id}"),
        }
    }
}

/// Kind of pipeline operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    CreateAnnotation,
    UpdateAnnotation,
    DeleteAnnotation,
    CreateFloor,
    DeleteFloor,
    LoadFloors,
    LoadAnnotations,
}

impl MutationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateAnnotation => "create_annotation",
            Self::UpdateAnnotation => "update_annotation",
            Self::DeleteAnnotation => "delete_annotation",
            Self::CreateFloor => "create_floor",
            Self::DeleteFloor => "delete_floor",
            Self::LoadFloors => "load_floors",
            Self::LoadAnnotations => "load_annotations",
        }
    }

    const fn failure_text(self) -> &'static str {
        match self {
            Self::CreateAnnotation => "Could not add pin",
            Self::UpdateAnnotation => "Could not save pin",
            Self::DeleteAnnotation => "Could not delete pin",
            Self::CreateFloor => "Could not add area",
            Self::DeleteFloor => "Could not delete area",
            Self::LoadFloors => "Could not load areas",
            Self::LoadAnnotations => "Could not load pins",
        }
    }
}

/// Handle for a submitted mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ticket {
    /// A remote call is (or already was) in flight for this entity.
    Issued { call: CallId, entity: EntityKey },
    /// The entity was already absent; nothing to do.
    AlreadyDeleted { entity: EntityKey },
}

impl Ticket {
    #[must_use]
    pub const fn call(&self) -> Option<CallId> {
        match self {
            Self::Issued { call, .. } => Some(*call),
            Self::AlreadyDeleted { .. } => None,
        }
    }

    #[must_use]
    pub const fn entity(&self) -> &EntityKey {
        match self {
            Self::Issued { entity, .. } | Self::AlreadyDeleted { entity } => entity,
        }
    }
}

/// Observable outcome of a pipeline step.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationEvent {
    Committed {
        op: MutationKind,
        entity: Option<EntityKey>,
    },
    Retrying {
        op: MutationKind,
        call: CallId,
        attempt: u32,
        delay: Duration,
    },
    RolledBack {
        op: MutationKind,
        entity: EntityKey,
        error: MutationError,
    },
    LoadFailed {
        op: MutationKind,
        floor: Option<FloorId>,
        error: MutationError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LoadScope {
    Floors,
    Annotations(FloorId),
}

#[derive(Debug)]
enum PendingOp {
    CreateAnnotation {
        temp: AnnotationId,
    },
    UpdateAnnotation {
        id: AnnotationId,
        prior: Annotation,
    },
    DeleteAnnotation {
        id: AnnotationId,
        prior: Annotation,
        successors: Vec<AnnotationId>,
    },
    CreateFloor {
        temp: FloorId,
    },
    DeleteFloor {
        id: FloorId,
        prior: Floor,
        successors: Vec<FloorId>,
        cascade: Vec<(Annotation, Vec<AnnotationId>)>,
    },
    Load(LoadScope),
}

impl PendingOp {
    const fn kind(&self) -> MutationKind {
        match self {
            Self::CreateAnnotation { .. } => MutationKind::CreateAnnotation,
            Self::UpdateAnnotation { .. } => MutationKind::UpdateAnnotation,
            Self::DeleteAnnotation { .. } => MutationKind::DeleteAnnotation,
            Self::CreateFloor { .. } => MutationKind::CreateFloor,
            Self::DeleteFloor { .. } => MutationKind::DeleteFloor,
            Self::Load(LoadScope::Floors) => MutationKind::LoadFloors,
            Self::Load(LoadScope::Annotations(_)) => MutationKind::LoadAnnotations,
        }
    }

    fn entity(&self) -> Option<EntityKey> {
        match self {
            Self::CreateAnnotation { temp: id }
            | Self::UpdateAnnotation { id, .. }
            | Self::DeleteAnnotation { id, .. } => Some(EntityKey::Annotation(id.clone())),
            Self::CreateFloor { temp: id } | Self::DeleteFloor { id, .. } => {
                Some(EntityKey::Floor(id.clone()))
            }
            Self::Load(_) => None,
        }
    }

    const fn is_delete(&self) -> bool {
        matches!(self, Self::DeleteAnnotation { .. } | Self::DeleteFloor { .. })
    }
}

/// Optimistic mutation engine for one map view.
#[derive(Debug)]
pub struct MutationPipeline {
    access: MapAccess,
    annotations: EntityStore<Annotation>,
    floors: EntityStore<Floor>,
    calls: CallQueue,
    pending: HashMap<CallId, PendingOp>,
    busy: HashMap<EntityKey, CallId>,
    loading: HashMap<LoadScope, CallId>,
    next_temp: u64,
    events: VecDeque<MutationEvent>,
    status: StatusBoard,
}

impl MutationPipeline {
    #[must_use]
    pub fn new(access: MapAccess, policy: RetryPolicy, status_ttl: Duration) -> Self {
        Self {
            access,
            annotations: EntityStore::new(),
            floors: EntityStore::new(),
            calls: CallQueue::new(policy),
            pending: HashMap::new(),
            busy: HashMap::new(),
            loading: HashMap::new(),
            next_temp: 1,
            events: VecDeque::new(),
            status: StatusBoard::new(status_ttl),
        }
    }

    #[must_use]
    pub fn from_config(access: MapAccess, config: &PinmapConfig) -> Self {
        Self::new(access, config.retry.policy(), config.status.ttl())
    }

    #[must_use]
    pub const fn access(&self) -> &MapAccess {
        &self.access
    }

    /// Change collaboration mode (the owner toggled public editing).
    pub fn set_publicly_editable(&mut self, publicly_editable: bool) {
        self.access.publicly_editable = publicly_editable;
    }

    /// The shared annotation collection.
    #[must_use]
    pub const fn annotations(&self) -> &EntityStore<Annotation> {
        &self.annotations
    }

    /// The shared floor collection.
    #[must_use]
    pub const fn floors(&self) -> &EntityStore<Floor> {
        &self.floors
    }

    /// Annotations on one floor, in collection order.
    #[must_use]
    pub fn annotations_on(&self, floor: &FloorId) -> Vec<Annotation> {
        self.annotations
            .snapshot()
            .iter()
            .filter(|a| &a.floor_id == floor)
            .cloned()
            .collect()
    }

    #[must_use]
    pub const fn status(&self) -> &StatusBoard {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut StatusBoard {
        &mut self.status
    }

    /// Drain outcome events in emission order.
    pub fn drain_events(&mut self) -> Vec<MutationEvent> {
        self.events.drain(..).collect()
    }

    #[must_use]
    pub fn is_busy(&self, entity: &EntityKey) -> bool {
        self.busy.contains_key(entity)
    }

    fn next_temp_id(&mut self) -> u64 {
        let id = self.next_temp;
        self.next_temp += 1;
        id
    }

    fn ensure_idle(&self, entity: &EntityKey) -> Result<(), MutationError> {
        if self.busy.contains_key(entity) {
            return Err(MutationError::EntityBusy(entity.to_string()));
        }
        Ok(())
    }

    fn submit(&mut self, entity: EntityKey, call: RemoteCall, op: PendingOp) -> Ticket {
        let id = self.calls.issue(call);
        self.busy.insert(entity.clone(), id);
        self.pending.insert(id, op);
        Ticket::Issued { call: id, entity }
    }

    /// Add a pin to `floor`.
    pub fn create_annotation(
        &mut self,
        actor: &Actor,
        floor: &FloorId,
        draft: AnnotationDraft,
    ) -> Result<Ticket, MutationError> {
        let _span = info_span!(
            "pinmap.mutation",
            op = MutationKind::CreateAnnotation.as_str(),
            floor = %floor
        )
        .entered();

        self.access.authorize(actor, Action::CreateAnnotation)?;
        let parent = self.stored_parent(floor)?;
        let temp = AnnotationId::Temp(self.next_temp_id());

        let draft = AnnotationDraft {
            position: draft.position.clamp(),
            ..draft
        };
        self.annotations.push(Annotation {
            id: temp.clone(),
            floor_id: floor.clone(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            position: draft.position,
            image: None,
            author: actor.editor().map(|editor| editor.authorship()),
            pending: true,
        });
        debug!("optimistic annotation inserted");

        Ok(self.submit(
            EntityKey::Annotation(temp.clone()),
            RemoteCall::CreateAnnotation {
                actor: actor.clone(),
                floor: parent,
                draft,
            },
            PendingOp::CreateAnnotation { temp },
        ))
    }

    fn stored_parent(&self, floor: &FloorId) -> Result<String, MutationError> {
        let Some(stored) = floor.as_stored() else {
            return Err(MutationError::PendingParent(format!("floor {floor}")));
        };
        if !self.floors.contains(floor) {
            return Err(MutationError::UnknownEntity(format!("floor {floor}")));
        }
        Ok(stored.to_owned())
    }

    /// Edit a pin's title and description.
    pub fn update_annotation(
        &mut self,
        actor: &Actor,
        id: &AnnotationId,
        patch: AnnotationPatch,
    ) -> Result<Ticket, MutationError> {
        let _span = info_span!(
            "pinmap.mutation",
            op = MutationKind::UpdateAnnotation.as_str(),
            entity = %id
        )
        .entered();

        let key = EntityKey::Annotation(id.clone());
        self.ensure_idle(&key)?;
        let prior = self
            .annotations
            .get(id)
            .ok_or_else(|| MutationError::UnknownEntity(key.to_string()))?;
        self.access.authorize(actor, Action::UpdateAnnotation(&prior))?;
        let Some(stored) = id.as_stored() else {
            return Err(MutationError::EntityBusy(key.to_string()));
        };
        let stored = stored.to_owned();

        let mut optimistic = prior.clone();
        optimistic.title = patch.title.clone();
        optimistic.description = patch.description.clone();
        optimistic.pending = true;
        self.annotations.replace(id, optimistic);

        Ok(self.submit(
            key,
            RemoteCall::UpdateAnnotation {
                actor: actor.clone(),
                annotation: stored,
                patch,
            },
            PendingOp::UpdateAnnotation {
                id: id.clone(),
                prior,
            },
        ))
    }

    fn duplicate_delete(&self, key: &EntityKey) -> Option<Result<Ticket, MutationError>> {
        let call = *self.busy.get(key)?;
        let is_delete = self.pending.get(&call).is_some_and(PendingOp::is_delete);
        Some(if is_delete {
            debug!(%call, "delete already in flight");
            Ok(Ticket::Issued {
                call,
                entity: key.clone(),
            })
        } else {
            Err(MutationError::EntityBusy(key.to_string()))
        })
    }

    /// Delete a pin. Deleting an absent pin succeeds without a remote call.
    pub fn delete_annotation(
        &mut self,
        actor: &Actor,
        id: &AnnotationId,
    ) -> Result<Ticket, MutationError> {
        let _span = info_span!(
            "pinmap.mutation",
            op = MutationKind::DeleteAnnotation.as_str(),
            entity = %id
        )
        .entered();

        let key = EntityKey::Annotation(id.clone());
        if let Some(result) = self.duplicate_delete(&key) {
            return result;
        }
        let Some(prior) = self.annotations.get(id) else {
            info!("annotation already absent, delete is a no-op");
            return Ok(Ticket::AlreadyDeleted { entity: key });
        };
        self.access.authorize(actor, Action::DeleteAnnotation(&prior))?;
        let Some(stored) = id.as_stored() else {
            return Err(MutationError::EntityBusy(key.to_string()));
        };
        let stored = stored.to_owned();

        let successors = self.annotations.successors_of(id);
        let Some((_, prior)) = self.annotations.remove(id) else {
            return Ok(Ticket::AlreadyDeleted { entity: key });
        };
        Ok(self.submit(
            key,
            RemoteCall::DeleteAnnotation {
                actor: actor.clone(),
                annotation: stored,
            },
            PendingOp::DeleteAnnotation {
                id: id.clone(),
                prior,
                successors,
            },
        ))
    }

    /// Add a floor to the map.
    pub fn create_floor(&mut self, actor: &Actor, draft: FloorDraft) -> Result<Ticket, MutationError> {
        let _span = info_span!(
            "pinmap.mutation",
            op = MutationKind::CreateFloor.as_str(),
            number = draft.number
        )
        .entered();

        self.access.authorize(actor, Action::CreateFloor)?;
        let temp = FloorId::Temp(self.next_temp_id());
        self.floors.push(Floor {
            id: temp.clone(),
            map_id: self.access.map_id.clone(),
            number: draft.number,
            name: draft.name.clone(),
            image: None,
            pending: true,
        });

        Ok(self.submit(
            EntityKey::Floor(temp.clone()),
            RemoteCall::CreateFloor {
                actor: actor.clone(),
                map: self.access.map_id.clone(),
                draft,
            },
            PendingOp::CreateFloor { temp },
        ))
    }

    /// Delete a floor and, optimistically, its annotations.
    pub fn delete_floor(&mut self, actor: &Actor, id: &FloorId) -> Result<Ticket, MutationError> {
        let _span = info_span!(
            "pinmap.mutation",
            op = MutationKind::DeleteFloor.as_str(),
            entity = %id
        )
        .entered();

        let key = EntityKey::Floor(id.clone());
        if let Some(result) = self.duplicate_delete(&key) {
            return result;
        }
        if !self.floors.contains(id) {
            info!("floor already absent, delete is a no-op");
            return Ok(Ticket::AlreadyDeleted { entity: key });
        }
        self.access.authorize(actor, Action::DeleteFloor)?;
        let Some(stored) = id.as_stored() else {
            return Err(MutationError::EntityBusy(key.to_string()));
        };
        let stored = stored.to_owned();
        let children_busy = self.annotations.snapshot().iter().any(|a| {
            &a.floor_id == id && self.busy.contains_key(&EntityKey::Annotation(a.id.clone()))
        });
        if children_busy {
            return Err(MutationError::EntityBusy(format!(
                "{key} (an annotation on it is in flight)"
            )));
        }

        let successors = self.floors.successors_of(id);
        let Some((_, prior)) = self.floors.remove(id) else {
            return Ok(Ticket::AlreadyDeleted { entity: key });
        };
        let cascade: Vec<(Annotation, Vec<AnnotationId>)> = self
            .annotations_on(id)
            .into_iter()
            .map(|a| {
                let after = self.annotations.successors_of(&a.id);
                (a, after)
            })
            .collect();
        self.annotations.remove_where(|a| &a.floor_id == id);
        debug!(cascade = cascade.len(), "floor removed optimistically");

        Ok(self.submit(
            key,
            RemoteCall::DeleteFloor {
                actor: actor.clone(),
                floor: stored,
            },
            PendingOp::DeleteFloor {
                id: id.clone(),
                prior,
                successors,
                cascade,
            },
        ))
    }

    fn load(&mut self, scope: LoadScope, call: RemoteCall) -> CallId {
        if let Some(call) = self.loading.get(&scope) {
            return *call;
        }
        let id = self.calls.issue(call);
        self.loading.insert(scope.clone(), id);
        self.pending.insert(id, PendingOp::Load(scope));
        id
    }

    /// Fetch the map's floors.
    pub fn load_floors(&mut self) -> CallId {
        let map = self.access.map_id.clone();
        self.load(LoadScope::Floors, RemoteCall::ListFloors { map })
    }

    /// Fetch one floor's annotations.
    pub fn load_annotations(&mut self, floor: &FloorId) -> Result<CallId, MutationError> {
        let Some(stored) = floor.as_stored() else {
            return Err(MutationError::PendingParent(format!("floor {floor}")));
        };
        let call = RemoteCall::ListAnnotations {
            floor: stored.to_owned(),
        };
        Ok(self.load(LoadScope::Annotations(floor.clone()), call))
    }

    /// Fan out one independent annotation fetch per confirmed floor.
    pub fn load_all_annotations(&mut self) -> Vec<CallId> {
        let floors: Vec<FloorId> = self
            .floors
            .snapshot()
            .iter()
            .filter(|f| !f.pending)
            .map(|f| f.id.clone())
            .collect();
        floors
            .iter()
            .filter_map(|floor| self.load_annotations(floor).ok())
            .collect()
    }

    fn release(&mut self, op: &PendingOp) {
        match op {
            PendingOp::Load(scope) => {
                self.loading.remove(scope);
            }
            other => {
                if let Some(entity) = other.entity() {
                    self.busy.remove(&entity);
                }
            }
        }
    }

    fn commit(&mut self, op: PendingOp, reply: RemoteReply) {
        let kind = op.kind();
        let entity = op.entity();
        self.release(&op);
        let label = entity.as_ref().map(ToString::to_string).unwrap_or_default();
        let _span = info_span!("pinmap.mutation", op = kind.as_str(), entity = %label).entered();

        match (op, reply) {
            (PendingOp::CreateAnnotation { temp }, RemoteReply::Annotation(confirmed)) => {
                let stored = confirmed.id.clone();
                self.annotations.install(&temp, confirmed);
                info!(id = %stored, "annotation created");
            }
            (PendingOp::UpdateAnnotation { id, .. }, RemoteReply::Annotation(mut confirmed)) => {
                confirmed.pending = false;
                self.annotations.replace(&id, confirmed);
                info!("annotation updated");
            }
            (PendingOp::CreateFloor { temp }, RemoteReply::Floor(confirmed)) => {
                let stored = confirmed.id.clone();
                self.floors.install(&temp, confirmed);
                info!(id = %stored, "floor created");
            }
            (PendingOp::DeleteAnnotation { .. } | PendingOp::DeleteFloor { .. }, _) => {
                info!("delete confirmed");
            }
            (PendingOp::Load(LoadScope::Floors), RemoteReply::Floors(floors)) => {
                let busy: HashSet<FloorId> = self.busy_floors();
                self.floors
                    .reconcile_scope(|_| true, |f| busy.contains(&f.id), floors);
                info!(count = self.floors.len(), "floors loaded");
            }
            (PendingOp::Load(LoadScope::Annotations(floor)), RemoteReply::Annotations(list)) => {
                let floor_key = EntityKey::Floor(floor.clone());
                if !self.floors.contains(&floor) || self.busy.contains_key(&floor_key) {
                    debug!(floor = %floor, "floor gone or changing, annotation list dropped");
                } else {
                    let busy: HashSet<AnnotationId> = self.busy_annotations();
                    self.annotations.reconcile_scope(
                        |a| a.floor_id == floor,
                        |a| busy.contains(&a.id),
                        list,
                    );
                    info!(floor = %floor, "annotations loaded");
                }
            }
            (op, reply) => {
                let error = ServiceError::invalid(format!(
                    "unexpected {} reply to {}",
                    reply.name(),
                    kind.as_str()
                ));
                self.rollback(op, error);
                return;
            }
        }
        self.events
            .push_back(MutationEvent::Committed { op: kind, entity });
    }

    fn busy_floors(&self) -> HashSet<FloorId> {
        self.busy
            .keys()
            .filter_map(|k| match k {
                EntityKey::Floor(id) => Some(id.clone()),
                EntityKey::Annotation(_) => None,
            })
            .collect()
    }

    fn busy_annotations(&self) -> HashSet<AnnotationId> {
        self.busy
            .keys()
            .filter_map(|k| match k {
                EntityKey::Annotation(id) => Some(id.clone()),
                EntityKey::Floor(_) => None,
            })
            .collect()
    }

    fn rollback(&mut self, op: PendingOp, error: ServiceError) {
        let kind = op.kind();
        let entity = op.entity();
        self.release(&op);
        let now = self.calls.now();
        self.status.post(
            StatusLevel::Error,
            format!("{}: {error}", kind.failure_text()),
            now,
        );

        match op {
            PendingOp::CreateAnnotation { temp } => {
                self.annotations.remove(&temp);
            }
            PendingOp::UpdateAnnotation { id, prior } => {
                self.annotations.replace(&id, prior);
            }
            PendingOp::DeleteAnnotation {
                prior, successors, ..
            } => {
                self.annotations.reinsert(prior, &successors);
            }
            PendingOp::CreateFloor { temp } => {
                self.floors.remove(&temp);
            }
            PendingOp::DeleteFloor {
                prior,
                successors,
                cascade,
                ..
            } => {
                self.floors.reinsert(prior, &successors);
                for (annotation, after) in cascade.into_iter().rev() {
                    self.annotations.reinsert(annotation, &after);
                }
            }
            PendingOp::Load(scope) => {
                warn!(op = kind.as_str(), %error, "load failed");
                let floor = match scope {
                    LoadScope::Annotations(floor) => Some(floor),
                    LoadScope::Floors => None,
                };
                self.events.push_back(MutationEvent::LoadFailed {
                    op: kind,
                    floor,
                    error: error.into(),
                });
                return;
            }
        }

        let Some(entity) = entity else {
            return;
        };
        warn!(op = kind.as_str(), entity = %entity, %error, "mutation rolled back");
        self.events.push_back(MutationEvent::RolledBack {
            op: kind,
            entity,
            error: error.into(),
        });
    }
}

impl CallSource for MutationPipeline {
    fn take_calls(&mut self) -> Vec<OutgoingCall> {
        self.calls.take()
    }

    fn complete(&mut self, id: CallId, result: ServiceResult<RemoteReply>) {
        let Some((kind, is_delete)) = self.pending.get(&id).map(|op| (op.kind(), op.is_delete()))
        else {
            debug!(%id, "completion for unknown call ignored");
            return;
        };
        let result = match result {
            Err(ServiceError::NotFound(what)) if is_delete => {
                debug!(%id, %what, "delete target already gone, treating as success");
                Ok(RemoteReply::Done)
            }
            other => other,
        };

        match result {
            Ok(reply) => {
                self.calls.settle(id);
                if let Some(op) = self.pending.remove(&id) {
                    self.commit(op, reply);
                }
            }
            Err(error) => match self.calls.fail(id, error) {
                RetryDecision::Retrying { attempt, delay } => {
                    self.events.push_back(MutationEvent::Retrying {
                        op: kind,
                        call: id,
                        attempt,
                        delay,
                    });
                }
                RetryDecision::GiveUp(error) => {
                    if let Some(op) = self.pending.remove(&id) {
                        self.rollback(op, error);
                    }
                }
                RetryDecision::Unknown => {
                    debug!(%id, "failure for call not in flight ignored");
                }
            },
        }
    }

    fn tick(&mut self, now: Duration) {
        self.calls.release_due(now);
        self.status.expire(now);
    }

    fn next_wakeup(&self) -> Option<Duration> {
        self.calls.next_wakeup()
    }

    fn is_idle(&self) -> bool {
        self.calls.is_idle()
    }
}
