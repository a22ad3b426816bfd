#![forbid(unsafe_code)]

//! One visitor's session on one map.
//!
//! # Design
//!
//! [`MapSession`] wires the pieces a host would otherwise assemble by hand:
//! a shared [`EventBus`], the [`MutationPipeline`], the [`IdentityManager`],
//! and the [`MapView`]. Mutations go through the session so the acting
//! [`Actor`] always comes from the identity state, never from the caller.
//!
//! The session is itself a [`CallSource`]. Calls from the pipeline and the
//! identity manager are renumbered into one id space:
//!
//! ```text
//! pipeline  call-1 ─┐                ┌─► call-1 ─┐
//!                   ├─► take_calls ──┤           ├─► host
//! identity  call-1 ─┘                └─► call-2 ─┘
//! ```
//!
//! A completed `listFloors` immediately queues `listAnnotations` for every
//! loaded floor.
//!
//! # Invariants
//!
//! 1. Outer call ids are unique across both sources, and a retried call
//!    keeps its outer id.
//! 2. Routes of a source are released once that source is idle.

use std::collections::HashMap;

use pinmap_core::{
    Actor, AnnotationDraft, AnnotationId, AnnotationPatch, FloorDraft, FloorId, Map, PixelSize,
    ServiceResult,
};
use pinmap_runtime::{
    CallId, CallSource, EventBus, IdentityManager, MapAccess, MutationPipeline, OutgoingCall,
    PinmapConfig, RemoteReply, SessionStep, StorageBackend, Ticket,
};
use pinmap_view::{MapView, ViewConfig};
use tracing::{debug, info_span, warn};
use web_time::Duration;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Lane {
    Records,
    Identity,
}

#[derive(Debug, Default)]
struct Routes {
    last: u64,
    by_outer: HashMap<CallId, (Lane, CallId)>,
    by_inner: HashMap<(Lane, CallId), CallId>,
}

impl Routes {
    fn outgoing(&mut self, lane: Lane, call: OutgoingCall) -> OutgoingCall {
        let outer = match self.by_inner.get(&(lane, call.id)) {
            Some(outer) => *outer,
            None => {
                self.last += 1;
                let outer = CallId(self.last);
                self.by_inner.insert((lane, call.id), outer);
                self.by_outer.insert(outer, (lane, call.id));
                outer
            }
        };
        OutgoingCall { id: outer, ..call }
    }

    fn resolve(&self, outer: CallId) -> Option<(Lane, CallId)> {
        self.by_outer.get(&outer).copied()
    }

    fn release(&mut self, lane: Lane) {
        self.by_outer.retain(|_, (l, _)| *l != lane);
        self.by_inner.retain(|(l, _), _| *l != lane);
    }
}

/// Pipeline, identity, and view for one map.
#[derive(Debug)]
pub struct MapSession<S: StorageBackend> {
    map: Map,
    owner: bool,
    bus: EventBus,
    pipeline: MutationPipeline,
    identity: IdentityManager<S>,
    view: MapView,
    routes: Routes,
}

impl<S: StorageBackend> MapSession<S> {
    /// A session for an anonymous visitor.
    #[must_use]
    pub fn visitor(map: Map, storage: S, config: &PinmapConfig, viewport: PixelSize) -> Self {
        Self::new(map, false, storage, config, viewport)
    }

    /// A session for the authenticated map owner.
    #[must_use]
    pub fn owner(map: Map, storage: S, config: &PinmapConfig, viewport: PixelSize) -> Self {
        Self::new(map, true, storage, config, viewport)
    }

    fn new(map: Map, owner: bool, storage: S, config: &PinmapConfig, viewport: PixelSize) -> Self {
        let bus = EventBus::new();
        let access = MapAccess::new(map.id.clone(), map.publicly_editable);
        Self {
            pipeline: MutationPipeline::from_config(access, config),
            identity: IdentityManager::new(storage, config.identity.clone(), config.retry.policy()),
            view: MapView::new(ViewConfig::from_config(config), viewport, bus.clone()),
            map,
            owner,
            bus,
            routes: Routes::default(),
        }
    }

    /// Load the map and, for visitors, start the identity session.
    pub fn open(&mut self) -> Result<Option<SessionStep>> {
        let _span = info_span!("pinmap.session", map = %self.map.id).entered();
        self.pipeline.load_floors();
        if self.owner {
            return Ok(None);
        }
        Ok(Some(self.identity.begin_session(&self.map)?))
    }

    /// Leave the map. Pending identity calls are cancelled; the stored
    /// identity is kept.
    pub fn close(&mut self) {
        self.identity.end_session();
        self.routes.release(Lane::Identity);
    }

    /// The owner toggled collaborative editing.
    pub fn set_publicly_editable(&mut self, publicly_editable: bool) -> Result<Option<SessionStep>> {
        self.map.publicly_editable = publicly_editable;
        self.pipeline.set_publicly_editable(publicly_editable);
        if self.owner {
            return Ok(None);
        }
        self.routes.release(Lane::Identity);
        Ok(Some(self.identity.begin_session(&self.map)?))
    }

    #[must_use]
    pub const fn map(&self) -> &Map {
        &self.map
    }

    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub const fn pipeline(&self) -> &MutationPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut MutationPipeline {
        &mut self.pipeline
    }

    #[must_use]
    pub const fn identity(&self) -> &IdentityManager<S> {
        &self.identity
    }

    #[must_use]
    pub const fn view(&self) -> &MapView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut MapView {
        &mut self.view
    }

    /// Who mutations are attributed to right now.
    #[must_use]
    pub fn actor(&self) -> Actor {
        if self.owner {
            Actor::Owner
        } else {
            self.identity.actor()
        }
    }

    /// Register a collaborative identity under `nickname`.
    pub fn register(&mut self, nickname: &str) -> Result<CallId> {
        Ok(self.identity.register(nickname)?)
    }

    pub fn create_annotation(&mut self, floor: &FloorId, draft: AnnotationDraft) -> Result<Ticket> {
        let actor = self.actor();
        Ok(self.pipeline.create_annotation(&actor, floor, draft)?)
    }

    pub fn update_annotation(&mut self, id: &AnnotationId, patch: AnnotationPatch) -> Result<Ticket> {
        let actor = self.actor();
        Ok(self.pipeline.update_annotation(&actor, id, patch)?)
    }

    pub fn delete_annotation(&mut self, id: &AnnotationId) -> Result<Ticket> {
        let actor = self.actor();
        Ok(self.pipeline.delete_annotation(&actor, id)?)
    }

    pub fn create_floor(&mut self, draft: FloorDraft) -> Result<Ticket> {
        let actor = self.actor();
        Ok(self.pipeline.create_floor(&actor, draft)?)
    }

    pub fn delete_floor(&mut self, id: &FloorId) -> Result<Ticket> {
        let actor = self.actor();
        Ok(self.pipeline.delete_floor(&actor, id)?)
    }

    /// Bring the view up to date with the collections.
    pub fn sync_view(&mut self) -> bool {
        self.view.sync(&self.pipeline)
    }

    fn release_idle(&mut self) {
        if self.pipeline.is_idle() {
            self.routes.release(Lane::Records);
        }
        if self.identity.is_idle() {
            self.routes.release(Lane::Identity);
        }
    }
}

impl<S: StorageBackend> CallSource for MapSession<S> {
    fn take_calls(&mut self) -> Vec<OutgoingCall> {
        let records = self.pipeline.take_calls();
        let identity = self.identity.take_calls();
        let routes = &mut self.routes;
        let mut out = Vec::with_capacity(records.len() + identity.len());
        for call in records {
            out.push(routes.outgoing(Lane::Records, call));
        }
        for call in identity {
            out.push(routes.outgoing(Lane::Identity, call));
        }
        out
    }

    fn complete(&mut self, id: CallId, result: ServiceResult<RemoteReply>) {
        let Some((lane, inner)) = self.routes.resolve(id) else {
            warn!(call = %id, "completion for unknown call");
            return;
        };
        match lane {
            Lane::Records => {
                let floors_loaded = matches!(result, Ok(RemoteReply::Floors(_)));
                self.pipeline.complete(inner, result);
                if floors_loaded {
                    let queued = self.pipeline.load_all_annotations();
                    debug!(floors = queued.len(), "floors loaded, loading annotations");
                }
            }
            Lane::Identity => self.identity.complete(inner, result),
        }
        self.release_idle();
    }

    fn tick(&mut self, now: Duration) {
        self.pipeline.tick(now);
        self.identity.tick(now);
    }

    fn next_wakeup(&self) -> Option<Duration> {
        [self.pipeline.next_wakeup(), self.identity.next_wakeup()]
            .into_iter()
            .flatten()
            .min()
    }

    fn is_idle(&self) -> bool {
        self.pipeline.is_idle() && self.identity.is_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: u64, attempt: u32) -> OutgoingCall {
        OutgoingCall {
            id: CallId(id),
            attempt,
            call: pinmap_runtime::RemoteCall::ListFloors {
                map: pinmap_core::MapId::new("m1"),
            },
        }
    }

    #[test]
    fn lanes_share_one_id_space() {
        let mut routes = Routes::default();
        let a = routes.outgoing(Lane::Records, call(1, 1));
        let b = routes.outgoing(Lane::Identity, call(1, 1));
        assert_ne!(a.id, b.id);
        assert_eq!(routes.resolve(b.id), Some((Lane::Identity, CallId(1))));
    }

    #[test]
    fn retries_keep_their_outer_id() {
        let mut routes = Routes::default();
        let first = routes.outgoing(Lane::Records, call(7, 1));
        let retry = routes.outgoing(Lane::Records, call(7, 2));
        assert_eq!(first.id, retry.id);
        assert_eq!(retry.attempt, 2);
    }

    #[test]
    fn released_lane_forgets_routes() {
        let mut routes = Routes::default();
        let a = routes.outgoing(Lane::Records, call(1, 1));
        let b = routes.outgoing(Lane::Identity, call(1, 1));
        routes.release(Lane::Records);
        assert_eq!(routes.resolve(a.id), None);
        assert!(routes.resolve(b.id).is_some());
    }
}
