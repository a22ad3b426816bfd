#![forbid(unsafe_code)]

//! An authoritative, in-process record service.
//!
//! [`InMemoryRecordService`] behaves like the real backend as far as the
//! core can observe: it assigns ids, re-checks every permission the client
//! gate checks, validates input, and reports deletes of absent records as
//! `NotFound`. Transport faults (network, timeout) are not its business;
//! the [`Driver`](crate::Driver) injects those.

use std::cell::RefCell;
use std::collections::BTreeMap;

use pinmap_core::{
    Actor, Annotation, AnnotationDraft, AnnotationId, AnnotationPatch, Authorship, EditorId,
    EditorIdentity, Floor, FloorDraft, FloorId, ImageRef, Map, MapId, Position, ServiceError, ServiceResult,
    Verification,
};
use pinmap_runtime::RecordService;
use tracing::debug;

#[derive(Debug, Default)]
struct State {
    maps: BTreeMap<MapId, Map>,
    floors: Vec<Floor>,
    annotations: Vec<Annotation>,
    editors: BTreeMap<EditorId, EditorIdentity>,
    next_id: u64,
    log: Vec<&'static str>,
}

impl State {
    fn issue_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn floor(&self, floor: &str) -> ServiceResult<&Floor> {
        self.floors
            .iter()
            .find(|f| f.id.as_stored() == Some(floor))
            .ok_or_else(|| ServiceError::not_found(format!("floor {floor}")))
    }

    fn map_of_floor(&self, floor: &str) -> ServiceResult<&Map> {
        let map_id = &self.floor(floor)?.map_id;
        self.maps
            .get(map_id)
            .ok_or_else(|| ServiceError::not_found(format!("map {map_id}")))
    }

    fn annotation_index(&self, annotation: &str) -> ServiceResult<usize> {
        self.annotations
            .iter()
            .position(|a| a.id.as_stored() == Some(annotation))
            .ok_or_else(|| ServiceError::not_found(format!("annotation {annotation}")))
    }

    /// The editor behind `actor`, if the token checks out for `map`.
    fn authenticated_editor(&self, actor: &Actor, map: &Map) -> ServiceResult<Option<Authorship>> {
        match actor {
            Actor::Owner | Actor::Administrator => Ok(None),
            Actor::Viewer => Err(ServiceError::denied("anonymous write")),
            Actor::Editor(identity) => {
                let known = self
                    .editors
                    .get(&identity.id)
                    .filter(|known| known.token == identity.token)
                    .ok_or_else(|| ServiceError::denied("unknown editor"))?;
                if known.map_id != map.id {
                    return Err(ServiceError::denied("editor belongs to another map"));
                }
                if !map.publicly_editable {
                    return Err(ServiceError::denied("map is private"));
                }
                Ok(Some(known.authorship()))
            }
        }
    }

    fn require_author(&self, actor: &Actor, annotation: &Annotation) -> ServiceResult<()> {
        let floor = annotation
            .floor_id
            .as_stored()
            .ok_or_else(|| ServiceError::invalid("unstored floor"))?;
        let map = self.map_of_floor(floor)?;
        match self.authenticated_editor(actor, map)? {
            None => Ok(()),
            Some(author) if annotation.is_authored_by(&author.editor_id) => Ok(()),
            Some(_) => Err(ServiceError::denied("not the author")),
        }
    }
}

fn validate_title(title: &str) -> ServiceResult<()> {
    if title.trim().is_empty() {
        return Err(ServiceError::invalid("title must not be empty"));
    }
    Ok(())
}

/// In-memory record service with interior mutability.
#[derive(Debug, Default)]
pub struct InMemoryRecordService {
    state: RefCell<State>,
}

impl InMemoryRecordService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a map.
    pub fn add_map(&self, id: &str, publicly_editable: bool) -> Map {
        let map = Map {
            id: MapId::new(id),
            title: format!("Map {id}"),
            description: String::new(),
            publicly_editable,
        };
        self.state
            .borrow_mut()
            .maps
            .insert(map.id.clone(), map.clone());
        map
    }

    pub fn set_publicly_editable(&self, map: &MapId, publicly_editable: bool) {
        if let Some(map) = self.state.borrow_mut().maps.get_mut(map) {
            map.publicly_editable = publicly_editable;
        }
    }

    /// Seed a floor with an uploaded image, bypassing permission checks.
    pub fn seed_floor(&self, map: &MapId, number: i32, name: &str) -> Floor {
        let mut state = self.state.borrow_mut();
        let id = state.issue_id("f");
        let floor = Floor {
            image: Some(ImageRef::new(format!("floors/{id}.png"))),
            id: FloorId::stored(id),
            map_id: map.clone(),
            number,
            name: name.to_owned(),
            pending: false,
        };
        state.floors.push(floor.clone());
        floor
    }

    /// Seed an annotation directly, bypassing permission checks.
    pub fn seed_annotation(
        &self,
        floor: &FloorId,
        title: &str,
        position: Position,
        author: Option<&EditorIdentity>,
    ) -> Annotation {
        let mut state = self.state.borrow_mut();
        let annotation = Annotation {
            id: AnnotationId::stored(state.issue_id("a")),
            floor_id: floor.clone(),
            title: title.to_owned(),
            description: String::new(),
            position: position.clamp(),
            image: None,
            author: author.map(EditorIdentity::authorship),
            pending: false,
        };
        state.annotations.push(annotation.clone());
        annotation
    }

    /// Seed an editor identity directly.
    pub fn seed_editor(&self, map: &MapId, nickname: &str) -> EditorIdentity {
        let mut state = self.state.borrow_mut();
        let id = state.issue_id("e");
        let identity = EditorIdentity {
            id: EditorId::new(id.as_str()),
            map_id: map.clone(),
            nickname: nickname.to_owned(),
            token: format!("tok-{id}"),
        };
        state.editors.insert(identity.id.clone(), identity.clone());
        identity
    }

    /// Forget an editor, as if the backend expired it.
    pub fn revoke_editor(&self, editor: &EditorId) -> bool {
        self.state.borrow_mut().editors.remove(editor).is_some()
    }

    /// Stored annotations on `floor`, in insertion order.
    #[must_use]
    pub fn annotations_on(&self, floor: &FloorId) -> Vec<Annotation> {
        self.state
            .borrow()
            .annotations
            .iter()
            .filter(|a| &a.floor_id == floor)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn floors_of(&self, map: &MapId) -> Vec<Floor> {
        self.state
            .borrow()
            .floors
            .iter()
            .filter(|f| &f.map_id == map)
            .cloned()
            .collect()
    }

    /// Operation names in the order they reached the service.
    #[must_use]
    pub fn log(&self) -> Vec<&'static str> {
        self.state.borrow().log.clone()
    }

    /// How many times `op` reached the service.
    #[must_use]
    pub fn call_count(&self, op: &str) -> usize {
        self.state.borrow().log.iter().filter(|o| **o == op).count()
    }

    fn record(&self, op: &'static str) {
        debug!(op, "record service call");
        self.state.borrow_mut().log.push(op);
    }
}

impl RecordService for InMemoryRecordService {
    fn list_floors(&self, map: &MapId) -> ServiceResult<Vec<Floor>> {
        self.record("listFloors");
        let state = self.state.borrow();
        if !state.maps.contains_key(map) {
            return Err(ServiceError::not_found(format!("map {map}")));
        }
        Ok(state
            .floors
            .iter()
            .filter(|f| &f.map_id == map)
            .cloned()
            .collect())
    }

    fn create_floor(&self, actor: &Actor, map: &MapId, draft: &FloorDraft) -> ServiceResult<Floor> {
        self.record("createFloor");
        if !actor.is_privileged() {
            return Err(ServiceError::denied("floors are owner-only"));
        }
        let mut state = self.state.borrow_mut();
        if !state.maps.contains_key(map) {
            return Err(ServiceError::not_found(format!("map {map}")));
        }
        validate_title(&draft.name)?;
        let floor = Floor {
            id: FloorId::stored(state.issue_id("f")),
            map_id: map.clone(),
            number: draft.number,
            name: draft.name.trim().to_owned(),
            image: None,
            pending: false,
        };
        state.floors.push(floor.clone());
        Ok(floor)
    }

    fn delete_floor(&self, actor: &Actor, floor: &str) -> ServiceResult<()> {
        self.record("deleteFloor");
        if !actor.is_privileged() {
            return Err(ServiceError::denied("floors are owner-only"));
        }
        let mut state = self.state.borrow_mut();
        let id = state.floor(floor)?.id.clone();
        state.floors.retain(|f| f.id != id);
        state.annotations.retain(|a| a.floor_id != id);
        Ok(())
    }

    fn list_annotations(&self, floor: &str) -> ServiceResult<Vec<Annotation>> {
        self.record("listAnnotations");
        let state = self.state.borrow();
        let id = state.floor(floor)?.id.clone();
        Ok(state
            .annotations
            .iter()
            .filter(|a| a.floor_id == id)
            .cloned()
            .collect())
    }

    fn create_annotation(
        &self,
        actor: &Actor,
        floor: &str,
        draft: &AnnotationDraft,
    ) -> ServiceResult<Annotation> {
        self.record("createAnnotation");
        let mut state = self.state.borrow_mut();
        let map = state.map_of_floor(floor)?.clone();
        let author = state.authenticated_editor(actor, &map)?;
        validate_title(&draft.title)?;
        if !draft.position.is_in_range() {
            return Err(ServiceError::invalid("position out of range"));
        }
        let annotation = Annotation {
            id: AnnotationId::stored(state.issue_id("a")),
            floor_id: FloorId::stored(floor),
            title: draft.title.clone(),
            description: draft.description.clone(),
            position: draft.position,
            image: None,
            author,
            pending: false,
        };
        state.annotations.push(annotation.clone());
        Ok(annotation)
    }

    fn update_annotation(
        &self,
        actor: &Actor,
        annotation: &str,
        patch: &AnnotationPatch,
    ) -> ServiceResult<Annotation> {
        self.record("updateAnnotation");
        let mut state = self.state.borrow_mut();
        let index = state.annotation_index(annotation)?;
        state.require_author(actor, &state.annotations[index])?;
        validate_title(&patch.title)?;
        let stored = &mut state.annotations[index];
        stored.title = patch.title.clone();
        stored.description = patch.description.clone();
        Ok(stored.clone())
    }

    fn delete_annotation(&self, actor: &Actor, annotation: &str) -> ServiceResult<()> {
        self.record("deleteAnnotation");
        let mut state = self.state.borrow_mut();
        let index = state.annotation_index(annotation)?;
        state.require_author(actor, &state.annotations[index])?;
        state.annotations.remove(index);
        Ok(())
    }

    fn register_editor(&self, map: &MapId, nickname: &str) -> ServiceResult<EditorIdentity> {
        self.record("registerEditor");
        let publicly_editable = self
            .state
            .borrow()
            .maps
            .get(map)
            .map(|m| m.publicly_editable)
            .ok_or_else(|| ServiceError::not_found(format!("map {map}")))?;
        if !publicly_editable {
            return Err(ServiceError::denied("map is private"));
        }
        validate_title(nickname)?;
        Ok(self.seed_editor(map, nickname.trim()))
    }

    fn verify_editor(&self, editor: &EditorId, token: &str) -> ServiceResult<Verification> {
        self.record("verifyEditor");
        let state = self.state.borrow();
        Ok(match state.editors.get(editor) {
            Some(known) if known.token == token => Verification {
                verified: true,
                nickname: Some(known.nickname.clone()),
                map_id: Some(known.map_id.clone()),
            },
            _ => Verification {
                verified: false,
                nickname: None,
                map_id: None,
            },
        })
    }
}
