#![forbid(unsafe_code)]

//! Local permission check run before any optimistic apply.
//!
//! The record service re-checks everything; this gate exists so a
//! forbidden mutation never flashes into the view and never costs a
//! round trip.
//!
//! | Actor         | Annotations                                   | Floors |
//! |---------------|-----------------------------------------------|--------|
//! | Owner / Admin | create, update, delete any                    | all    |
//! | Editor        | public map only: create; update/delete own    | none   |
//! | Viewer        | none                                          | none   |

use pinmap_core::{Actor, Annotation, MapId};

use super::MutationError;

/// What the actor wants to do.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    CreateAnnotation,
    UpdateAnnotation(&'a Annotation),
    DeleteAnnotation(&'a Annotation),
    CreateFloor,
    DeleteFloor,
}

impl Action<'_> {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateAnnotation => "create annotation",
            Self::UpdateAnnotation(_) => "update annotation",
            Self::DeleteAnnotation(_) => "delete annotation",
            Self::CreateFloor => "create floor",
            Self::DeleteFloor => "delete floor",
        }
    }
}

/// Access settings of the map being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapAccess {
    pub map_id: MapId,
    pub publicly_editable: bool,
}

impl MapAccess {
    #[must_use]
    pub fn new(map_id: MapId, publicly_editable: bool) -> Self {
        Self {
            map_id,
            publicly_editable,
        }
    }

    /// Decide whether `actor` may perform `action` on this map.
    pub fn authorize(&self, actor: &Actor, action: Action<'_>) -> Result<(), MutationError> {
        let deny = |why: &str| {
            Err(MutationError::PermissionDenied(format!(
                "{}: {why}",
                action.as_str()
            )))
        };
        match actor {
            Actor::Owner | Actor::Administrator => Ok(()),
            Actor::Viewer => deny("read-only access"),
            Actor::Editor(editor) => {
                if !self.publicly_editable {
                    return deny("map is not open for collaboration");
                }
                if editor.map_id != self.map_id {
                    return deny("editor identity belongs to another map");
                }
                match action {
                    Action::CreateAnnotation => Ok(()),
                    Action::UpdateAnnotation(annotation) | Action::DeleteAnnotation(annotation) => {
                        if annotation.is_authored_by(&editor.id) {
                            Ok(())
                        } else {
                            deny("not the author")
                        }
                    }
                    Action::CreateFloor | Action::DeleteFloor => deny("floors are owner-only"),
                }
            }
        }
    }
}
