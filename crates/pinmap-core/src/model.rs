#![forbid(unsafe_code)]

//! Records exchanged with the record service and held in local collections.
//!
//! # Identifiers
//!
//! Floors and annotations carry either a temporary identifier (issued
//! locally for an optimistic entry) or the identifier the record service
//! assigned. The two never collide: a `Temp` id is never sent to the
//! service as a mutation target.
//!
//! # Positions
//!
//! [`Position`] is a percentage of the floor image's width/height.
//! [`Position::clamped`] is the one clamp point, applied when a draft is
//! created and again before any geometry is computed. Out-of-range input is
//! never rejected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            /// Locally issued identifier of an optimistic entry.
            Temp(u64),
            /// Identifier assigned by the record service.
            Stored(String),
        }

        impl $name {
            /// Identifier assigned by the record service.
            pub fn stored(id: impl Into<String>) -> Self {
                Self::Stored(id.into())
            }

            /// True for locally issued identifiers.
            #[must_use]
            pub const fn is_temp(&self) -> bool {
                matches!(self, Self::Temp(_))
            }

            /// The service identifier, if this is not a temporary id.
            #[must_use]
            pub fn as_stored(&self) -> Option<&str> {
                match self {
                    Self::Stored(id) => Some(id),
                    Self::Temp(_) => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    Self::Temp(n) => write!(f, concat!($prefix, "-temp-{}"), n),
                    Self::Stored(id) => f.write_str(id),
                }
            }
        }
    };
}

string_id!(
    /// Identifier of a [`Map`].
    MapId
);
string_id!(
    /// Identifier of an ephemeral editor.
    EditorId
);
string_id!(
    /// URL or storage handle of an uploaded image.
    ImageRef
);
record_id!(
    /// Identifier of a [`Floor`].
    FloorId,
    "floor"
);
record_id!(
    /// Identifier of an [`Annotation`].
    AnnotationId,
    "pin"
);

/// Lower bound of a normalized coordinate.
pub const POSITION_MIN: f64 = 0.0;
/// Upper bound of a normalized coordinate.
pub const POSITION_MAX: f64 = 100.0;

/// Normalized anchor of an annotation, in percent of image width/height.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Percent of image width, `0..=100` once clamped.
    pub x: f64,
    /// Percent of image height, `0..=100` once clamped.
    pub y: f64,
}

impl Position {
    /// Create a position exactly as given, without clamping.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Create a position with both components clamped to `[0, 100]`.
    ///
    /// NaN components become `0`.
    #[inline]
    pub fn clamped(x: f64, y: f64) -> Self {
        Self::new(clamp_component(x), clamp_component(y))
    }

    /// Clamp this position to `[0, 100]` on both axes.
    #[inline]
    #[must_use]
    pub fn clamp(self) -> Self {
        Self::clamped(self.x, self.y)
    }

    /// True when both components already lie in `[0, 100]`.
    #[inline]
    pub fn is_in_range(&self) -> bool {
        (POSITION_MIN..=POSITION_MAX).contains(&self.x)
            && (POSITION_MIN..=POSITION_MAX).contains(&self.y)
    }
}

fn clamp_component(value: f64) -> f64 {
    if value.is_nan() {
        POSITION_MIN
    } else {
        value.clamp(POSITION_MIN, POSITION_MAX)
    }
}

/// Top-level collection of floors owned by one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Map {
    pub id: MapId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Anonymous collaborators may add pins and edit their own.
    #[serde(default)]
    pub publicly_editable: bool,
}

/// One floor-plan image ("Area") within a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Floor {
    pub id: FloorId,
    pub map_id: MapId,
    pub number: i32,
    pub name: String,
    /// `None` until an image has been uploaded.
    #[serde(default)]
    pub image: Option<ImageRef>,
    /// Optimistic entry awaiting confirmation.
    #[serde(skip)]
    pub pending: bool,
}

/// Who created an annotation when it was not the map owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorship {
    pub editor_id: EditorId,
    pub nickname: String,
}

/// A labeled point of interest ("Pin") anchored to a floor image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub floor_id: FloorId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub position: Position,
    #[serde(default)]
    pub image: Option<ImageRef>,
    /// Present only when a collaborative identity created the pin.
    #[serde(default)]
    pub author: Option<Authorship>,
    /// Optimistic entry awaiting confirmation.
    #[serde(skip)]
    pub pending: bool,
}

impl Annotation {
    /// True when `editor` authored this annotation.
    #[must_use]
    pub fn is_authored_by(&self, editor: &EditorId) -> bool {
        self.author
            .as_ref()
            .is_some_and(|author| &author.editor_id == editor)
    }
}

/// Payload of `createFloor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorDraft {
    pub number: i32,
    pub name: String,
}

/// Payload of `createAnnotation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDraft {
    pub title: String,
    pub description: String,
    pub position: Position,
}

impl AnnotationDraft {
    /// Create a draft; the position is clamped here.
    pub fn new(title: impl Into<String>, description: impl Into<String>, position: Position) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            position: position.clamp(),
        }
    }
}

/// Payload of `updateAnnotation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationPatch {
    pub title: String,
    pub description: String,
}

impl AnnotationPatch {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// A token-scoped, non-account identity bound to one map.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorIdentity {
    pub id: EditorId,
    pub map_id: MapId,
    pub nickname: String,
    pub token: String,
}

impl EditorIdentity {
    /// Authorship record stamped on annotations this editor creates.
    #[must_use]
    pub fn authorship(&self) -> Authorship {
        Authorship {
            editor_id: self.id.clone(),
            nickname: self.nickname.clone(),
        }
    }
}

impl fmt::Debug for EditorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorIdentity")
            .field("id", &self.id)
            .field("map_id", &self.map_id)
            .field("nickname", &self.nickname)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Result of `verifyEditor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub verified: bool,
    #[serde(default)]
    pub nickname: Option<String>,
    /// Map the identity belongs to, when the service reports it.
    #[serde(default)]
    pub map_id: Option<MapId>,
}

/// The party on whose behalf a mutation is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// Authenticated map owner.
    Owner,
    /// Authenticated administrator.
    Administrator,
    /// Active ephemeral collaborator.
    Editor(EditorIdentity),
    /// Anyone else; read-only.
    Viewer,
}

impl Actor {
    /// Owners and administrators bypass authorship checks.
    #[must_use]
    pub const fn is_privileged(&self) -> bool {
        matches!(self, Self::Owner | Self::Administrator)
    }

    /// The editor identity, for collaborative actors.
    #[must_use]
    pub fn editor(&self) -> Option<&EditorIdentity> {
        match self {
            Self::Editor(identity) => Some(identity),
            _ => None,
        }
    }
}
