#![forbid(unsafe_code)]

//! Ephemeral collaborator identity.
//!
//! Anyone may add pins to a publicly editable map after choosing a
//! nickname. The record service issues an identity (id + token) bound to
//! that one map; it is persisted client-side and re-verified on every
//! later visit.
//!
//! ```text
//!                 begin_session (nothing stored)
//!   Unregistered ◄─────────────────────────────┐
//!        │  ▲                                   │
//! register  │ rejected / network failure        │
//!        ▼  │                                   │
//!     Verifying ──── confirmed ────► Active ────┘ end_session / forget
//! ```
//!
//! # Invariants
//!
//! 1. [`IdentityManager::actor`] yields [`Actor::Editor`] only in `Active`,
//!    and only for the identity of the current session's map.
//! 2. A stored identity is deleted only when the service says it is not
//!    valid (`verified: false` or `NotFound`). Network failures keep it.
//! 3. Stored values are untrusted: unparsable or foreign-map entries are
//!    discarded with a warning.

use std::collections::HashMap;

use pinmap_core::{Actor, EditorIdentity, Map, MapId, ServiceError, ServiceResult};
use thiserror::Error;
use tracing::{debug, info, warn};
use web_time::Duration;

use crate::call_queue::{CallQueue, RetryDecision};
use crate::config::IdentityConfig;
use crate::persistence::{StorageBackend, StorageError};
use crate::reactive::{Observable, Subscription};
use crate::retry::RetryPolicy;
use crate::service::{CallId, CallSource, OutgoingCall, RemoteCall, RemoteReply};

/// Identity lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityState {
    #[default]
    Unregistered,
    /// A `register_editor` or `verify_editor` round trip is in flight.
    Verifying,
    Active(EditorIdentity),
}

impl IdentityState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::Verifying => "verifying",
            Self::Active(_) => "active",
        }
    }
}

/// What the host should do after [`IdentityManager::begin_session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    /// The map is private; collaborators cannot edit it.
    NotPublic,
    /// Ask the user for a nickname, then call `register`.
    NeedNickname,
    /// A stored identity is being re-verified.
    Verifying(CallId),
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("map is not open for collaboration")]
    NotPublic,

    #[error("no collaboration session is active")]
    NoSession,

    #[error("invalid nickname: {0}")]
    InvalidNickname(String),

    #[error("an identity round trip is already in flight")]
    Busy,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone)]
struct Session {
    map_id: MapId,
    publicly_editable: bool,
}

#[derive(Debug)]
enum IdentityOp {
    Register,
    Verify(EditorIdentity),
}

/// Per-visitor identity state machine.
#[derive(Debug)]
pub struct IdentityManager<S: StorageBackend> {
    storage: S,
    config: IdentityConfig,
    calls: CallQueue,
    pending: HashMap<CallId, IdentityOp>,
    session: Option<Session>,
    state: Observable<IdentityState>,
    last_error: Option<ServiceError>,
}

impl<S: StorageBackend> IdentityManager<S> {
    #[must_use]
    pub fn new(storage: S, config: IdentityConfig, policy: RetryPolicy) -> Self {
        Self {
            storage,
            config,
            calls: CallQueue::new(policy),
            pending: HashMap::new(),
            session: None,
            state: Observable::new(IdentityState::Unregistered),
            last_error: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> IdentityState {
        self.state.get()
    }

    pub fn subscribe(&self, callback: impl Fn(&IdentityState) + 'static) -> Subscription {
        self.state.subscribe(callback)
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// The failure behind the last revert to `Unregistered`, if any.
    /// A retryable error means the stored identity is still there.
    #[must_use]
    pub const fn last_error(&self) -> Option<&ServiceError> {
        self.last_error.as_ref()
    }

    fn storage_key(&self, map: &MapId) -> String {
        format!("{}/{}", self.config.storage_namespace, map)
    }

    fn transition(&self, next: IdentityState) {
        let from = self.state.with(IdentityState::as_str);
        let to = next.as_str();
        if self.state.set(next) {
            info!(from, to, "identity state changed");
        }
    }

    /// Who is acting right now.
    #[must_use]
    pub fn actor(&self) -> Actor {
        let Some(session) = &self.session else {
            return Actor::Viewer;
        };
        self.state.with(|state| match state {
            IdentityState::Active(identity) if identity.map_id == session.map_id => {
                Actor::Editor(identity.clone())
            }
            _ => Actor::Viewer,
        })
    }

    /// Start (or restart) a session on `map`.
    pub fn begin_session(&mut self, map: &Map) -> Result<SessionStep, IdentityError> {
        self.abandon_calls();
        self.last_error = None;
        self.session = Some(Session {
            map_id: map.id.clone(),
            publicly_editable: map.publicly_editable,
        });
        self.transition(IdentityState::Unregistered);
        if !map.publicly_editable {
            debug!(map = %map.id, "map is private, no identity session");
            return Ok(SessionStep::NotPublic);
        }

        let Some(stored) = self.load_stored(&map.id)? else {
            return Ok(SessionStep::NeedNickname);
        };
        let call = self.calls.issue(RemoteCall::VerifyEditor {
            editor: stored.id.clone(),
            token: stored.token.clone(),
        });
        self.pending.insert(call, IdentityOp::Verify(stored));
        self.transition(IdentityState::Verifying);
        Ok(SessionStep::Verifying(call))
    }

    fn load_stored(&mut self, map: &MapId) -> Result<Option<EditorIdentity>, IdentityError> {
        let key = self.storage_key(map);
        let Some(raw) = self.storage.load(&key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<EditorIdentity>(&raw) {
            Ok(identity) if &identity.map_id == map => Ok(Some(identity)),
            Ok(identity) => {
                warn!(key = %key, stored_map = %identity.map_id, "stored identity belongs to another map, discarding");
                self.storage.remove(&key)?;
                Ok(None)
            }
            Err(err) => {
                warn!(key = %key, %err, "stored identity is unreadable, discarding");
                self.storage.remove(&key)?;
                Ok(None)
            }
        }
    }

    /// Register a new identity under `nickname`.
    pub fn register(&mut self, nickname: &str) -> Result<CallId, IdentityError> {
        let session = self.session.as_ref().ok_or(IdentityError::NoSession)?;
        if !session.publicly_editable {
            return Err(IdentityError::NotPublic);
        }
        if !self.pending.is_empty() {
            return Err(IdentityError::Busy);
        }
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(IdentityError::InvalidNickname("nickname is empty".into()));
        }
        let len = nickname.chars().count();
        if len > self.config.max_nickname_len {
            return Err(IdentityError::InvalidNickname(format!(
                "{len} characters, at most {} allowed",
                self.config.max_nickname_len
            )));
        }

        let call = self.calls.issue(RemoteCall::RegisterEditor {
            map: session.map_id.clone(),
            nickname: nickname.to_owned(),
        });
        self.pending.insert(call, IdentityOp::Register);
        self.last_error = None;
        self.transition(IdentityState::Verifying);
        Ok(call)
    }

    /// Leave the current map. The stored identity is kept for next time.
    pub fn end_session(&mut self) {
        self.abandon_calls();
        self.session = None;
        self.transition(IdentityState::Unregistered);
    }

    /// Drop the stored identity for the current map.
    pub fn forget(&mut self) -> Result<(), IdentityError> {
        let session = self.session.as_ref().ok_or(IdentityError::NoSession)?;
        let key = self.storage_key(&session.map_id);
        self.storage.remove(&key)?;
        self.abandon_calls();
        self.transition(IdentityState::Unregistered);
        Ok(())
    }

    fn abandon_calls(&mut self) {
        if !self.pending.is_empty() {
            debug!(count = self.pending.len(), "abandoning identity calls");
        }
        for (id, _) in self.pending.drain() {
            self.calls.cancel(id);
        }
    }

    fn session_matches(&self, identity: &EditorIdentity) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.map_id == identity.map_id)
    }

    fn activate(&mut self, identity: EditorIdentity) {
        if !self.session_matches(&identity) {
            warn!(editor = %identity.id, "identity issued for another map, ignoring");
            self.transition(IdentityState::Unregistered);
            return;
        }
        let key = self.storage_key(&identity.map_id);
        match serde_json::to_string(&identity) {
            Ok(json) => {
                if let Err(err) = self.storage.store(&key, &json) {
                    warn!(key = %key, %err, "could not persist identity");
                }
            }
            Err(err) => warn!(key = %key, %err, "could not serialize identity"),
        }
        info!(editor = %identity.id, nickname = %identity.nickname, "editor identity active");
        self.transition(IdentityState::Active(identity));
    }

    fn discard(&mut self, identity: &EditorIdentity) {
        let key = self.storage_key(&identity.map_id);
        if let Err(err) = self.storage.remove(&key) {
            warn!(key = %key, %err, "could not remove rejected identity");
        }
        info!(editor = %identity.id, "stored identity rejected, registration required");
        self.transition(IdentityState::Unregistered);
    }

    fn resolve(&mut self, op: IdentityOp, result: ServiceResult<RemoteReply>) {
        match (op, result) {
            (IdentityOp::Register, Ok(RemoteReply::Editor(identity))) => self.activate(identity),
            (IdentityOp::Verify(stored), Ok(RemoteReply::Verification(verification))) => {
                let foreign = verification
                    .map_id
                    .as_ref()
                    .is_some_and(|map| map != &stored.map_id);
                if !verification.verified || foreign {
                    self.discard(&stored);
                    return;
                }
                let mut identity = stored;
                if let Some(nickname) = verification.nickname {
                    identity.nickname = nickname;
                }
                self.activate(identity);
            }
            (IdentityOp::Verify(stored), Err(ServiceError::NotFound(_))) => self.discard(&stored),
            (op, Err(error)) => {
                warn!(
                    op = match op {
                        IdentityOp::Register => "register",
                        IdentityOp::Verify(_) => "verify",
                    },
                    %error,
                    "identity round trip failed"
                );
                self.last_error = Some(error);
                self.transition(IdentityState::Unregistered);
            }
            (_, Ok(reply)) => {
                warn!(reply = reply.name(), "unexpected identity reply");
                self.last_error = Some(ServiceError::invalid(format!(
                    "unexpected {} reply",
                    reply.name()
                )));
                self.transition(IdentityState::Unregistered);
            }
        }
    }
}

impl<S: StorageBackend> CallSource for IdentityManager<S> {
    fn take_calls(&mut self) -> Vec<OutgoingCall> {
        self.calls.take()
    }

    fn complete(&mut self, id: CallId, result: ServiceResult<RemoteReply>) {
        if !self.pending.contains_key(&id) {
            debug!(%id, "completion for abandoned identity call ignored");
            return;
        }
        let result = match result {
            Ok(reply) => {
                self.calls.settle(id);
                Ok(reply)
            }
            Err(error) => match self.calls.fail(id, error) {
                RetryDecision::Retrying { .. } => return,
                RetryDecision::GiveUp(error) => Err(error),
                RetryDecision::Unknown => return,
            },
        };
        if let Some(op) = self.pending.remove(&id) {
            self.resolve(op, result);
        }
    }

    fn tick(&mut self, now: Duration) {
        self.calls.release_due(now);
    }

    fn next_wakeup(&self) -> Option<Duration> {
        self.calls.next_wakeup()
    }

    fn is_idle(&self) -> bool {
        self.calls.is_idle()
    }
}
