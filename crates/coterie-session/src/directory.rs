//! The session directory: which session we are in, and how to get back.
//!
//! Two pieces of state live here:
//!
//! - the **rejoin reference** ([`SessionReference`]) — what the last
//!   `join_session` asked for. Written optimistically on every join,
//!   normalized once the server confirms, persisted to [`Storage`], and
//!   cleared only by an explicit leave.
//! - the **active session** ([`ActiveSession`]) — what the server actually
//!   confirmed. In memory only; dropped on disconnect.
//!
//! ```text
//! remember(ref) ──→ [persisted ref]
//!                        │
//!                 (session_joined)
//!                        ▼
//!                    confirm() ──→ [normalized ref + active]
//!                                        │
//!         forget() ◀──(explicit leave)───┘
//! ```

use coterie_protocol::{
    ClientMessage, CoterieId, SessionId, SessionJoined, SessionType,
};
use serde::{Deserialize, Serialize};

use crate::{SessionError, Storage};

/// Storage key for the persisted rejoin reference.
pub const LAST_JOIN_OPTIONS_KEY: &str = "coterie.lastJoinOptions";

/// What a join asks for: a session id, a coterie id, or neither.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coterie_id: Option<CoterieId>,
}

impl SessionReference {
    /// A reference to a coterie-scoped session.
    pub fn coterie(id: impl Into<CoterieId>) -> Self {
        Self {
            session_id: None,
            coterie_id: Some(id.into()),
        }
    }

    /// A reference to an existing temporary session.
    pub fn session(id: impl Into<SessionId>) -> Self {
        Self {
            session_id: Some(id.into()),
            coterie_id: None,
        }
    }

    /// The canonical reference for a session the server confirmed.
    ///
    /// Coterie sessions are addressed by coterie id (the server uses the
    /// coterie id as the session id); temporary ones by session id.
    pub fn confirmed(joined: &SessionJoined) -> Self {
        match joined.session_type {
            SessionType::Coterie => {
                Self::coterie(joined.session_id.0.clone())
            }
            SessionType::Temporary => Self::session(joined.session_id.clone()),
        }
    }

    /// Builds the `join_session` frame for this reference.
    pub fn to_join_message(
        &self,
        character_name: Option<String>,
    ) -> ClientMessage {
        ClientMessage::JoinSession {
            session_id: self.session_id.clone(),
            coterie_id: self.coterie_id.clone(),
            character_name,
        }
    }
}

/// The server-confirmed session we are currently in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub session_id: SessionId,
    pub session_type: SessionType,
}

/// Tracks the rejoin reference and the active session.
pub struct SessionDirectory<S: Storage> {
    storage: S,
    last_join: Option<SessionReference>,
    active: Option<ActiveSession>,
}

impl<S: Storage> SessionDirectory<S> {
    /// Loads the persisted reference, if any. Does not connect anywhere.
    ///
    /// An unreadable or corrupt value is logged and treated as absent.
    pub fn load(storage: S) -> Self {
        let last_join = match read_reference(&storage) {
            Ok(reference) => reference,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring stored rejoin reference");
                None
            }
        };
        if let Some(reference) = &last_join {
            tracing::debug!(?reference, "loaded rejoin reference");
        }
        Self {
            storage,
            last_join,
            active: None,
        }
    }

    /// The reference the next reconnect will replay.
    pub fn last_join(&self) -> Option<&SessionReference> {
        self.last_join.as_ref()
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Records `reference` as the rejoin target, before any server reply.
    ///
    /// The in-memory copy is updated even if persisting fails.
    pub fn remember(
        &mut self,
        reference: SessionReference,
    ) -> Result<(), SessionError> {
        self.last_join = Some(reference);
        self.persist()
    }

    /// Applies a `session_joined` confirmation.
    pub fn confirm(
        &mut self,
        joined: &SessionJoined,
    ) -> Result<(), SessionError> {
        self.active = Some(ActiveSession {
            session_id: joined.session_id.clone(),
            session_type: joined.session_type,
        });
        self.remember(SessionReference::confirmed(joined))
    }

    /// Drops the active session but keeps the rejoin reference.
    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// Drops everything, including the persisted reference.
    pub fn forget(&mut self) -> Result<(), SessionError> {
        self.active = None;
        self.last_join = None;
        self.storage.remove(LAST_JOIN_OPTIONS_KEY)
    }

    fn persist(&self) -> Result<(), SessionError> {
        let Some(reference) = &self.last_join else {
            return Ok(());
        };
        let text = serde_json::to_string(reference).map_err(|source| {
            SessionError::CorruptValue {
                key: LAST_JOIN_OPTIONS_KEY.to_owned(),
                source,
            }
        })?;
        self.storage.set(LAST_JOIN_OPTIONS_KEY, &text)
    }
}

fn read_reference<S: Storage>(
    storage: &S,
) -> Result<Option<SessionReference>, SessionError> {
    let Some(text) = storage.get(LAST_JOIN_OPTIONS_KEY)? else {
        return Ok(None);
    };
    serde_json::from_str(&text).map(Some).map_err(|source| {
        SessionError::CorruptValue {
            key: LAST_JOIN_OPTIONS_KEY.to_owned(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;

    fn joined(id: &str, session_type: SessionType) -> SessionJoined {
        SessionJoined {
            session_id: SessionId::from(id),
            session_type,
            participants: vec![],
        }
    }

    // =====================================================================
    // SessionReference
    // =====================================================================

    #[test]
    fn test_reference_json_omits_absent_ids() {
        let json = serde_json::to_string(&SessionReference::coterie("abc"))
            .unwrap();
        assert_eq!(json, r#"{"coterieId":"abc"}"#);
    }

    #[test]
    fn test_confirmed_coterie_uses_coterie_id() {
        let reference =
            SessionReference::confirmed(&joined("abc", SessionType::Coterie));
        assert_eq!(reference, SessionReference::coterie("abc"));
    }

    #[test]
    fn test_confirmed_temporary_uses_session_id() {
        let reference = SessionReference::confirmed(&joined(
            "tmp-1",
            SessionType::Temporary,
        ));
        assert_eq!(reference, SessionReference::session("tmp-1"));
    }

    #[test]
    fn test_to_join_message_carries_ids_and_character() {
        let msg = SessionReference::coterie("abc")
            .to_join_message(Some("Mara".into()));
        assert_eq!(
            msg,
            ClientMessage::JoinSession {
                session_id: None,
                coterie_id: Some(CoterieId::from("abc")),
                character_name: Some("Mara".into()),
            }
        );
    }

    // =====================================================================
    // SessionDirectory
    // =====================================================================

    #[test]
    fn test_load_empty_storage_has_no_reference() {
        let dir = SessionDirectory::load(MemoryStorage::new());
        assert_eq!(dir.last_join(), None);
        assert_eq!(dir.active(), None);
    }

    #[test]
    fn test_remember_persists_immediately() {
        let storage = MemoryStorage::new();
        let mut dir = SessionDirectory::load(storage.clone());

        dir.remember(SessionReference::coterie("abc")).unwrap();

        assert_eq!(
            storage.get(LAST_JOIN_OPTIONS_KEY).unwrap().as_deref(),
            Some(r#"{"coterieId":"abc"}"#)
        );
        assert_eq!(dir.last_join(), Some(&SessionReference::coterie("abc")));
    }

    #[test]
    fn test_load_restores_reference_without_active_session() {
        let storage = MemoryStorage::new();
        SessionDirectory::load(storage.clone())
            .remember(SessionReference::session("s-1"))
            .unwrap();

        let reloaded = SessionDirectory::load(storage);
        assert_eq!(
            reloaded.last_join(),
            Some(&SessionReference::session("s-1"))
        );
        assert_eq!(reloaded.active(), None);
    }

    #[test]
    fn test_load_ignores_corrupt_reference() {
        let storage = MemoryStorage::new();
        storage.set(LAST_JOIN_OPTIONS_KEY, "{broken").unwrap();

        let dir = SessionDirectory::load(storage);
        assert_eq!(dir.last_join(), None);
    }

    #[test]
    fn test_confirm_normalizes_persisted_reference() {
        let storage = MemoryStorage::new();
        let mut dir = SessionDirectory::load(storage.clone());
        dir.remember(SessionReference::default()).unwrap();

        dir.confirm(&joined("tmp-9", SessionType::Temporary)).unwrap();

        assert_eq!(
            dir.active().map(|a| &a.session_id),
            Some(&SessionId::from("tmp-9"))
        );
        let reloaded = SessionDirectory::load(storage);
        assert_eq!(
            reloaded.last_join(),
            Some(&SessionReference::session("tmp-9"))
        );
    }

    #[test]
    fn test_clear_active_keeps_reference() {
        let mut dir = SessionDirectory::load(MemoryStorage::new());
        dir.confirm(&joined("abc", SessionType::Coterie)).unwrap();

        dir.clear_active();

        assert_eq!(dir.active(), None);
        assert_eq!(dir.last_join(), Some(&SessionReference::coterie("abc")));
    }

    #[test]
    fn test_forget_clears_memory_and_storage() {
        let storage = MemoryStorage::new();
        let mut dir = SessionDirectory::load(storage.clone());
        dir.confirm(&joined("abc", SessionType::Coterie)).unwrap();

        dir.forget().unwrap();

        assert_eq!(dir.last_join(), None);
        assert_eq!(dir.active(), None);
        assert_eq!(storage.get(LAST_JOIN_OPTIONS_KEY).unwrap(), None);
    }
}
