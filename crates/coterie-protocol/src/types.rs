//! Wire types for the play-together session.
//!
//! Every frame is a JSON object with a snake_case `type` discriminant and
//! camelCase fields, for example:
//!
//! ```json
//! { "type": "join_session", "coterieId": "abc", "characterName": "Mara" }
//! ```
//!
//! [`ClientMessage`] is everything this client sends, [`ServerMessage`]
//! everything it accepts. Both are closed sum types: a frame whose `type`
//! is not listed fails to decode.

use std::fmt;

use chrono::{DateTime, Utc};
use coterie_dice::RollRecord;
use serde::{Deserialize, Serialize};

/// Upper bound on a chat message, in characters, after trimming.
pub const MAX_CHAT_MESSAGE_CHARS: usize = 5000;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Server-assigned identifier of a session.
///
/// Serialized as a plain string (`#[serde(transparent)]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a persistent coterie, usable as a session scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoterieId(pub String);

impl fmt::Display for CoterieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! impl_from_str_id {
    ($($ty:ident),*) => {$(
        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    )*};
}

impl_from_str_id!(SessionId, CoterieId, UserId);

// ---------------------------------------------------------------------------
// Session metadata
// ---------------------------------------------------------------------------

/// Whether a session is throwaway or bound to a coterie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Temporary,
    Coterie,
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temporary => write!(f, "temporary"),
            Self::Coterie => write!(f, "coterie"),
        }
    }
}

/// One member of the session roster. `user_id` is the uniqueness key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: UserId,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
}

/// Server confirmation of a join, with the authoritative roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionJoined {
    pub session_id: SessionId,
    pub session_type: SessionType,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

/// Who produced a broadcast event. The server fills in the user fields;
/// the character name is whatever the sender attached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Broadcast events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    pub message: String,
    #[serde(flatten)]
    pub author: Author,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceRollEvent {
    pub roll_data: RollRecord,
    #[serde(flatten)]
    pub author: Author,
    pub timestamp: DateTime<Utc>,
}

impl DiceRollEvent {
    pub fn roll_id(&self) -> Option<&str> {
        self.roll_data.roll_id.as_deref()
    }

    pub fn is_reroll(&self) -> bool {
        self.roll_data.is_reroll
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouseCheckEvent {
    pub roll: u8,
    pub success: bool,
    pub new_hunger: u8,
    #[serde(flatten)]
    pub author: Author,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemorseCheckEvent {
    pub rolls: Vec<u8>,
    pub successes: u32,
    pub passed: bool,
    pub new_humanity: u8,
    #[serde(flatten)]
    pub author: Author,
    pub timestamp: DateTime<Utc>,
}

/// A server-side rejection. The connection stays open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// An entry in the session's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ChatMessage(ChatEvent),
    DiceRoll(DiceRollEvent),
    RouseCheck(RouseCheckEvent),
    RemorseCheck(RemorseCheckEvent),
    Error(ErrorEvent),
}

impl Event {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ChatMessage(e) => e.timestamp,
            Self::DiceRoll(e) => e.timestamp,
            Self::RouseCheck(e) => e.timestamp,
            Self::RemorseCheck(e) => e.timestamp,
            Self::Error(e) => e.timestamp,
        }
    }

    /// The roll id, for dice rolls that carry one.
    pub fn roll_id(&self) -> Option<&str> {
        match self {
            Self::DiceRoll(e) => e.roll_id(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// Everything the client sends.
///
/// Optional fields are omitted from the frame when `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Join a temporary session by id, a coterie's session, or (with
    /// neither) a fresh temporary session.
    JoinSession {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coterie_id: Option<CoterieId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        character_name: Option<String>,
    },

    LeaveSession,

    ChatMessage {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        character_name: Option<String>,
    },

    DiceRoll {
        roll_data: RollRecord,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        character_name: Option<String>,
    },

    RouseCheck {
        roll: u8,
        success: bool,
        new_hunger: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        character_name: Option<String>,
    },

    RemorseCheck {
        rolls: Vec<u8>,
        successes: u32,
        passed: bool,
        new_humanity: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        character_name: Option<String>,
    },
}

impl ClientMessage {
    /// The wire discriminant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinSession { .. } => "join_session",
            Self::LeaveSession => "leave_session",
            Self::ChatMessage { .. } => "chat_message",
            Self::DiceRoll { .. } => "dice_roll",
            Self::RouseCheck { .. } => "rouse_check",
            Self::RemorseCheck { .. } => "remorse_check",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// Everything the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    SessionJoined(SessionJoined),
    UserJoined(Participant),
    UserLeft { user_id: UserId },
    ChatMessage(ChatEvent),
    DiceRoll(DiceRollEvent),
    RouseCheck(RouseCheckEvent),
    RemorseCheck(RemorseCheckEvent),
    Error(ErrorEvent),
}

impl ServerMessage {
    /// The wire discriminant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionJoined(_) => "session_joined",
            Self::UserJoined(_) => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::ChatMessage(_) => "chat_message",
            Self::DiceRoll(_) => "dice_roll",
            Self::RouseCheck(_) => "rouse_check",
            Self::RemorseCheck(_) => "remorse_check",
            Self::Error(_) => "error",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
