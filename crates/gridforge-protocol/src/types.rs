//! Core protocol types for Gridforge's wire format.
//!
//! Everything in this module is serialized to JSON and sent over the
//! network. The serde attributes here ARE the wire protocol: renaming a
//! field is a breaking change for every client.

use std::fmt;

use gridforge_game::{GameState, Move, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque id of one live connection (one browser tab, one socket).
///
/// Unlike [`UserId`], which comes from the auth collaborator and
/// identifies a person, a `ClientId` is minted by the server per
/// connection. The same user connecting twice gets two `ClientId`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// Id of a room. Chosen by the registry; opaque to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Client → server payloads
// ---------------------------------------------------------------------------

/// Payload of `create_room`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoom {
    /// Room capacity. `None` → the server's default capacity.
    ///
    /// Older clients send the key as `max_Players`; both spellings
    /// are accepted.
    #[serde(default, alias = "max_Players", skip_serializing_if = "Option::is_none")]
    pub max_players: Option<usize>,
}

/// Payload of `join_room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoom {
    pub room_id: RoomId,
}

/// Payload of `make_move`.
///
/// `row` and `col` are signed so that an out-of-range value like `-1`
/// reaches the move engine and is reported as out of bounds, instead of
/// failing payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeMove {
    pub room_id: RoomId,
    pub row: i64,
    pub col: i64,
    #[serde(default)]
    pub answer: String,
}

/// Every request a client can make.
///
/// Decoding goes through [`JsonCodec::decode_client`](crate::JsonCodec::decode_client),
/// which validates the payload against the schema of its `type`.
/// Serialization (used by clients and tests) produces the same
/// `{type, payload}` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom(CreateRoom),
    JoinRoom(JoinRoom),
    /// Starts the game in the sender's current room.
    StartGame,
    MakeMove(MakeMove),
    /// Leaves the sender's current room.
    LeaveRoom,
    /// A well-formed envelope whose `type` the server doesn't know.
    /// Carries the unknown type string. Never sent by clients.
    #[serde(skip)]
    Unrecognized(String),
}

impl ClientMessage {
    /// The wire `type` of this message.
    pub fn kind(&self) -> &str {
        match self {
            Self::CreateRoom(_) => "create_room",
            Self::JoinRoom(_) => "join_room",
            Self::StartGame => "start_game",
            Self::MakeMove(_) => "make_move",
            Self::LeaveRoom => "leave_room",
            Self::Unrecognized(kind) => kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Full game snapshot sent as the payload of `game_state`.
///
/// The game fields are flattened next to `room_id`:
/// `{ "room_id": "...", "status": "active", "players": [...], ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub room_id: RoomId,
    #[serde(flatten)]
    pub state: GameState,
}

/// Every message the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Welcome, sent once right after registration.
    Connected { client_id: ClientId },

    /// Reply to `create_room`. The creator is already a member.
    RoomCreated { room_id: RoomId },

    /// Reply to `join_room`.
    JoinedRoom { room_id: RoomId },

    /// Reply to `leave_room`.
    LeftRoom { room_id: RoomId },

    /// Broadcast to a room when a member is admitted (including the
    /// new member itself).
    PlayerJoined {
        room_id: RoomId,
        player_id: ClientId,
        user_id: UserId,
        username: String,
        player_count: usize,
    },

    /// Broadcast to the remaining members when someone leaves or drops.
    PlayerLeft {
        room_id: RoomId,
        player_id: ClientId,
        user_id: UserId,
    },

    /// Full snapshot of the room's game.
    GameState(GameSnapshot),

    /// The move that was just applied.
    MoveMade {
        room_id: RoomId,
        #[serde(rename = "move")]
        mv: Move,
    },

    /// A request failed. Only ever sent to the requester.
    Error { message: String },
}

impl ServerMessage {
    /// Shorthand for an `error` message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
