//! Error types for the room layer.
//!
//! The `Display` text of these errors is sent to clients verbatim in
//! `error` replies, so it is phrased for players, not operators.

use gridforge_game::{GameStatus, MoveError};
use gridforge_protocol::{ClientId, RoomId};

/// Errors from operations on a single room.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// No player slots left.
    #[error("room is full")]
    RoomFull(RoomId),

    /// The client is already a member of this room.
    #[error("player already exists in the room")]
    PlayerAlreadyInRoom(ClientId, RoomId),

    /// Joining and starting are only allowed before the game starts.
    #[error("room is not accepting players (game is {1})")]
    RoomNotWaiting(RoomId, GameStatus),

    /// `start` was called with fewer members than the room needs.
    #[error("need at least {need} players to start, room has {have}")]
    NotEnoughPlayers { have: usize, need: usize },

    /// A capacity outside `1..=max` was requested.
    #[error("invalid room capacity {requested} (allowed 1 to {max})")]
    InvalidCapacity { requested: usize, max: usize },

    /// The Move Engine rejected a move.
    #[error(transparent)]
    Move(#[from] MoveError),
}

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("room not found")]
    RoomNotFound(RoomId),

    #[error("room {0} already exists")]
    RoomAlreadyExists(RoomId),

    /// A client id was registered twice. This is a server bug.
    #[error("client {0} is already registered")]
    DuplicateClient(ClientId),

    /// The client isn't (or is no longer) registered.
    #[error("client {0} is not registered")]
    ClientNotFound(ClientId),

    /// A client may be a member of at most one room.
    #[error("already in room {0}, leave it first")]
    AlreadyInAnotherRoom(RoomId),

    #[error("not in a room")]
    NotInRoom(ClientId),

    #[error(transparent)]
    Room(#[from] RoomError),
}
