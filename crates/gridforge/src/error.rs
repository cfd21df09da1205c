//! Unified error type for Gridforge.

use gridforge_protocol::{ProtocolError, RoomId};
use gridforge_room::{RegistryError, RoomError};
use gridforge_session::SessionError;
use gridforge_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
///
/// Request failures (everything except `Transport`) are reported to the
/// requesting client as an `error` message carrying this `Display` text.
#[derive(Debug, thiserror::Error)]
pub enum GridforgeError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, bad payload).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, delivery).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not waiting, move rejected).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A registry-level error (room not found, already in a room).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The client sent a well-formed message of a type we don't handle.
    #[error("unknown message type")]
    UnknownMessageType(String),

    /// `make_move` named a room other than the client's current one.
    #[error("not in that room")]
    WrongRoom(RoomId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridforge_game::MoveError;

    #[test]
    fn test_from_transport_error() {
        let err: GridforgeError = TransportError::MissingCredential.into();
        assert!(matches!(err, GridforgeError::Transport(_)));
        assert!(err.to_string().contains("credential"));
    }

    #[test]
    fn test_from_session_error() {
        let err: GridforgeError = SessionError::AuthFailed("nope".into()).into();
        assert!(matches!(err, GridforgeError::Session(_)));
    }

    #[test]
    fn test_room_errors_display_for_players() {
        let err: GridforgeError = RoomError::Move(MoveError::NotYourTurn).into();
        assert_eq!(err.to_string(), "not your turn");

        let err: GridforgeError = RegistryError::RoomNotFound(RoomId::from("x")).into();
        assert_eq!(err.to_string(), "room not found");

        let err: GridforgeError =
            RegistryError::Room(RoomError::RoomFull(RoomId::from("x"))).into();
        assert_eq!(err.to_string(), "room is full");
    }

    #[test]
    fn test_request_error_messages() {
        assert_eq!(
            GridforgeError::UnknownMessageType("x".into()).to_string(),
            "unknown message type"
        );
        assert_eq!(
            GridforgeError::WrongRoom(RoomId::from("x")).to_string(),
            "not in that room"
        );
    }
}
