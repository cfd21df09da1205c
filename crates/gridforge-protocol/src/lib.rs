//! Wire protocol for Gridforge.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`ClientId`],
//!   [`RoomId`], payload structs): the messages that travel on the wire.
//! - **Codec** ([`JsonCodec`]): how those messages are converted to and
//!   from JSON text.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Envelope
//!
//! Every frame, in both directions, is one JSON object:
//!
//! ```text
//! { "type": "make_move", "payload": { "room_id": "...", "row": 0, "col": 2, "answer": "..." } }
//! ```
//!
//! Client messages are decoded once at the boundary into a closed enum.
//! A `type` the server doesn't know becomes
//! [`ClientMessage::Unrecognized`] instead of an error, so the caller
//! can tell "garbage frame" apart from "valid frame, unknown request".

mod codec;
mod error;
mod types;

pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientId, ClientMessage, CreateRoom, GameSnapshot, JoinRoom, MakeMove,
    RoomId, ServerMessage,
};

// Game types appear inside server messages; re-exported so clients of
// the protocol don't need a direct dependency on the engine crate.
pub use gridforge_game::{GameState, GameStatus, Move, Player, UserId};
