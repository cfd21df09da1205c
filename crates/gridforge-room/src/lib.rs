//! Rooms and the registry for Gridforge.
//!
//! A [`Room`] is a lock around membership plus one authoritative
//! [`GameState`](gridforge_game::GameState). The [`Registry`] is the
//! directory that creates rooms, seats connections in them, and tears
//! them down when the last member leaves.
//!
//! # Key types
//!
//! - [`Registry`]: live connections and rooms, one lock domain
//! - [`Room`]: membership, game lifecycle, broadcasts
//! - [`RoomConfig`]: default and maximum capacity, minimum players
//! - [`GameRecorder`]: write-only persistence hook for game history

mod config;
mod error;
mod recorder;
mod registry;
mod room;

pub use config::RoomConfig;
pub use error::{RegistryError, RoomError};
pub use recorder::{GameRecord, GameRecorder, MemoryRecorder, NoopRecorder};
pub use registry::Registry;
pub use room::{Room, RoomInfo};
