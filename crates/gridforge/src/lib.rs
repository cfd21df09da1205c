//! # Gridforge
//!
//! Multiplayer trivia-grid session server.
//!
//! Players connect over WebSocket with a bearer credential, gather in
//! rooms, and take turns claiming cells of a 3×3 board. A cell is only
//! claimed when the player's answer satisfies that cell's row and
//! column categories. Three claimed cells in a row, column, or diagonal
//! win the game.
//!
//! The server is authoritative: clients send requests, and every state
//! change is broadcast to the room by the server.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridforge::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), GridforgeError> {
//!     gridforge::logging::init_tracing("info");
//!
//!     let auth = StaticTokenAuthenticator::new()
//!         .with_token("alice-token", Identity::new(1, "alice"))
//!         .with_token("bob-token", Identity::new(2, "bob"));
//!
//!     let server = GridforgeServer::<StaticTokenAuthenticator>::builder()
//!         .bind("0.0.0.0:8080")
//!         .build(auth)
//!         .await?;
//!     server.run().await
//! }
//! ```
//!
//! ## Crates
//!
//! - `gridforge-transport`: WebSocket accept, credential extraction, frames
//! - `gridforge-protocol`: wire messages and the JSON codec
//! - `gridforge-game`: board, rules, and answer criteria
//! - `gridforge-session`: authentication and outbound delivery
//! - `gridforge-room`: rooms, the registry, and game recording

mod config;
mod connection;
mod error;
pub mod logging;
mod server;

pub use config::ServerConfig;
pub use error::GridforgeError;
pub use server::{GridforgeServer, GridforgeServerBuilder, ShutdownHandle};

pub use gridforge_game as game;
pub use gridforge_protocol as protocol;
pub use gridforge_room as room;
pub use gridforge_session as session;
pub use gridforge_transport as transport;

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{GridforgeError, GridforgeServer, GridforgeServerBuilder, ServerConfig, ShutdownHandle};
    pub use gridforge_game::{AcceptAnyAnswer, AnswerChecker, CategoryCell, CategoryGrid};
    pub use gridforge_room::{GameRecord, GameRecorder, MemoryRecorder, NoopRecorder, RoomConfig};
    pub use gridforge_session::{Authenticator, Identity, SessionError, StaticTokenAuthenticator};
}
