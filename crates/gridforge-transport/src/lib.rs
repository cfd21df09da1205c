//! Transport layer for Gridforge.
//!
//! Owns the listening socket and the WebSocket framing. Nothing in here
//! knows about rooms or games: a connection is a credential plus a pair
//! of frame halves.
//!
//! ```text
//! accept()        upgrade()               split()
//! TCP ──────→ IncomingConnection ──────→ PendingConnection ──────→ (FrameSink, FrameStream)
//!                    │                          │
//!                    └─ no credential: 401      └─ reject(): close 1008
//! ```
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    Frame, FrameSink, FrameStream, IncomingConnection, PendingConnection,
    WebSocketTransport,
};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
///
/// `accept` only waits for the peer to connect. Any handshake work is
/// left to the returned value so that a slow peer never stalls the
/// accept loop.
pub trait Transport: Send + Sync + 'static {
    /// What `accept` hands back: a connection that still has to finish
    /// its handshake.
    type Incoming: Send + 'static;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// The address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}
