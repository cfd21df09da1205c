//! Error types for the session layer.

use gridforge_protocol::{ClientId, ProtocolError};

/// Errors that can occur while authenticating a connection or pushing
/// messages to it.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Authentication failed: the token was invalid, expired, or rejected
    /// by the [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The client's outbound queue is full. The message was dropped.
    ///
    /// A slow reader only loses its own messages; nobody else waits.
    #[error("outbound queue full for client {0}")]
    QueueFull(ClientId),

    /// The client's writer is gone. The connection is shutting down.
    #[error("client {0} is closed")]
    Closed(ClientId),

    /// The message could not be serialized.
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}
