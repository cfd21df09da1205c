//! The server's handle to one live connection.
//!
//! A [`ClientHandle`] is what rooms and the registry hold to talk to a
//! connection. It never touches the socket: it pushes encoded frames
//! into a bounded queue that the connection's writer task drains.
//!
//! ```text
//! room broadcast ──try_send──→ [ queue (bounded) ] ──→ writer task ──→ socket
//!                    │
//!                    └─ full? drop this frame for this client only
//! ```

use std::sync::Arc;

use gridforge_protocol::{ClientId, JsonCodec, ServerMessage};
use tokio::sync::{mpsc, watch};

use crate::{Identity, SessionError};

/// The receiving end of a client's outbound queue. Owned by the writer.
pub type OutboundQueue = mpsc::Receiver<Arc<str>>;

/// A cheap, shareable handle to one connection.
#[derive(Debug)]
pub struct ClientHandle {
    id: ClientId,
    identity: Identity,
    tx: mpsc::Sender<Arc<str>>,
    close_tx: watch::Sender<bool>,
}

impl ClientHandle {
    /// Creates a handle and the queue its writer will drain.
    ///
    /// `capacity` bounds the number of frames waiting to be written.
    pub fn new(
        id: ClientId,
        identity: Identity,
        capacity: usize,
    ) -> (Arc<Self>, OutboundQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (close_tx, _) = watch::channel(false);
        let handle = Arc::new(Self {
            id,
            identity,
            tx,
            close_tx,
        });
        (handle, rx)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Encodes `msg` and queues it without waiting.
    ///
    /// # Errors
    /// - [`SessionError::QueueFull`]: the frame was dropped.
    /// - [`SessionError::Closed`]: the writer is gone.
    pub fn send(&self, msg: &ServerMessage) -> Result<(), SessionError> {
        let text = JsonCodec.encode_server(msg)?;
        self.send_raw(Arc::from(text))
    }

    /// Queues an already-encoded frame. Broadcasts encode once and call
    /// this for every recipient.
    pub fn send_raw(&self, frame: Arc<str>) -> Result<(), SessionError> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(client = %self.id, "outbound queue full, dropping frame");
                Err(SessionError::QueueFull(self.id))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(client = %self.id, "outbound queue closed");
                Err(SessionError::Closed(self.id))
            }
        }
    }

    /// Signals both connection tasks to stop. Idempotent.
    pub fn close(&self) {
        self.close_tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.close_tx.borrow() || self.tx.is_closed()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        let mut rx = self.close_tx.subscribe();
        // Err only if the sender is dropped, and `self` owns it.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}
