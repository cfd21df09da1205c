//! Per-connection tasks.
//!
//! Every authenticated connection runs two tasks linked by the client's
//! bounded outbound queue:
//!
//! ```text
//!            ┌──────────── read_loop ────────────┐
//! socket ──→ │ decode → dispatch → Registry/Room │ ──→ other clients' queues
//!            └───────────────────────────────────┘
//!            ┌──────────── write_loop ───────────┐
//! socket ←── │ queue → text frame, tick → ping   │ ←── this client's queue
//!            └───────────────────────────────────┘
//! ```
//!
//! Either task ending raises the client's close signal, which stops the
//! other. The reader then unregisters the client.

use std::sync::Arc;
use std::time::Duration;

use gridforge_protocol::{ClientId, ClientMessage, JsonCodec, ProtocolError, ServerMessage};
use gridforge_room::RegistryError;
use gridforge_session::{Authenticator, ClientHandle, OutboundQueue};
use gridforge_transport::{Frame, FrameSink, FrameStream, IncomingConnection, TransportError};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::ServerConfig;
use crate::server::ServerState;
use crate::GridforgeError;

/// Serves one connection from TCP accept to unregistration.
pub(crate) async fn serve<A: Authenticator>(
    incoming: IncomingConnection,
    state: Arc<ServerState<A>>,
) -> Result<(), GridforgeError> {
    let peer = incoming.peer_addr();
    let pending = match incoming.upgrade(state.config.max_frame_bytes).await {
        Ok(pending) => pending,
        Err(TransportError::MissingCredential) => {
            tracing::warn!(%peer, "upgrade refused: no credential");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let identity = match state.auth.validate(pending.credential()).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(%peer, error = %e, "credential rejected");
            pending.reject("invalid credential").await?;
            return Ok(());
        }
    };

    let client_id = ClientId(pending.id().into_inner());
    tracing::info!(%client_id, %peer, user_id = %identity.user_id, "connection accepted");

    let (handle, queue) = ClientHandle::new(client_id, identity, state.config.outbound_capacity);
    let (sink, stream) = pending.split();

    if let Err(e) = state.registry.register(Arc::clone(&handle)).await {
        // Logged by the registry. Dropping the halves closes the socket.
        handle.close();
        return Err(e.into());
    }

    let mut writer = tokio::spawn(write_loop(
        sink,
        queue,
        Arc::clone(&handle),
        state.config.clone(),
    ));

    let result = read_loop(stream, &handle, &state).await;

    handle.close();
    state.registry.unregister(client_id).await;
    if tokio::time::timeout(state.config.write_timeout, &mut writer).await.is_err() {
        tracing::debug!(%client_id, "writer stalled, aborting");
        writer.abort();
    }

    tracing::info!(%client_id, "connection closed");
    result
}

/// Drains the outbound queue onto the socket and pings every
/// `ping_interval`, whatever else was written, so the peer's pongs keep
/// the reader's deadline moving.
async fn write_loop(
    mut sink: FrameSink,
    mut queue: OutboundQueue,
    handle: Arc<ClientHandle>,
    config: ServerConfig,
) {
    let client_id = handle.id();
    let write_timeout = config.write_timeout;
    let mut ticker =
        tokio::time::interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = queue.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = bounded(write_timeout, sink.send_text(&frame)).await {
                    tracing::debug!(%client_id, error = %e, "write failed");
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = bounded(write_timeout, sink.ping()).await {
                    tracing::debug!(%client_id, error = %e, "ping failed");
                    break;
                }
            }
            _ = handle.closed() => {
                // Flush what was queued before the close, e.g. on shutdown.
                while let Ok(frame) = queue.try_recv() {
                    if bounded(write_timeout, sink.send_text(&frame)).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }

    let _ = tokio::time::timeout(write_timeout, sink.close()).await;
    handle.close();
}

/// Runs one socket write, failing it once `limit` elapses.
async fn bounded<F>(limit: Duration, write: F) -> Result<(), TransportError>
where
    F: Future<Output = Result<(), TransportError>>,
{
    match tokio::time::timeout(limit, write).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::SendFailed(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "write timed out",
        ))),
    }
}

/// Reads frames until the peer goes away, the link times out, or the
/// client is closed from elsewhere.
async fn read_loop<A: Authenticator>(
    mut stream: FrameStream,
    handle: &ClientHandle,
    state: &ServerState<A>,
) -> Result<(), GridforgeError> {
    let client_id = handle.id();

    loop {
        let frame = tokio::select! {
            read = tokio::time::timeout(state.config.pong_timeout, stream.recv()) => match read {
                Ok(frame) => frame?,
                Err(_) => {
                    tracing::debug!(%client_id, "no frame within pong timeout");
                    return Ok(());
                }
            },
            _ = handle.closed() => return Ok(()),
        };

        let data = match frame {
            Some(Frame::Data(data)) => data,
            Some(Frame::Control) => continue,
            None => return Ok(()),
        };

        let msg = match JsonCodec.decode_client(&data) {
            Ok(msg) => msg,
            Err(ProtocolError::InvalidPayload { kind, source }) => {
                tracing::debug!(%client_id, %kind, error = %source, "invalid payload");
                reply(handle, ServerMessage::error(format!("invalid {kind} payload")));
                continue;
            }
            Err(e) => {
                tracing::debug!(%client_id, error = %e, "ignoring malformed frame");
                continue;
            }
        };

        let kind = msg.kind().to_string();
        match dispatch(msg, handle, state).await {
            Ok(Some(response)) => reply(handle, response),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(%client_id, %kind, error = %e, "request rejected");
                reply(handle, ServerMessage::error(e.to_string()));
            }
        }
    }
}

/// Carries out one request. Returns the direct reply to the sender, if
/// the request has one; room-wide effects are broadcast by the room.
async fn dispatch<A: Authenticator>(
    msg: ClientMessage,
    handle: &ClientHandle,
    state: &ServerState<A>,
) -> Result<Option<ServerMessage>, GridforgeError> {
    let client_id = handle.id();
    let registry = &state.registry;

    match msg {
        ClientMessage::CreateRoom(req) => {
            let room_id = registry.open_room(client_id, req.max_players).await?;
            Ok(Some(ServerMessage::RoomCreated { room_id }))
        }
        ClientMessage::JoinRoom(req) => {
            registry.join_room(&req.room_id, client_id).await?;
            Ok(Some(ServerMessage::JoinedRoom {
                room_id: req.room_id,
            }))
        }
        ClientMessage::StartGame => {
            let room = registry
                .current_room(client_id)
                .await
                .ok_or(RegistryError::NotInRoom(client_id))?;
            room.start().await?;
            Ok(None)
        }
        ClientMessage::MakeMove(req) => {
            let room = registry
                .current_room(client_id)
                .await
                .ok_or(RegistryError::NotInRoom(client_id))?;
            if room.id() != &req.room_id {
                return Err(GridforgeError::WrongRoom(req.room_id));
            }
            room.apply_move(handle.identity().user_id, req.row, req.col, req.answer)
                .await?;
            Ok(None)
        }
        ClientMessage::LeaveRoom => {
            let room_id = registry.leave_room(client_id).await?;
            Ok(Some(ServerMessage::LeftRoom { room_id }))
        }
        ClientMessage::Unrecognized(kind) => Err(GridforgeError::UnknownMessageType(kind)),
    }
}

/// Queues a reply for the sender only. Dropped replies are already
/// logged by the handle.
fn reply(handle: &ClientHandle, msg: ServerMessage) {
    let _ = handle.send(&msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_fails_a_stalled_write() {
        let stalled = std::future::pending::<Result<(), TransportError>>();
        match bounded(Duration::from_millis(20), stalled).await {
            Err(TransportError::SendFailed(e)) => {
                assert_eq!(e.kind(), std::io::ErrorKind::TimedOut);
            }
            other => panic!("expected a timed out send, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bounded_passes_through_completed_writes() {
        assert!(bounded(Duration::from_millis(20), async { Ok(()) }).await.is_ok());
    }
}
