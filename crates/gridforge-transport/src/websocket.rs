//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::{ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    ///
    /// Bind to port `0` to let the OS pick a free port, then read it
    /// back with [`Transport::local_addr`].
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }
}

impl Transport for WebSocketTransport {
    type Incoming = IncomingConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer, "accepted TCP connection");

        Ok(IncomingConnection { id, peer, stream })
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// A TCP connection that has not yet been upgraded to WebSocket.
pub struct IncomingConnection {
    id: ConnectionId,
    peer: SocketAddr,
    stream: TcpStream,
}

impl IncomingConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Performs the WebSocket upgrade.
    ///
    /// The credential is read from `Authorization: Bearer <token>` or,
    /// failing that, from a `token` query parameter. A request with
    /// neither is answered with `401 Unauthorized` and never upgraded.
    ///
    /// Inbound frames and messages longer than `max_frame_bytes` are
    /// refused while they are being read, before they are buffered.
    pub async fn upgrade(self, max_frame_bytes: usize) -> Result<PendingConnection, TransportError> {
        let mut credential = None;
        let config = WebSocketConfig::default()
            .max_frame_size(Some(max_frame_bytes))
            .max_message_size(Some(max_frame_bytes));

        let ws = tokio_tungstenite::accept_hdr_async_with_config(
            self.stream,
            |req: &Request, resp: Response| match extract_credential(req) {
                Some(token) => {
                    credential = Some(token);
                    Ok(resp)
                }
                None => {
                    let mut err = ErrorResponse::new(Some(
                        "missing credential".to_string(),
                    ));
                    *err.status_mut() = StatusCode::UNAUTHORIZED;
                    Err(err)
                }
            },
            Some(config),
        )
        .await;

        match (ws, credential) {
            (Ok(ws), Some(credential)) => {
                tracing::debug!(id = %self.id, peer = %self.peer, "WebSocket upgrade complete");
                Ok(PendingConnection {
                    id: self.id,
                    credential,
                    ws,
                    max_frame_bytes,
                })
            }
            (Err(e), Some(_)) => Err(TransportError::HandshakeFailed(io_err(e))),
            (_, None) => Err(TransportError::MissingCredential),
        }
    }
}

/// Pulls the bearer token out of an upgrade request.
fn extract_credential(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let from_query = || {
        req.uri().query().and_then(|q| {
            q.split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(k, v)| *k == "token" && !v.is_empty())
                .map(|(_, v)| percent_decode(v))
        })
    };

    from_header.map(str::to_string).or_else(from_query)
}

/// Decodes `%XX` escapes and `+` in a query value. Malformed escapes are
/// kept as written.
fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(byte) => {
                        out.push(byte);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// An upgraded connection whose credential has not been checked yet.
pub struct PendingConnection {
    id: ConnectionId,
    credential: String,
    ws: WsStream,
    max_frame_bytes: usize,
}

impl PendingConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The token presented during the upgrade.
    pub fn credential(&self) -> &str {
        &self.credential
    }

    /// Closes the connection with a policy-violation close frame (1008).
    pub async fn reject(mut self, reason: &str) -> Result<(), TransportError> {
        tracing::debug!(id = %self.id, reason, "rejecting connection");
        let frame = CloseFrame {
            code: CloseCode::Policy,
            reason: reason.to_string().into(),
        };
        self.ws
            .close(Some(frame))
            .await
            .map_err(|e| TransportError::SendFailed(io_err(e)))
    }

    /// Splits the connection into independently owned halves, so reading
    /// and writing can run on separate tasks.
    ///
    /// The reader keeps the frame limit given to [`IncomingConnection::upgrade`].
    pub fn split(self) -> (FrameSink, FrameStream) {
        let (sink, stream) = self.ws.split();
        (
            FrameSink { id: self.id, sink },
            FrameStream {
                id: self.id,
                stream,
                max_frame_bytes: self.max_frame_bytes,
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Frame halves
// ---------------------------------------------------------------------------

/// One inbound frame, as far as the application cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text or binary data frame.
    Data(Vec<u8>),
    /// A ping or pong. Carries no data but proves the peer is alive.
    Control,
}

/// The writing half of a WebSocket connection.
pub struct FrameSink {
    id: ConnectionId,
    sink: SplitSink<WsStream, Message>,
}

impl FrameSink {
    /// Sends one text frame.
    pub async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text.to_string().into()))
            .await
            .map_err(|e| TransportError::SendFailed(io_err(e)))
    }

    /// Sends a keepalive ping.
    pub async fn ping(&mut self) -> Result<(), TransportError> {
        self.sink
            .send(Message::Ping(Default::default()))
            .await
            .map_err(|e| TransportError::SendFailed(io_err(e)))
    }

    /// Sends a normal close frame. Errors are ignored: the peer may
    /// already be gone.
    pub async fn close(&mut self) {
        tracing::debug!(id = %self.id, "closing connection");
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

/// The reading half of a WebSocket connection.
pub struct FrameStream {
    id: ConnectionId,
    stream: SplitStream<WsStream>,
    max_frame_bytes: usize,
}

impl FrameStream {
    /// Receives the next frame.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    pub async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        match self.stream.next().await {
            Some(Ok(Message::Text(text))) => self.check_size(text.as_bytes().to_vec()),
            Some(Ok(Message::Binary(data))) => self.check_size(data.to_vec()),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => Ok(Some(Frame::Control)),
            Some(Ok(Message::Close(_))) | None => Ok(None),
            Some(Ok(Message::Frame(_))) => Ok(Some(Frame::Control)),
            Some(Err(WsError::Capacity(CapacityError::MessageTooLong { size, max_size }))) => {
                tracing::debug!(id = %self.id, size, "frame over limit");
                Err(TransportError::FrameTooLarge {
                    size,
                    limit: max_size,
                })
            }
            Some(Err(e)) => Err(TransportError::ReceiveFailed(io_err(e))),
        }
    }

    fn check_size(&self, data: Vec<u8>) -> Result<Option<Frame>, TransportError> {
        if data.len() > self.max_frame_bytes {
            tracing::debug!(id = %self.id, size = data.len(), "frame over limit");
            return Err(TransportError::FrameTooLarge {
                size: data.len(),
                limit: self.max_frame_bytes,
            });
        }
        Ok(Some(Frame::Data(data)))
    }
}

fn io_err(e: tokio_tungstenite::tungstenite::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::ConnectionReset, e)
}
