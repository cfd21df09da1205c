//! `GridforgeServer` builder and accept loop.
//!
//! This is the entry point for running a Gridforge server. It ties
//! together all the layers: transport → session → room, with the
//! protocol codec at the edges of each connection.

use std::net::SocketAddr;
use std::sync::Arc;

use gridforge_game::{AcceptAnyAnswer, AnswerChecker};
use gridforge_room::{GameRecorder, NoopRecorder, Registry, RoomConfig};
use gridforge_session::Authenticator;
use gridforge_transport::{Transport, WebSocketTransport};
use tokio::sync::watch;

use crate::connection::serve;
use crate::{GridforgeError, ServerConfig};

/// Shared server state passed to each connection task.
pub(crate) struct ServerState<A: Authenticator> {
    pub(crate) registry: Arc<Registry>,
    pub(crate) auth: A,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Gridforge server.
///
/// # Example
///
/// ```rust,no_run
/// use gridforge::prelude::*;
///
/// # async fn run() -> Result<(), GridforgeError> {
/// let auth = StaticTokenAuthenticator::new()
///     .with_token("alice-token", Identity::new(1, "alice"));
///
/// let server = GridforgeServer::<StaticTokenAuthenticator>::builder()
///     .bind("0.0.0.0:8080")
///     .build(auth)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct GridforgeServerBuilder {
    config: ServerConfig,
    room_config: RoomConfig,
    checker: Arc<dyn AnswerChecker>,
    recorder: Arc<dyn GameRecorder>,
}

impl GridforgeServerBuilder {
    /// Creates a builder with default settings. Every answer is
    /// accepted and nothing is recorded until configured otherwise.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            room_config: RoomConfig::default(),
            checker: Arc::new(AcceptAnyAnswer),
            recorder: Arc::new(NoopRecorder),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Replaces the whole connection configuration, bind address included.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets the criteria used to judge every move's answer.
    pub fn answer_checker(mut self, checker: impl AnswerChecker) -> Self {
        self.checker = Arc::new(checker);
        self
    }

    /// Sets where game history is reported.
    pub fn recorder(mut self, recorder: Arc<dyn GameRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Binds the listener and builds the server with the given
    /// authenticator. Connections are not accepted until
    /// [`GridforgeServer::run`] is called.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<GridforgeServer<A>, GridforgeError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let registry = Arc::new(Registry::new(self.room_config, self.checker, self.recorder));
        let state = Arc::new(ServerState {
            registry,
            auth,
            config: self.config,
        });
        let (shutdown_tx, _) = watch::channel(false);

        Ok(GridforgeServer {
            transport,
            state,
            shutdown: Arc::new(shutdown_tx),
        })
    }
}

impl Default for GridforgeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Stops a running server from another task.
///
/// Cloning is cheap; every clone stops the same server.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    /// Asks the server to stop. The accept loop exits, every connection
    /// is closed and every room is dropped.
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }
}

/// A bound Gridforge server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GridforgeServer<A: Authenticator> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A>>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl<A: Authenticator> GridforgeServer<A> {
    /// Creates a new builder.
    pub fn builder() -> GridforgeServerBuilder {
        GridforgeServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, GridforgeError> {
        Ok(self.transport.local_addr()?)
    }

    /// The registry of live connections and rooms.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.state.registry)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    /// Runs the accept loop until [`ShutdownHandle::shutdown`] is called.
    ///
    /// Each accepted connection gets its own task, which finishes the
    /// WebSocket handshake, authenticates, and then serves the client.
    /// A failed accept is logged and the loop keeps going.
    pub async fn run(mut self) -> Result<(), GridforgeError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Gridforge server running");
        let mut shutdown = self.shutdown.subscribe();
        let stopped = async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        };
        tokio::pin!(stopped);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(incoming) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            let id = incoming.id();
                            if let Err(e) = serve(incoming, state).await {
                                tracing::debug!(%id, error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut stopped => break,
            }
        }

        self.state.registry.shutdown().await;
        tracing::info!("Gridforge server stopped");
        Ok(())
    }
}
