//! `RelayServer` builder and accept loop.
//!
//! This is the entry point for running a Parley relay. It ties together
//! all the layers: transport → protocol → session registry → relay.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use parley_protocol::JsonCodec;
use parley_session::ClientRegistry;
use parley_store::{MessageStore, PersistenceGateway};
use parley_transport::{
    Incoming, PendingWebSocket, Transport, WebSocketConnection, WebSocketTransport,
};
use tokio::task::JoinSet;

use crate::supervisor::supervise;
use crate::{RelayConfig, RelayError};

/// Shared server state passed to each connection task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry and the gateway carry their own synchronization.
pub(crate) struct ServerState<C, S> {
    pub(crate) registry: Arc<ClientRegistry<C>>,
    pub(crate) persistence: PersistenceGateway<S>,
    pub(crate) codec: JsonCodec,
    pub(crate) config: RelayConfig,
}

impl<C, S> ServerState<C, S> {
    pub(crate) fn new(
        persistence: PersistenceGateway<S>,
        config: RelayConfig,
    ) -> Self {
        Self {
            registry: Arc::new(ClientRegistry::new()),
            persistence,
            codec: JsonCodec,
            config,
        }
    }
}

/// Builder for configuring and starting a relay.
///
/// # Example
///
/// ```rust,no_run
/// use parley::{RelayServerBuilder, SqliteStore, PersistenceGateway};
///
/// # async fn run() -> Result<(), parley::RelayError> {
/// let gateway = PersistenceGateway::start(SqliteStore::open("chat.db"));
/// let server = RelayServerBuilder::new()
///     .bind("0.0.0.0:6969")
///     .build(gateway)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RelayServerBuilder {
    bind_addr: String,
    config: RelayConfig,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:6969".to_string(),
            config: RelayConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the relay configuration.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and builds the server around `persistence`.
    ///
    /// Pass [`PersistenceGateway::disabled()`] to run without history.
    pub async fn build<S: MessageStore>(
        self,
        persistence: PersistenceGateway<S>,
    ) -> Result<RelayServer<S>, RelayError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let state = Arc::new(ServerState::new(persistence, self.config));
        Ok(RelayServer { transport, state })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound chat relay.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RelayServer<S: MessageStore> {
    transport: WebSocketTransport,
    state: Arc<ServerState<WebSocketConnection, S>>,
}

impl<S: MessageStore> RelayServer<S> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns the registry of connected clients.
    pub fn registry(&self) -> Arc<ClientRegistry<WebSocketConnection>> {
        Arc::clone(&self.state.registry)
    }

    /// Returns the persistence gateway.
    pub fn persistence(&self) -> &PersistenceGateway<S> {
        &self.state.persistence
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), RelayError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Each accepted connection gets its own task, and its handshake runs
    /// there, so a slow peer never holds up the loop. Accept failures are
    /// logged and do not stop the loop. On shutdown, the listener stops
    /// and every connection task is cancelled; their registry cleanup
    /// still runs.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), RelayError> {
        tracing::info!("Parley relay running");
        tokio::pin!(shutdown);

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!(
                        open = connections.len(),
                        "shutting down relay"
                    );
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(incoming) => {
                        let state = Arc::clone(&self.state);
                        connections.spawn(upgrade_and_supervise(incoming, state));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
                Some(finished) = connections.join_next(),
                    if !connections.is_empty() =>
                {
                    if let Err(e) = finished {
                        tracing::error!(error = %e, "connection task failed");
                    }
                }
            }
        }

        connections.shutdown().await;
        Ok(())
    }
}

/// Completes the handshake, then hands the connection to the supervisor.
async fn upgrade_and_supervise<S: MessageStore>(
    incoming: PendingWebSocket,
    state: Arc<ServerState<WebSocketConnection, S>>,
) {
    let peer_addr = incoming.peer_addr();
    match incoming.upgrade().await {
        Ok(conn) => supervise(conn, state).await,
        Err(e) => {
            tracing::warn!(%peer_addr, error = %e, "handshake failed");
        }
    }
}
