//! Per-connection supervision: register, relay, and always clean up.

use std::sync::Arc;

use parley_session::ClientRegistry;
use parley_store::MessageStore;
use parley_transport::{Connection, ConnectionId};

use crate::handler::relay_loop;
use crate::server::ServerState;

/// Removes a connection's registry entry exactly once.
///
/// The normal path calls [`release`](Self::release). If the task is
/// cancelled or panics first, `Drop` spawns the removal instead. Since
/// `Drop` is synchronous, the async lock is taken in a fire-and-forget
/// task.
struct RegistrationGuard<C: Connection> {
    entry: Option<(ConnectionId, Arc<ClientRegistry<C>>)>,
}

impl<C: Connection> RegistrationGuard<C> {
    fn new(conn_id: ConnectionId, registry: Arc<ClientRegistry<C>>) -> Self {
        Self {
            entry: Some((conn_id, registry)),
        }
    }

    async fn release(mut self) {
        if let Some((conn_id, registry)) = self.entry.take() {
            registry.remove(conn_id).await;
        }
    }
}

impl<C: Connection> Drop for RegistrationGuard<C> {
    fn drop(&mut self) {
        let Some((conn_id, registry)) = self.entry.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    registry.remove(conn_id).await;
                });
            }
            Err(_) => {
                tracing::debug!(%conn_id, "runtime gone, skipping removal");
            }
        }
    }
}

/// Handles a single connection from accept to close.
///
/// Registers the connection, runs the relay loop until it ends for any
/// reason, then removes the registration and closes the transport.
pub(crate) async fn supervise<C, S>(conn: C, state: Arc<ServerState<C, S>>)
where
    C: Connection,
    S: MessageStore,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let peer_addr = conn.peer_addr();

    state
        .registry
        .register(conn_id, peer_addr, Arc::clone(&conn))
        .await;
    let guard = RegistrationGuard::new(conn_id, Arc::clone(&state.registry));
    tracing::info!(%conn_id, %peer_addr, "client joined");

    let reason = relay_loop(conn.as_ref(), &state).await;

    guard.release().await;
    tracing::info!(%conn_id, %peer_addr, %reason, "client left");

    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close after disconnect failed");
    }
}
