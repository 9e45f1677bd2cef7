//! Session types: the registry's record of one live connection.

use std::net::SocketAddr;
use std::sync::Arc;

use parley_transport::ConnectionId;

/// Nickname a session carries until its first `login` message.
pub const DEFAULT_NICKNAME: &str = "Unknown";

/// A point-in-time view of one registered session.
///
/// Returned by [`ClientRegistry::register`](crate::ClientRegistry::register)
/// and [`ClientRegistry::snapshot`](crate::ClientRegistry::snapshot). It
/// owns a copy of the nickname and a shared handle to the connection, so
/// a broadcast can send to it after the registry lock is released.
#[derive(Debug)]
pub struct SessionRef<C> {
    /// Identity of the connection.
    pub id: ConnectionId,
    /// Remote address, metadata only.
    pub peer_addr: SocketAddr,
    /// Nickname at the time the view was taken.
    pub nickname: String,
    /// Shared connection handle.
    pub conn: Arc<C>,
}

// Manual impl: `#[derive(Clone)]` would demand `C: Clone`, but only the
// `Arc` is cloned.
impl<C> Clone for SessionRef<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            peer_addr: self.peer_addr,
            nickname: self.nickname.clone(),
            conn: Arc::clone(&self.conn),
        }
    }
}

/// The registry's owned record of a session.
#[derive(Debug)]
pub(crate) struct ClientSession<C> {
    /// Insertion sequence number, used to order snapshots.
    pub(crate) joined: u64,
    pub(crate) peer_addr: SocketAddr,
    pub(crate) nickname: String,
    pub(crate) conn: Arc<C>,
}

impl<C> ClientSession<C> {
    pub(crate) fn to_ref(&self, id: ConnectionId) -> SessionRef<C> {
        SessionRef {
            id,
            peer_addr: self.peer_addr,
            nickname: self.nickname.clone(),
            conn: Arc::clone(&self.conn),
        }
    }
}
