//! The client registry: the single source of truth for who is online.
//!
//! Responsibilities:
//! - Registering a session when a connection is accepted
//! - Tracking each session's nickname
//! - Handing out point-in-time snapshots for broadcasts
//! - Removing the session when the connection's loop ends
//!
//! # Concurrency note
//!
//! Every connection task shares one registry, so the map lives behind a
//! `tokio::sync::Mutex` and is only reachable through the methods below.
//! Each method takes the lock for the duration of a map operation and
//! releases it before returning; nothing here awaits I/O while holding it.
//! A snapshot is a copy, so broadcasting to it never touches the lock.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parley_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::session::{ClientSession, SessionRef, DEFAULT_NICKNAME};

struct Inner<C> {
    sessions: HashMap<ConnectionId, ClientSession<C>>,
    /// Next insertion sequence number.
    next_joined: u64,
}

/// Maps live connection identities to their handle and nickname.
///
/// `C` is the connection handle type; the registry never calls into it,
/// it only hands `Arc<C>` back out in [`SessionRef`]s.
///
/// ## Lifecycle
///
/// ```text
/// register() ──→ set_nickname()* ──→ remove()
///     │                                  │
///     ▼                                  ▼
/// [nickname "Unknown"]               [gone from snapshots]
/// ```
pub struct ClientRegistry<C> {
    inner: Mutex<Inner<C>>,
}

impl<C> ClientRegistry<C> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                next_joined: 0,
            }),
        }
    }

    /// Registers a connection under `id` with the default nickname.
    ///
    /// If `id` is already registered, its connection handle and address
    /// are replaced and the nickname is kept. This never fails.
    pub async fn register(
        &self,
        id: ConnectionId,
        peer_addr: SocketAddr,
        conn: Arc<C>,
    ) -> SessionRef<C> {
        let mut inner = self.inner.lock().await;

        if let Some(existing) = inner.sessions.get_mut(&id) {
            tracing::warn!(
                %id,
                %peer_addr,
                "connection already registered, replacing handle"
            );
            existing.conn = conn;
            existing.peer_addr = peer_addr;
            return existing.to_ref(id);
        }

        let joined = inner.next_joined;
        inner.next_joined += 1;

        let session = ClientSession {
            joined,
            peer_addr,
            nickname: DEFAULT_NICKNAME.to_owned(),
            conn,
        };
        let view = session.to_ref(id);
        inner.sessions.insert(id, session);
        view
    }

    /// Sets the nickname of a registered session.
    ///
    /// Returns `false` (and logs a warning) if `id` isn't registered.
    pub async fn set_nickname(&self, id: ConnectionId, name: &str) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.sessions.get_mut(&id) {
            Some(session) => {
                session.nickname = name.to_owned();
                true
            }
            None => {
                tracing::warn!(%id, name, "nickname set for unknown connection");
                false
            }
        }
    }

    /// Returns the current nickname of `id`, if registered.
    pub async fn nickname(&self, id: ConnectionId) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.sessions.get(&id).map(|s| s.nickname.clone())
    }

    /// Returns a copy of every registered session, in registration order.
    ///
    /// Sessions registered or removed after this returns don't affect the
    /// returned list.
    pub async fn snapshot(&self) -> Vec<SessionRef<C>> {
        let inner = self.inner.lock().await;
        let mut sessions: Vec<_> = inner.sessions.iter().collect();
        sessions.sort_by_key(|(_, s)| s.joined);
        sessions.into_iter().map(|(id, s)| s.to_ref(*id)).collect()
    }

    /// Removes `id`, returning whether it was registered.
    ///
    /// Removing an unknown id is logged as a warning, not treated as an
    /// error.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.inner.lock().await.sessions.remove(&id);
        match removed {
            Some(session) => {
                tracing::debug!(
                    %id,
                    nickname = %session.nickname,
                    "session removed"
                );
                true
            }
            None => {
                tracing::warn!(%id, "remove called for unknown connection");
                false
            }
        }
    }

    /// Returns `true` if `id` is registered.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.inner.lock().await.sessions.contains_key(&id)
    }

    /// Returns the number of registered sessions.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    /// Returns `true` if no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.sessions.is_empty()
    }
}

impl<C> Default for ClientRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
