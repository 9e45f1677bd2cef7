//! Transport abstraction layer for Parley.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! a persistent, message-framed, bidirectional connection. The relay only
//! ever sees [`Frame`]s; handshakes and wire framing stay in here.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
///
/// Assigned once at accept time and never reused within a process, so two
/// connections from the same remote address are still told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
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

/// One message as delivered by the transport.
///
/// Text and binary frames are kept apart because the relay treats them
/// differently: only text frames carry chat envelopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A UTF-8 text frame.
    Text(String),
    /// A binary frame.
    Binary(Vec<u8>),
}

/// Accepts new incoming connections.
///
/// Accepting is split in two steps. [`accept`](Transport::accept) only
/// takes a raw connection off the listener, so it is cancel-safe and
/// never waits on a remote peer. The protocol handshake happens in
/// [`Incoming::upgrade`], which callers run in the connection's own task.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// A connection that has been accepted but not yet upgraded.
    type Incoming: Incoming<Connection = Self::Connection>;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Incoming, Self::Error>> + Send;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// An accepted connection waiting for its handshake.
pub trait Incoming: Send + 'static {
    /// The connection type this upgrades into.
    type Connection: Connection;

    /// Returns the remote address.
    fn peer_addr(&self) -> SocketAddr;

    /// Completes the handshake.
    fn upgrade(
        self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single connection that can send and receive frames.
///
/// Every method takes `&self` so one handle can be shared (behind an
/// `Arc`) between the connection's own receive loop and any number of
/// concurrent broadcasts. The returned futures are `Send` so generic
/// handlers can be spawned onto the Tokio runtime.
pub trait Connection: Send + Sync + 'static {
    /// Sends a frame to the remote peer.
    fn send(
        &self,
        frame: Frame,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Frame>, TransportError>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the remote address. Metadata only, never used as identity.
    fn peer_addr(&self) -> SocketAddr;
}
