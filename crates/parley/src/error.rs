//! Unified error type for the relay.

use parley_transport::TransportError;

/// Top-level error returned by server setup and the accept loop.
///
/// Per-connection failures (protocol, persistence, a peer's socket) are
/// handled inside the connection's task and never reach it.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A transport-level error (bind).
    #[error(transparent)]
    Transport(#[from] TransportError),
}
