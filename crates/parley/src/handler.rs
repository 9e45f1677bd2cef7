//! The relay engine: one receive loop per connection.
//!
//! ```text
//!   Connected ──→ AwaitingFirstFrame ──(frame)──→ Active ──(read ends)──→ Closed
//! ```
//!
//! Each inbound frame is decoded with the sender's current nickname and
//! dispatched by kind:
//!   - `login`   → set nickname, replay stored history to this client
//!   - `textmsg` → broadcast to every registered client, then store
//!   - `binary`  → ignored
//!   - malformed → logged and dropped
//!
//! A failure while handling one frame never ends the loop. Only the
//! connection's own transport failing does.

use std::fmt;
use std::time::Duration;

use futures_util::future::join_all;
use parley_protocol::{now_epoch_secs, Codec, Envelope, MessageKind};
use parley_session::{SessionRef, DEFAULT_NICKNAME};
use parley_store::{MessageStore, StoredMessage};
use parley_transport::{Connection, ConnectionId, Frame, TransportError};

use crate::server::ServerState;

/// Where a connection is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingFirstFrame,
    Active,
    Closed,
}

/// Why a relay loop ended.
#[derive(Debug)]
pub(crate) enum CloseReason {
    /// The peer closed the connection cleanly.
    PeerClosed,
    /// Reading from the connection failed.
    ReadFailed(TransportError),
    /// Nothing arrived within the configured idle timeout.
    IdleTimeout,
    /// Writing to the connection's own socket failed.
    WriteFailed(TransportError),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => f.write_str("peer closed"),
            CloseReason::ReadFailed(e) => write!(f, "read failed: {e}"),
            CloseReason::IdleTimeout => f.write_str("idle timeout"),
            CloseReason::WriteFailed(e) => write!(f, "write failed: {e}"),
        }
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct BroadcastReport {
    /// Sessions in the snapshot, i.e. sends started.
    pub(crate) attempted: usize,
    /// Sends that completed.
    pub(crate) delivered: usize,
    /// Sends that errored or timed out.
    pub(crate) failed: usize,
}

/// Runs the receive loop for `conn` until its transport ends.
///
/// The connection must already be registered. Removal is the caller's job.
pub(crate) async fn relay_loop<C, S>(
    conn: &C,
    state: &ServerState<C, S>,
) -> CloseReason
where
    C: Connection,
    S: MessageStore,
{
    let conn_id = conn.id();
    let mut phase = Phase::AwaitingFirstFrame;
    tracing::debug!(%conn_id, ?phase, "relay loop started");

    let reason = loop {
        let frame = match next_frame(conn, state.config.idle_timeout).await {
            Ok(frame) => frame,
            Err(reason) => break reason,
        };

        if phase == Phase::AwaitingFirstFrame {
            phase = Phase::Active;
            tracing::debug!(%conn_id, ?phase, "first frame received");
        }

        let nickname = current_nickname(state, conn_id).await;
        let envelope = state.codec.decode(&frame, conn.peer_addr(), &nickname);

        if let Err(e) = dispatch(conn, state, envelope).await {
            break CloseReason::WriteFailed(e);
        }
    };

    phase = Phase::Closed;
    tracing::debug!(%conn_id, ?phase, %reason, "relay loop finished");
    reason
}

/// Waits for the next frame, mapping every way the read can end to a
/// [`CloseReason`].
async fn next_frame<C: Connection>(
    conn: &C,
    idle_timeout: Option<Duration>,
) -> Result<Frame, CloseReason> {
    let received = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, conn.recv())
            .await
            .map_err(|_| CloseReason::IdleTimeout)?,
        None => conn.recv().await,
    };

    match received {
        Ok(Some(frame)) => Ok(frame),
        Ok(None) => Err(CloseReason::PeerClosed),
        Err(e) => Err(CloseReason::ReadFailed(e)),
    }
}

async fn current_nickname<C, S>(
    state: &ServerState<C, S>,
    conn_id: ConnectionId,
) -> String {
    state
        .registry
        .nickname(conn_id)
        .await
        .unwrap_or_else(|| DEFAULT_NICKNAME.to_owned())
}

/// Handles one decoded envelope.
///
/// Returns `Err` only when a send on `conn` itself fails, which ends the
/// connection.
async fn dispatch<C, S>(
    conn: &C,
    state: &ServerState<C, S>,
    envelope: Envelope,
) -> Result<(), TransportError>
where
    C: Connection,
    S: MessageStore,
{
    let conn_id = conn.id();
    match envelope.kind {
        MessageKind::Login => handle_login(conn, state, envelope).await?,
        MessageKind::TextMsg => {
            handle_text(conn_id, state, envelope).await;
        }
        MessageKind::Binary => {
            tracing::debug!(%conn_id, "ignoring binary frame");
        }
        MessageKind::Malformed => {
            tracing::warn!(
                %conn_id,
                reason = %envelope.text,
                "dropping malformed frame"
            );
        }
    }
    Ok(())
}

/// `login`: rename the session, then replay history to this client only.
async fn handle_login<C, S>(
    conn: &C,
    state: &ServerState<C, S>,
    envelope: Envelope,
) -> Result<(), TransportError>
where
    C: Connection,
    S: MessageStore,
{
    let conn_id = conn.id();
    let nickname = envelope.text;
    if nickname.is_empty() {
        tracing::warn!(%conn_id, "ignoring login with blank nickname");
        return Ok(());
    }

    state.registry.set_nickname(conn_id, &nickname).await;
    tracing::info!(%conn_id, %nickname, "client logged in");

    if !state.persistence.is_enabled() {
        return Ok(());
    }
    let history = match state.persistence.fetch_history().await {
        Ok(history) => history,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "history replay skipped");
            return Ok(());
        }
    };

    tracing::debug!(%conn_id, records = history.len(), "replaying history");
    for record in history {
        let replayed =
            Envelope::text_message(record.sender, record.text, record.timestamp);
        let payload = match state.codec.encode(&replayed) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "skipping stored message");
                continue;
            }
        };
        send_with_timeout(conn, payload, state.config.send_timeout).await?;
    }
    Ok(())
}

/// `textmsg`: fan out to the current snapshot, then persist.
async fn handle_text<C, S>(
    conn_id: ConnectionId,
    state: &ServerState<C, S>,
    envelope: Envelope,
) -> BroadcastReport
where
    C: Connection,
    S: MessageStore,
{
    // Re-stamp: the nickname may have changed since the frame was decoded.
    let envelope = Envelope {
        sender: current_nickname(state, conn_id).await,
        timestamp: now_epoch_secs(),
        ..envelope
    };

    let payload = match state.codec.encode(&envelope) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(%conn_id, error = %e, "failed to encode message");
            return BroadcastReport::default();
        }
    };

    let recipients = state.registry.snapshot().await;
    let report = broadcast(&recipients, &payload, state.config.send_timeout).await;
    tracing::debug!(
        %conn_id,
        sender = %envelope.sender,
        attempted = report.attempted,
        delivered = report.delivered,
        failed = report.failed,
        "message relayed"
    );

    if state.persistence.is_enabled() {
        let record = StoredMessage::new(
            envelope.sender,
            envelope.timestamp,
            envelope.text,
        );
        if let Err(e) = state.persistence.store(record).await {
            tracing::debug!(%conn_id, error = %e, "message not persisted");
        }
    }

    report
}

/// Sends `payload` to every recipient concurrently.
///
/// Each send is bounded by `send_timeout`; a failed or stalled recipient
/// only loses this message.
pub(crate) async fn broadcast<C: Connection>(
    recipients: &[SessionRef<C>],
    payload: &str,
    send_timeout: Duration,
) -> BroadcastReport {
    let sends = recipients.iter().map(|session| async move {
        let result =
            send_with_timeout(session.conn.as_ref(), payload.to_owned(), send_timeout)
                .await;
        if let Err(e) = &result {
            tracing::debug!(
                conn_id = %session.id,
                nickname = %session.nickname,
                error = %e,
                "dropping message for recipient"
            );
        }
        result.is_ok()
    });

    let outcomes = join_all(sends).await;
    let delivered = outcomes.iter().filter(|ok| **ok).count();
    BroadcastReport {
        attempted: outcomes.len(),
        delivered,
        failed: outcomes.len() - delivered,
    }
}

async fn send_with_timeout<C: Connection>(
    conn: &C,
    payload: String,
    send_timeout: Duration,
) -> Result<(), TransportError> {
    tokio::time::timeout(send_timeout, conn.send(Frame::Text(payload)))
        .await
        .map_err(|_| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "send timed out",
            ))
        })?
}

// =========================================================================
// Tests
// =========================================================================
