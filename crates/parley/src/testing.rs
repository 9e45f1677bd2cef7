//! In-memory [`Connection`] for exercising the relay without sockets.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use parley_transport::{Connection, ConnectionId, Frame, TransportError};
use tokio::sync::mpsc;

/// What the peer does with frames the server sends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendBehavior {
    /// Accept and record every frame.
    Deliver,
    /// Fail every send.
    Fail,
    /// Never complete a send.
    Stall,
}

type Inbound = Result<Frame, TransportError>;

pub(crate) struct MockConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    behavior: SendBehavior,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>,
    sent: Mutex<Vec<Frame>>,
    send_attempts: AtomicUsize,
    closed: Arc<AtomicBool>,
}

impl MockConnection {
    /// A delivering connection plus the sender for its inbound frames.
    /// Dropping the sender reads as a clean close.
    pub(crate) fn new(id: u64) -> (Self, mpsc::UnboundedSender<Inbound>) {
        Self::build(id, SendBehavior::Deliver)
    }

    /// A delivering connection that reads `frames` and then closes.
    pub(crate) fn with_frames(id: u64, frames: Vec<Frame>) -> Self {
        Self::with_behavior(id, SendBehavior::Deliver, frames)
    }

    /// Like [`with_frames`](Self::with_frames) with a chosen send behavior.
    pub(crate) fn with_behavior(
        id: u64,
        behavior: SendBehavior,
        frames: Vec<Frame>,
    ) -> Self {
        let (conn, tx) = Self::build(id, behavior);
        for frame in frames {
            // The receiver is alive inside `conn`, so this cannot fail.
            let _ = tx.send(Ok(frame));
        }
        conn
    }

    fn build(id: u64, behavior: SendBehavior) -> (Self, mpsc::UnboundedSender<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let port = 40_000 + u16::try_from(id % 20_000).unwrap_or_default();
        let conn = Self {
            id: ConnectionId::new(id),
            peer_addr: SocketAddr::from(([127, 0, 0, 1], port)),
            behavior,
            inbound: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            send_attempts: AtomicUsize::new(0),
            closed: Arc::new(AtomicBool::new(false)),
        };
        (conn, tx)
    }

    pub(crate) fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    /// A flag that flips once the server closes this connection. Stays
    /// readable after the connection itself is moved away.
    pub(crate) fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    /// Every delivered frame, parsed as JSON.
    pub(crate) fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|frame| match frame {
                Frame::Text(text) => serde_json::from_str(text).unwrap(),
                Frame::Binary(_) => panic!("relay only sends text frames"),
            })
            .collect()
    }
}

impl Connection for MockConnection {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            SendBehavior::Deliver => {
                self.sent.lock().unwrap().push(frame);
                Ok(())
            }
            SendBehavior::Fail => Err(TransportError::SendFailed(
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "mock"),
            )),
            SendBehavior::Stall => std::future::pending().await,
        }
    }

    async fn recv(&self) -> Result<Option<Frame>, TransportError> {
        match self.inbound.lock().await.recv().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

pub(crate) fn login(name: &str) -> Frame {
    Frame::Text(serde_json::json!({"type": "login", "text": name}).to_string())
}

pub(crate) fn textmsg(text: &str) -> Frame {
    Frame::Text(serde_json::json!({"type": "textmsg", "text": text}).to_string())
}
