//! The storage hook the gateway delegates to.

use std::future::Future;

use crate::StoreError;

/// One persisted chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Nickname of the author when the message was sent.
    pub sender: String,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Message body.
    pub text: String,
}

impl StoredMessage {
    /// Creates a record.
    pub fn new(
        sender: impl Into<String>,
        timestamp: u64,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            timestamp,
            text: text.into(),
        }
    }
}

/// An append-only message log.
///
/// Implementations serialize their own writes; the gateway calls them
/// from many connection tasks at once.
pub trait MessageStore: Send + Sync + 'static {
    /// Returns every stored message in insertion order.
    fn fetch_history(
        &self,
    ) -> impl Future<Output = Result<Vec<StoredMessage>, StoreError>> + Send;

    /// Appends one message. A single-row write, atomic at the storage
    /// layer.
    fn append(
        &self,
        record: StoredMessage,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
