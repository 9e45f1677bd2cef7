//! In-process [`MessageStore`], for tests and ephemeral servers.

use tokio::sync::Mutex;

use crate::{MessageStore, StoreError, StoredMessage};

/// Message history kept in a `Vec`. Never fails.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<StoredMessage>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-filled with `records`, oldest first.
    pub fn with_records(records: Vec<StoredMessage>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Returns a copy of the stored records.
    pub async fn records(&self) -> Vec<StoredMessage> {
        self.records.lock().await.clone()
    }
}

impl MessageStore for MemoryStore {
    async fn fetch_history(&self) -> Result<Vec<StoredMessage>, StoreError> {
        Ok(self.records.lock().await.clone())
    }

    async fn append(&self, record: StoredMessage) -> Result<(), StoreError> {
        self.records.lock().await.push(record);
        Ok(())
    }
}
