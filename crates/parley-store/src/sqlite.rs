//! SQLite-backed [`MessageStore`].
//!
//! rusqlite is synchronous, so the connection sits behind a
//! `std::sync::Mutex` and every query runs on Tokio's blocking pool via
//! `spawn_blocking`. The mutex also serializes concurrent appends.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};

use crate::{MessageStore, StoreError, StoredMessage};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS message (
    sender TEXT NOT NULL,
    date   INTEGER NOT NULL,
    text   TEXT NOT NULL
)";

/// Message history in a SQLite database file.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and ensures the `message`
    /// table exists. Missing parent directories are created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!(path = %path.display(), "message store opened");
        Ok(Self::from_connection(conn))
    }

    /// Opens a private in-memory database. Nothing survives the process.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&conn)
        })
        .await?
    }
}

impl MessageStore for SqliteStore {
    async fn fetch_history(&self) -> Result<Vec<StoredMessage>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT sender, date, text FROM message ORDER BY rowid",
            )?;
            let rows = stmt.query_map([], |row| {
                let date: i64 = row.get(1)?;
                Ok(StoredMessage {
                    sender: row.get(0)?,
                    timestamp: u64::try_from(date).unwrap_or_default(),
                    text: row.get(2)?,
                })
            })?;
            let records = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }

    async fn append(&self, record: StoredMessage) -> Result<(), StoreError> {
        let date = i64::try_from(record.timestamp).map_err(|_| {
            StoreError::Unavailable(format!(
                "timestamp {} out of range",
                record.timestamp
            ))
        })?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO message (sender, date, text) VALUES (?1, ?2, ?3)",
                params![record.sender, date, record.text],
            )?;
            Ok(())
        })
        .await
    }
}
