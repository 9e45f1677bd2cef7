//! Error types for the persistence layer.

/// Errors that can occur while reading or writing message history.
///
/// None of these ever reach a chat client: the gateway turns the first
/// one into a permanent switch to [`GatewayHealth::Disabled`].
///
/// [`GatewayHealth::Disabled`]: crate::GatewayHealth::Disabled
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The gateway is disabled; the backing store was not contacted.
    #[error("persistence is disabled")]
    Disabled,

    /// SQLite reported an error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Preparing the database location failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A previous writer panicked while holding the connection.
    #[error("database connection lock poisoned")]
    Poisoned,

    /// The blocking database task was cancelled or panicked.
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Any other backend failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
