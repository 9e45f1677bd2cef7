//! Message history persistence for Parley.
//!
//! History is a side channel: the relay works the same with or without
//! it. This crate provides:
//!
//! - [`MessageStore`]: the append/fetch hook, with [`SqliteStore`] and
//!   [`MemoryStore`] implementations
//! - [`PersistenceGateway`]: wraps a store with an
//!   enabled/disabled health flag that trips on the first failure

mod error;
mod gateway;
mod memory;
mod sqlite;
mod store;

pub use error::StoreError;
pub use gateway::{GatewayHealth, PersistenceGateway};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{MessageStore, StoredMessage};
