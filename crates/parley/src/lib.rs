//! # Parley
//!
//! Minimal real-time chat relay over WebSocket.
//!
//! Clients connect, announce a nickname with a `login` message, and send
//! `textmsg` messages. Every text message is stamped with the sender's
//! nickname and the server time, then fanned out to every connected
//! client. When a history store is available, new clients get the stored
//! messages replayed right after they log in.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//!
//! # async fn run() -> Result<(), RelayError> {
//! let server = RelayServerBuilder::new()
//!     .bind("0.0.0.0:6969")
//!     .build(PersistenceGateway::<SqliteStore>::disabled())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;
mod supervisor;
#[cfg(test)]
mod testing;

pub use config::{Cli, RelayConfig};
pub use error::RelayError;
pub use server::{RelayServer, RelayServerBuilder};

pub use parley_protocol::{Codec, JsonCodec, OutboundMessage, WireType};
pub use parley_session::{ClientRegistry, SessionRef, DEFAULT_NICKNAME};
pub use parley_store::{
    GatewayHealth, MemoryStore, MessageStore, PersistenceGateway, SqliteStore, StoreError,
    StoredMessage,
};
pub use parley_transport::{ConnectionId, Frame};

pub mod prelude {
    pub use crate::{
        MemoryStore, PersistenceGateway, RelayConfig, RelayError, RelayServer,
        RelayServerBuilder, SqliteStore,
    };
}
