//! Client session tracking for Parley.
//!
//! The [`ClientRegistry`] knows every live connection and the nickname it
//! announced. It is the only shared state the relay mutates per message.
//!
//! # How it fits in the stack
//!
//! ```text
//! Relay engine (above)  ← registers, renames, snapshots, removes
//!     ↕
//! Session layer (this crate)  ← connection id → handle + nickname
//!     ↕
//! Transport layer (below)  ← provides ConnectionId and the handle type
//! ```

mod registry;
mod session;

pub use registry::ClientRegistry;
pub use session::{SessionRef, DEFAULT_NICKNAME};
