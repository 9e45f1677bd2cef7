//! Wire protocol for Parley.
//!
//! This crate defines the "language" that chat clients and the relay speak:
//!
//! - **Types** ([`Envelope`], [`MessageKind`], [`OutboundMessage`]):
//!   the message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames are turned
//!   into envelopes and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong.
//!
//! ```text
//! Transport (Frame) → Protocol (Envelope) → Relay (dispatch by kind)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    now_epoch_secs, Envelope, InboundMessage, MessageKind, OutboundMessage,
    WireType,
};
