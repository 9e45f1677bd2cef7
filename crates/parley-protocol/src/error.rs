//! Error types for the protocol layer.

use crate::MessageKind;

/// Errors that can occur in the protocol layer.
///
/// Decoding never surfaces these to the relay: the codec folds them into
/// a [`MessageKind::Malformed`] envelope. They only escape from `encode`.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an envelope into JSON).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed: malformed JSON, missing `type`/`text`, or
    /// fields of the wrong type.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The `type` field held a value the protocol doesn't know.
    #[error("unknown message type {0:?}")]
    UnknownType(String),

    /// Only `login` and `textmsg` envelopes have an outbound form.
    #[error("{0} envelopes cannot be encoded")]
    NotEncodable(MessageKind),
}
