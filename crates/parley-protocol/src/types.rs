//! Core protocol types for Parley's wire format.
//!
//! Two shapes travel on the wire:
//!
//! - [`InboundMessage`]: what a client sends: `{"type": ..., "text": ...}`
//! - [`OutboundMessage`]: what the server relays:
//!   `{"type": ..., "text": ..., "date": "<epoch secs>", "sender": ...}`
//!
//! In between, the relay works with an [`Envelope`], which also records
//! who sent the frame and how it was classified ([`MessageKind`]).

use std::fmt;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::IntoDeserializer;
use serde::de::value::StrDeserializer;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// The `type` field values the protocol understands.
///
/// `#[serde(rename_all = "lowercase")]` makes `TextMsg` travel as
/// `"textmsg"`, which is what browser clients send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireType {
    /// Client announces its nickname.
    Login,
    /// A chat line to relay.
    TextMsg,
}

impl WireType {
    /// Parses the raw `type` string of an inbound message, using the same
    /// names as the serde representation.
    pub fn parse(raw: &str) -> Option<Self> {
        let de: StrDeserializer<'_, serde::de::value::Error> = raw.into_deserializer();
        Self::deserialize(de).ok()
    }
}

/// A client → server message.
///
/// `type` is kept as a raw string so an unknown value can be reported
/// verbatim instead of as a generic deserialization error. Unknown extra
/// fields (a client echoing `date` or `sender`) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundMessage {
    /// Raw `type` field.
    #[serde(rename = "type")]
    pub kind: String,
    /// Message body, untrimmed.
    pub text: String,
}

/// A server → client message with the fixed four-field schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Message type.
    #[serde(rename = "type")]
    pub kind: WireType,
    /// Message body.
    pub text: String,
    /// Seconds since the Unix epoch, as a decimal string.
    pub date: String,
    /// Nickname of the author.
    pub sender: String,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// How an inbound frame was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `{"type": "login"}`: sets the sender's nickname.
    Login,
    /// `{"type": "textmsg"}`: relayed to everyone.
    TextMsg,
    /// A binary frame. Reserved for non-text payloads.
    Binary,
    /// Anything that failed to parse or had an unknown `type`.
    Malformed,
}

impl MessageKind {
    /// The wire type for this kind, if it can be sent to a client.
    pub fn wire_type(self) -> Option<WireType> {
        match self {
            MessageKind::Login => Some(WireType::Login),
            MessageKind::TextMsg => Some(WireType::TextMsg),
            MessageKind::Binary | MessageKind::Malformed => None,
        }
    }
}

impl From<WireType> for MessageKind {
    fn from(wire: WireType) -> Self {
        match wire {
            WireType::Login => MessageKind::Login,
            WireType::TextMsg => MessageKind::TextMsg,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Login => "login",
            MessageKind::TextMsg => "textmsg",
            MessageKind::Binary => "binary",
            MessageKind::Malformed => "malformed",
        };
        f.write_str(name)
    }
}

/// One decoded message, built fresh per inbound frame.
///
/// For [`MessageKind::Malformed`], `text` holds a diagnostic describing
/// why the frame was rejected rather than anything the client wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Classification of the frame.
    pub kind: MessageKind,
    /// Trimmed message body (or diagnostic, see above).
    pub text: String,
    /// Remote address of the originating connection. `None` for messages
    /// replayed from storage.
    pub sender_addr: Option<SocketAddr>,
    /// Nickname of the sender at decode time.
    pub sender: String,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}

impl Envelope {
    /// Builds a `textmsg` envelope, e.g. for replaying stored history.
    pub fn text_message(
        sender: impl Into<String>,
        text: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            kind: MessageKind::TextMsg,
            text: text.into(),
            sender_addr: None,
            sender: sender.into(),
            timestamp,
        }
    }
}

/// Current wall-clock time in whole seconds since the Unix epoch.
///
/// A clock set before 1970 yields `0` rather than an error.
pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// =========================================================================
// Tests
// =========================================================================
