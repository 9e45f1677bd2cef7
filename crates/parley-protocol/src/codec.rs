//! Codec trait and the JSON implementation.
//!
//! A codec turns inbound [`Frame`]s into [`Envelope`]s and envelopes back
//! into outbound text. Decoding is total: whatever arrives, the relay gets
//! an envelope it can dispatch on, with bad input classified as
//! [`MessageKind::Malformed`] instead of raised as an error.

use std::net::SocketAddr;

use parley_transport::Frame;

use crate::types::{now_epoch_secs, InboundMessage, OutboundMessage, WireType};
use crate::{Envelope, MessageKind, ProtocolError};

/// Converts between transport frames and relay envelopes.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Classifies and parses one inbound frame.
    ///
    /// `nickname` is the sender's current nickname; the envelope's
    /// `sender` is always taken from it, never from the frame. The
    /// timestamp is the time of decoding.
    fn decode(
        &self,
        frame: &Frame,
        sender_addr: SocketAddr,
        nickname: &str,
    ) -> Envelope;

    /// Serializes an envelope into its outbound wire form.
    ///
    /// # Errors
    /// Returns [`ProtocolError::NotEncodable`] for `Binary` and
    /// `Malformed` envelopes, or [`ProtocolError::Encode`] if serialization
    /// itself fails.
    fn encode(&self, envelope: &Envelope) -> Result<String, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that speaks the JSON envelope format.
///
/// ## Example
///
/// ```rust
/// use parley_protocol::{Codec, JsonCodec, MessageKind};
/// use parley_transport::Frame;
///
/// let codec = JsonCodec;
/// let addr = "127.0.0.1:4000".parse().unwrap();
///
/// let frame = Frame::Text(r#"{"type":"textmsg","text":"  hi  "}"#.into());
/// let envelope = codec.decode(&frame, addr, "alice");
/// assert_eq!(envelope.kind, MessageKind::TextMsg);
/// assert_eq!(envelope.text, "hi");
///
/// let json = codec.encode(&envelope).unwrap();
/// assert!(json.contains(r#""sender":"alice""#));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    fn parse_inbound(raw: &str) -> Result<(WireType, String), ProtocolError> {
        let msg: InboundMessage =
            serde_json::from_str(raw).map_err(ProtocolError::Decode)?;
        let wire = WireType::parse(&msg.kind)
            .ok_or(ProtocolError::UnknownType(msg.kind))?;
        Ok((wire, msg.text.trim().to_owned()))
    }
}

impl Codec for JsonCodec {
    fn decode(
        &self,
        frame: &Frame,
        sender_addr: SocketAddr,
        nickname: &str,
    ) -> Envelope {
        let (kind, text) = match frame {
            Frame::Binary(_) => (MessageKind::Binary, String::new()),
            Frame::Text(raw) => match Self::parse_inbound(raw) {
                Ok((wire, text)) => (MessageKind::from(wire), text),
                Err(e) => (MessageKind::Malformed, e.to_string()),
            },
        };

        Envelope {
            kind,
            text,
            sender_addr: Some(sender_addr),
            sender: nickname.to_owned(),
            timestamp: now_epoch_secs(),
        }
    }

    fn encode(&self, envelope: &Envelope) -> Result<String, ProtocolError> {
        let kind = envelope
            .kind
            .wire_type()
            .ok_or(ProtocolError::NotEncodable(envelope.kind))?;

        let outbound = OutboundMessage {
            kind,
            text: envelope.text.clone(),
            date: envelope.timestamp.to_string(),
            sender: envelope.sender.clone(),
        };
        serde_json::to_string(&outbound).map_err(ProtocolError::Encode)
    }
}
