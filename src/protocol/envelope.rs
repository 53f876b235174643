//! Inbound envelope decoding.
//!
//! Every text frame from the endpoint is a JSON object with a `type` field.
//! Payload frames also carry an `envelope_id` that must be acknowledged and
//! a nested `payload` object which is kept as raw bytes for the payload
//! decoder.
//!
//! ```text
//! {"envelope_id":"E1","type":"events_api","accepts_response_payload":false,
//!  "retry_attempt":0,"retry_reason":"","payload":{...}}
//! ```
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use socketmode_client::protocol::{Envelope, EnvelopeKind};
//!
//! let raw = Bytes::from_static(br#"{"envelope_id":"E1","type":"slash_commands","payload":{"command":"/deploy"}}"#);
//! let envelope = Envelope::decode(raw).unwrap();
//!
//! assert_eq!(envelope.id, "E1");
//! assert_eq!(envelope.kind, EnvelopeKind::SlashCommands);
//! assert!(envelope.requires_ack());
//! ```

use bytes::Bytes;
use serde::Deserialize;
use serde_json::value::RawValue;

/// Frame kind, taken from the envelope `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    /// Connection accepted by the remote.
    Hello,
    /// Remote asks the client to reconnect.
    Disconnect,
    /// Events API callback.
    EventsApi,
    /// Interactive component callback (block actions, views, shortcuts).
    Interactive,
    /// Slash command invocation.
    SlashCommands,
    /// Anything else.
    Unknown,
}

impl EnvelopeKind {
    /// Map a wire `type` string to a kind.
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "hello" => EnvelopeKind::Hello,
            "disconnect" => EnvelopeKind::Disconnect,
            "events_api" => EnvelopeKind::EventsApi,
            "interactive" => EnvelopeKind::Interactive,
            "slash_commands" => EnvelopeKind::SlashCommands,
            _ => EnvelopeKind::Unknown,
        }
    }

    /// Wire name of this kind (`"unknown"` for [`EnvelopeKind::Unknown`]).
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKind::Hello => "hello",
            EnvelopeKind::Disconnect => "disconnect",
            EnvelopeKind::EventsApi => "events_api",
            EnvelopeKind::Interactive => "interactive",
            EnvelopeKind::SlashCommands => "slash_commands",
            EnvelopeKind::Unknown => "unknown",
        }
    }

    /// Whether this kind carries an application payload.
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(
            self,
            EnvelopeKind::EventsApi | EnvelopeKind::Interactive | EnvelopeKind::SlashCommands
        )
    }
}

#[derive(Deserialize)]
struct WireEnvelope<'a> {
    #[serde(default)]
    envelope_id: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    accepts_response_payload: bool,
    #[serde(default)]
    retry_attempt: u32,
    #[serde(default)]
    retry_reason: String,
    #[serde(borrow, default)]
    payload: Option<&'a RawValue>,
}

/// A decoded inbound frame. Immutable once created.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Correlation identifier, empty for control frames.
    pub id: String,
    /// Frame kind.
    pub kind: EnvelopeKind,
    /// The `type` string as sent by the remote.
    pub wire_type: String,
    /// Whether the reply may carry a payload.
    pub accepts_response_payload: bool,
    /// Delivery attempt number for redelivered envelopes.
    pub retry_attempt: u32,
    /// Why the envelope was redelivered.
    pub retry_reason: String,
    /// Raw JSON of the `payload` field (empty when absent).
    pub payload: Bytes,
    /// The complete frame.
    pub raw: Bytes,
}

impl Envelope {
    /// Decode a raw text frame.
    pub fn decode(raw: Bytes) -> serde_json::Result<Self> {
        let wire: WireEnvelope<'_> = serde_json::from_slice(&raw)?;

        let payload = match wire.payload {
            Some(value) => Bytes::copy_from_slice(value.get().as_bytes()),
            None => Bytes::new(),
        };

        Ok(Self {
            kind: EnvelopeKind::from_wire(&wire.kind),
            id: wire.envelope_id,
            wire_type: wire.kind,
            accepts_response_payload: wire.accepts_response_payload,
            retry_attempt: wire.retry_attempt,
            retry_reason: wire.retry_reason,
            payload,
            raw: raw.clone(),
        })
    }

    /// Whether this envelope must be answered with exactly one reply.
    #[inline]
    pub fn requires_ack(&self) -> bool {
        self.kind.is_payload() && !self.id.is_empty()
    }
}
