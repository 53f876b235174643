//! JSON codec and the default payload decoder.
//!
//! # Example
//!
//! ```
//! use socketmode_client::codec::{JsonPayloadDecoder, PayloadDecoder};
//! use socketmode_client::protocol::EnvelopeKind;
//! use socketmode_client::EventPayload;
//!
//! let raw = br#"{"command":"/deploy","text":"prod"}"#;
//! let payload = JsonPayloadDecoder.decode(EnvelopeKind::SlashCommands, raw).unwrap();
//!
//! match payload {
//!     EventPayload::SlashCommand(cmd) => assert_eq!(cmd.text, "prod"),
//!     other => panic!("unexpected payload {other:?}"),
//! }
//! ```

use crate::error::{Result, SocketModeError};
use crate::event::EventPayload;
use crate::protocol::EnvelopeKind;

/// serde_json decoding returning the crate error type.
pub struct JsonCodec;

impl JsonCodec {
    /// Decode JSON bytes to a value.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Turns the raw `payload` of a payload envelope into a typed event payload.
///
/// Implementations must be cheap and non-blocking: they run on the pump.
pub trait PayloadDecoder: Send + Sync + 'static {
    /// Decode `payload` bytes for an envelope of the given kind.
    fn decode(&self, kind: EnvelopeKind, payload: &[u8]) -> Result<EventPayload>;
}

impl<F> PayloadDecoder for F
where
    F: Fn(EnvelopeKind, &[u8]) -> Result<EventPayload> + Send + Sync + 'static,
{
    fn decode(&self, kind: EnvelopeKind, payload: &[u8]) -> Result<EventPayload> {
        self(kind, payload)
    }
}

/// Decoder for the standard JSON payload shapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPayloadDecoder;

impl PayloadDecoder for JsonPayloadDecoder {
    fn decode(&self, kind: EnvelopeKind, payload: &[u8]) -> Result<EventPayload> {
        match kind {
            EnvelopeKind::EventsApi => Ok(EventPayload::EventsApi(JsonCodec::decode(payload)?)),
            EnvelopeKind::Interactive => {
                Ok(EventPayload::Interactive(JsonCodec::decode(payload)?))
            }
            EnvelopeKind::SlashCommands => {
                Ok(EventPayload::SlashCommand(JsonCodec::decode(payload)?))
            }
            other => Err(SocketModeError::Handler(format!(
                "no payload shape for {} frames",
                other.as_str()
            ))),
        }
    }
}
