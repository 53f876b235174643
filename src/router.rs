//! Envelope routing and the acknowledgment protocol.
//!
//! Runs on the pump for every inbound text frame:
//!
//! | kind             | action                                               |
//! |------------------|------------------------------------------------------|
//! | `hello`          | publish [`Event::Hello`]                             |
//! | `disconnect`     | publish [`Event::DisconnectRequested`], reconnect    |
//! | payload kinds    | open ack, decode, publish [`Event::Payload`]         |
//! | anything else    | publish [`Event::Unhandled`], never acked            |
//!
//! A payload that fails to decode is still acknowledged (empty ack) so the
//! remote does not keep redelivering it.

use std::sync::Arc;

use bytes::Bytes;

use crate::ack::AckTracker;
use crate::codec::PayloadDecoder;
use crate::event::{DisconnectInfo, Event, HelloInfo};
use crate::hub::EventHub;
use crate::protocol::{Envelope, EnvelopeKind};

/// What the pump should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Reconnect,
}

pub(crate) struct EnvelopeRouter {
    decoder: Arc<dyn PayloadDecoder>,
    hub: EventHub,
    tracker: AckTracker,
}

impl EnvelopeRouter {
    pub(crate) fn new(decoder: Arc<dyn PayloadDecoder>, hub: EventHub, tracker: AckTracker) -> Self {
        Self {
            decoder,
            hub,
            tracker,
        }
    }

    /// Handle one inbound frame.
    pub(crate) fn process(&self, raw: Bytes) -> Flow {
        let envelope = match Envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("failed to decode frame: {}", e);
                self.hub.publish(
                    Event::UnmarshallingError {
                        envelope_id: None,
                        message: e.to_string(),
                    },
                    None,
                );
                return Flow::Continue;
            }
        };

        match envelope.kind {
            EnvelopeKind::Hello => {
                let hello: HelloInfo = serde_json::from_slice(&envelope.raw).unwrap_or_default();
                tracing::info!(num_connections = hello.num_connections, "received hello");
                self.hub.publish(Event::Hello(hello), None);
                Flow::Continue
            }
            EnvelopeKind::Disconnect => {
                let info: DisconnectInfo =
                    serde_json::from_slice(&envelope.raw).unwrap_or_default();
                tracing::info!(reason = %info.reason, "remote requested reconnect");
                self.hub.publish(Event::DisconnectRequested(info), None);
                Flow::Reconnect
            }
            EnvelopeKind::EventsApi | EnvelopeKind::Interactive | EnvelopeKind::SlashCommands => {
                self.route_payload(envelope);
                Flow::Continue
            }
            EnvelopeKind::Unknown => {
                tracing::debug!(wire_type = %envelope.wire_type, "unhandled frame type");
                self.hub.publish(
                    Event::Unhandled {
                        wire_type: envelope.wire_type,
                        raw: envelope.raw,
                    },
                    None,
                );
                Flow::Continue
            }
        }
    }

    fn route_payload(&self, envelope: Envelope) {
        let pending = envelope
            .requires_ack()
            .then(|| self.tracker.open(&envelope.id));

        if envelope.retry_attempt > 0 {
            tracing::debug!(
                envelope_id = %envelope.id,
                retry_attempt = envelope.retry_attempt,
                retry_reason = %envelope.retry_reason,
                "redelivered envelope"
            );
        }

        match self.decoder.decode(envelope.kind, &envelope.payload) {
            Ok(payload) => {
                let event = Event::Payload {
                    envelope_id: envelope.id,
                    retry_attempt: envelope.retry_attempt,
                    accepts_response_payload: envelope.accepts_response_payload,
                    payload,
                };
                self.hub.publish(event, pending);
            }
            Err(e) => {
                tracing::warn!(envelope_id = %envelope.id, "failed to decode payload: {}", e);
                let envelope_id = (!envelope.id.is_empty()).then_some(envelope.id);
                self.hub.publish(
                    Event::UnmarshallingError {
                        envelope_id,
                        message: e.to_string(),
                    },
                    None,
                );
                // Dropping the guard sends the empty ack.
                drop(pending);
            }
        }
    }
}
