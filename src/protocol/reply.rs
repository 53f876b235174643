//! Outbound reply encoding.
//!
//! A reply is the only frame the client ever writes. An empty ack is just
//! the identifier; an application reply adds a `payload` object.
//!
//! ```text
//! {"envelope_id":"E1"}
//! {"envelope_id":"E2","payload":{"ok":true}}
//! ```

use serde::Serialize;
use serde_json::Value;

/// Reply correlated to one inbound envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundReply {
    /// Identifier of the envelope being answered.
    pub envelope_id: String,
    /// Optional response body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl OutboundReply {
    /// Empty-body acknowledgment.
    pub fn ack(envelope_id: impl Into<String>) -> Self {
        Self {
            envelope_id: envelope_id.into(),
            payload: None,
        }
    }

    /// Reply carrying a response body.
    pub fn with_payload(envelope_id: impl Into<String>, payload: Value) -> Self {
        Self {
            envelope_id: envelope_id.into(),
            payload: Some(payload),
        }
    }

    /// Whether this is a bare acknowledgment.
    #[inline]
    pub fn is_empty_ack(&self) -> bool {
        self.payload.is_none()
    }

    /// Encode to the JSON text written on the wire.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_ack_has_no_payload_field() {
        let reply = OutboundReply::ack("E1");
        assert!(reply.is_empty_ack());
        assert_eq!(reply.encode().unwrap(), r#"{"envelope_id":"E1"}"#);
    }

    #[test]
    fn test_reply_with_payload() {
        let reply = OutboundReply::with_payload("E2", json!({"ok": true}));
        assert!(!reply.is_empty_ack());
        assert_eq!(
            reply.encode().unwrap(),
            r#"{"envelope_id":"E2","payload":{"ok":true}}"#
        );
    }
}
