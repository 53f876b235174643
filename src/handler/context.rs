//! Request context for handlers.
//!
//! Provides methods for answering the envelope behind an event:
//! - `reply` - send a response payload
//! - `ack` - send an empty acknowledgment right away
//!
//! Either call suppresses the default ack. Only the first answer for an
//! envelope is written; later calls fail with
//! [`SocketModeError::NotPending`].
//!
//! # Example
//!
//! ```ignore
//! async fn deploy(event: Arc<Event>, ctx: RequestContext) -> HandlerResult {
//!     ctx.reply(&serde_json::json!({"text": "deploying"}))
//! }
//! ```

use serde::Serialize;

use crate::ack::PendingAck;
use crate::error::{Result, SocketModeError};

/// Context passed to event handlers.
///
/// `RequestContext` is `Clone`; every handler spawned for the same event
/// shares one pending acknowledgment. The default ack is sent once the last
/// context for a payload envelope is dropped without an explicit answer.
#[derive(Clone, Default)]
pub struct RequestContext {
    pending: Option<PendingAck>,
}

impl RequestContext {
    /// Context with nothing to acknowledge (lifecycle events, tests).
    pub fn detached() -> Self {
        Self { pending: None }
    }

    pub(crate) fn with_ack(pending: Option<PendingAck>) -> Self {
        Self { pending }
    }

    /// Identifier of the envelope this context answers.
    #[inline]
    pub fn envelope_id(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.envelope_id())
    }

    /// Whether the envelope still owes a reply.
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| p.tracker().is_pending(p.envelope_id()))
    }

    /// Reply with the given payload.
    pub fn reply<T: Serialize>(&self, payload: &T) -> Result<()> {
        let pending = self.pending()?;
        let value = serde_json::to_value(payload)?;
        pending.tracker().reply(pending.envelope_id(), Some(value))
    }

    /// Acknowledge immediately with an empty body.
    pub fn ack(&self) -> Result<()> {
        let pending = self.pending()?;
        pending.tracker().reply(pending.envelope_id(), None)
    }

    fn pending(&self) -> Result<&PendingAck> {
        self.pending
            .as_ref()
            .ok_or_else(|| SocketModeError::NotPending(String::new()))
    }
}
