//! Fan-out of events to the application stream and the handler registry.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::ack::PendingAck;
use crate::event::Event;
use crate::handler::{HandlerRegistry, RequestContext};

/// Receiving end of the application event stream.
pub type EventStream = mpsc::Receiver<Event>;

/// Publishes every event to the buffered stream and to matching handlers.
#[derive(Clone)]
pub(crate) struct EventHub {
    events: mpsc::Sender<Event>,
    registry: Arc<HandlerRegistry>,
}

impl EventHub {
    pub(crate) fn new(events: mpsc::Sender<Event>, registry: Arc<HandlerRegistry>) -> Self {
        Self { events, registry }
    }

    /// Deliver `event`. `pending` is the default-ack guard of a payload
    /// envelope; it is released once every spawned handler has finished.
    pub(crate) fn publish(&self, event: Event, pending: Option<PendingAck>) {
        self.emit(event.clone());
        let ctx = RequestContext::with_ack(pending);
        self.registry.dispatch(Arc::new(event), ctx);
    }

    /// Push onto the stream without blocking the caller.
    fn emit(&self, event: Event) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(kind = ?event.kind(), "event stream full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
