//! Exactly-once acknowledgment bookkeeping.
//!
//! Every payload envelope with an identifier is opened in the
//! [`AckTracker`] when it arrives. Whoever claims the identifier first
//! writes the only reply for it:
//!
//! - an explicit reply from a handler ([`RequestContext::reply`]) or from
//!   [`Client::reply`](crate::Client::reply), or
//! - the default empty ack, fired when the last [`PendingAck`] guard for
//!   the envelope is dropped (all handler tasks finished).
//!
//! Claiming removes the identifier from the pending set under a lock, so
//! the two paths are mutually exclusive.
//!
//! An envelope redelivered while it is still pending shares the live guard,
//! so handlers of either delivery may answer it. Each open carries a
//! generation: a stale guard from an envelope that was already answered
//! and then reopened never claims the newer entry.
//!
//! [`RequestContext::reply`]: crate::handler::RequestContext::reply

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Result, SocketModeError};
use crate::protocol::OutboundReply;

/// Sender side of the pump's reply queue.
pub(crate) type ReplySender = mpsc::UnboundedSender<OutboundReply>;

/// Receiver side of the pump's reply queue.
pub(crate) type ReplyReceiver = mpsc::UnboundedReceiver<OutboundReply>;

#[derive(Default)]
struct PendingSet {
    next_generation: u64,
    entries: HashMap<String, Entry>,
}

struct Entry {
    generation: u64,
    guard: Weak<PendingInner>,
}

/// Tracks envelopes that still owe a reply.
#[derive(Clone)]
pub struct AckTracker {
    pending: Arc<Mutex<PendingSet>>,
    replies: ReplySender,
}

impl AckTracker {
    pub(crate) fn new(replies: ReplySender) -> Self {
        Self {
            pending: Arc::new(Mutex::new(PendingSet::default())),
            replies,
        }
    }

    /// Mark `envelope_id` as owing a reply and return the default-ack guard.
    pub(crate) fn open(&self, envelope_id: &str) -> PendingAck {
        let mut pending = self.lock();
        if let Some(inner) = pending
            .entries
            .get(envelope_id)
            .and_then(|entry| entry.guard.upgrade())
        {
            tracing::debug!(envelope_id, "envelope redelivered while still pending");
            return PendingAck { inner };
        }

        pending.next_generation += 1;
        let generation = pending.next_generation;
        let inner = Arc::new(PendingInner {
            envelope_id: envelope_id.to_string(),
            generation,
            tracker: self.clone(),
        });
        pending.entries.insert(
            envelope_id.to_string(),
            Entry {
                generation,
                guard: Arc::downgrade(&inner),
            },
        );
        PendingAck { inner }
    }

    /// Send the single reply for `envelope_id`.
    ///
    /// Fails with [`SocketModeError::NotPending`] when the envelope is
    /// unknown or was already answered.
    pub fn reply(&self, envelope_id: &str, payload: Option<Value>) -> Result<()> {
        if !self.claim(envelope_id, None) {
            return Err(SocketModeError::NotPending(envelope_id.to_string()));
        }
        let reply = OutboundReply {
            envelope_id: envelope_id.to_string(),
            payload,
        };
        self.replies
            .send(reply)
            .map_err(|_| SocketModeError::ConnectionClosed)
    }

    /// Whether `envelope_id` still owes a reply.
    pub fn is_pending(&self, envelope_id: &str) -> bool {
        self.lock().entries.contains_key(envelope_id)
    }

    /// Number of envelopes still owing a reply.
    pub fn pending_count(&self) -> usize {
        self.lock().entries.len()
    }

    /// Remove the entry; with `generation`, only if it still matches.
    fn claim(&self, envelope_id: &str, generation: Option<u64>) -> bool {
        let mut pending = self.lock();
        match pending.entries.get(envelope_id) {
            Some(entry) if generation.map_or(true, |g| g == entry.generation) => {
                pending.entries.remove(envelope_id);
                true
            }
            _ => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PendingSet> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared guard that sends the default empty ack when the last clone drops.
#[derive(Clone)]
pub struct PendingAck {
    inner: Arc<PendingInner>,
}

impl PendingAck {
    /// Envelope this guard belongs to.
    pub fn envelope_id(&self) -> &str {
        &self.inner.envelope_id
    }

    pub(crate) fn tracker(&self) -> &AckTracker {
        &self.inner.tracker
    }
}

struct PendingInner {
    envelope_id: String,
    generation: u64,
    tracker: AckTracker,
}

impl Drop for PendingInner {
    fn drop(&mut self) {
        if !self.tracker.claim(&self.envelope_id, Some(self.generation)) {
            return;
        }
        tracing::debug!(envelope_id = %self.envelope_id, "sending default ack");
        if self
            .tracker
            .replies
            .send(OutboundReply::ack(self.envelope_id.clone()))
            .is_err()
        {
            tracing::debug!(envelope_id = %self.envelope_id, "reply queue closed, default ack dropped");
        }
    }
}
