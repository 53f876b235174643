//! Protocol module - envelope framing and replies.
//!
//! This module implements the JSON envelope protocol spoken over the
//! WebSocket:
//! - Inbound [`Envelope`] decoding with frame kind classification
//! - [`OutboundReply`] encoding for acknowledgments and responses

mod envelope;
mod reply;

pub use envelope::{Envelope, EnvelopeKind};
pub use reply::OutboundReply;
