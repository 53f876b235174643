//! Transport module - WebSocket connection handling.
//!
//! Provides:
//! - [`Transport`] - an open connection split into sink and stream halves
//! - [`Dialer`] - handshake seam, with [`WsDialer`] as the network implementation

mod ws;

pub use ws::{
    classify_dial_error, parse_retry_after, Dialer, FrameSink, FrameStream, Transport, WsDialer,
    DEFAULT_RATE_LIMIT_RETRY_AFTER,
};
