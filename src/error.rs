//! Error types for socketmode-client.

use std::time::Duration;

use thiserror::Error;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum SocketModeError {
    /// Credentials were rejected; the client stops and does not retry.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// `run()` was called while another `run()` is still active.
    #[error("Client is already running")]
    AlreadyRunning,

    /// The envelope is unknown or has already been acknowledged.
    #[error("Envelope {0} is not pending acknowledgment")]
    NotPending(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Error returned by an application handler.
    #[error("Handler error: {0}")]
    Handler(String),
}

/// Result type alias using SocketModeError.
pub type Result<T> = std::result::Result<T, SocketModeError>;

/// Classified failure of a single connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// Bad or revoked credentials, inactive account. Never retried.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The remote asked for a minimum wait before the next attempt.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Minimum wait mandated by the remote.
        retry_after: Duration,
    },

    /// Network error, timeout or unexpected status. Retried with backoff.
    #[error("transient connect failure: {0}")]
    Transient(String),
}

impl ConnectError {
    /// Create a transient error from anything printable.
    pub fn transient(err: impl std::fmt::Display) -> Self {
        ConnectError::Transient(err.to_string())
    }

    /// Whether this failure must stop the client.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConnectError::Unauthenticated(_))
    }

    /// Minimum wait mandated by the remote, if any.
    #[inline]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ConnectError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
