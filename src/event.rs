//! Typed events delivered to the application.
//!
//! An [`Event`] is either a lifecycle notification produced by the client
//! itself (connecting, connected, disconnected, ...) or a decoded payload
//! envelope. [`Event::kind`] gives the coarse category used as the first
//! level of handler routing.

use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConnectError;

/// Coarse event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A connection attempt is starting.
    Connecting,
    /// The transport handshake completed.
    Connected,
    /// A connection attempt failed and will be retried.
    ConnectionError,
    /// Credentials were rejected; the client is stopping.
    InvalidAuth,
    /// The remote greeted the new connection.
    Hello,
    /// The remote asked the client to reconnect.
    DisconnectRequested,
    /// A session ended.
    Disconnected,
    /// Events API callback.
    EventsApi,
    /// Interactive component callback.
    Interactive,
    /// Slash command invocation.
    SlashCommand,
    /// A frame or payload could not be decoded.
    UnmarshallingError,
    /// A reply could not be written.
    WriteFailed,
    /// A frame of unknown kind arrived.
    Unhandled,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `shutdown()` was called or `run()` was cancelled.
    Shutdown,
    /// No liveness signal within the deadman timeout.
    Timeout,
    /// The remote asked for a reconnect.
    RemoteRequested,
    /// The remote closed the WebSocket.
    RemoteClosed(Option<String>),
    /// The transport failed while reading.
    ReadError(String),
}

impl DisconnectReason {
    /// Whether the client chose to end the session.
    pub fn is_intentional(&self) -> bool {
        matches!(
            self,
            DisconnectReason::Shutdown | DisconnectReason::RemoteRequested
        )
    }
}

/// Diagnostic details attached to control frames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DebugInfo {
    /// Remote host serving this connection.
    #[serde(default)]
    pub host: String,
    /// Remote build number.
    #[serde(default)]
    pub build_number: Option<u64>,
    /// Seconds before the remote will cycle this connection.
    #[serde(default)]
    pub approximate_connection_time: Option<u64>,
}

/// Connection metadata from the hello frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionInfo {
    /// Application the connection belongs to.
    #[serde(default)]
    pub app_id: String,
}

/// Body of a `hello` control frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HelloInfo {
    /// Number of open connections for this app.
    #[serde(default)]
    pub num_connections: u32,
    #[serde(default)]
    pub debug_info: Option<DebugInfo>,
    #[serde(default)]
    pub connection_info: Option<ConnectionInfo>,
}

/// Body of a `disconnect` control frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DisconnectInfo {
    /// `warning`, `refresh_requested`, `link_disabled`, ...
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub debug_info: Option<DebugInfo>,
}

/// The event wrapped by an Events API callback.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InnerEvent {
    /// Event type, e.g. `app_mention` or `message`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Remaining event fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Events API callback payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventsApiPayload {
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub api_app_id: String,
    #[serde(default)]
    pub event_id: String,
    /// Callback type, usually `event_callback`.
    #[serde(rename = "type", default)]
    pub callback_type: String,
    pub event: InnerEvent,
}

/// One action inside a `block_actions` interaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockAction {
    pub action_id: String,
    #[serde(default)]
    pub block_id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Interactive component callback payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InteractionPayload {
    /// Interaction type, e.g. `block_actions` or `view_submission`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub callback_id: String,
    #[serde(default)]
    pub trigger_id: String,
    #[serde(default)]
    pub actions: Vec<BlockAction>,
    /// Remaining payload fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Slash command payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    /// The command, including the leading slash.
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub response_url: String,
    #[serde(default)]
    pub trigger_id: String,
}

/// Decoded application payload.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    EventsApi(EventsApiPayload),
    Interactive(InteractionPayload),
    SlashCommand(SlashCommandPayload),
}

impl EventPayload {
    /// Category of this payload.
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::EventsApi(_) => EventKind::EventsApi,
            EventPayload::Interactive(_) => EventKind::Interactive,
            EventPayload::SlashCommand(_) => EventKind::SlashCommand,
        }
    }
}

/// Event delivered on the event stream and to handlers.
#[derive(Debug, Clone)]
pub enum Event {
    /// Attempt `attempt` (since the last successful connection) is starting.
    Connecting { session: u64, attempt: u32 },
    /// Session `session` is open.
    Connected { session: u64, url: String },
    /// The attempt failed; the next one starts after `retry_in`.
    ConnectionError {
        attempt: u32,
        error: ConnectError,
        retry_in: Duration,
    },
    /// Credentials were rejected.
    InvalidAuth { message: String },
    Hello(HelloInfo),
    DisconnectRequested(DisconnectInfo),
    /// Session `session` ended.
    Disconnected {
        session: u64,
        reason: DisconnectReason,
        intentional: bool,
    },
    /// A payload envelope; `envelope_id` is what replies correlate to.
    Payload {
        envelope_id: String,
        retry_attempt: u32,
        accepts_response_payload: bool,
        payload: EventPayload,
    },
    UnmarshallingError {
        envelope_id: Option<String>,
        message: String,
    },
    WriteFailed {
        envelope_id: Option<String>,
        message: String,
    },
    Unhandled { wire_type: String, raw: Bytes },
}

impl Event {
    /// Coarse category.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connecting { .. } => EventKind::Connecting,
            Event::Connected { .. } => EventKind::Connected,
            Event::ConnectionError { .. } => EventKind::ConnectionError,
            Event::InvalidAuth { .. } => EventKind::InvalidAuth,
            Event::Hello(_) => EventKind::Hello,
            Event::DisconnectRequested(_) => EventKind::DisconnectRequested,
            Event::Disconnected { .. } => EventKind::Disconnected,
            Event::Payload { payload, .. } => payload.kind(),
            Event::UnmarshallingError { .. } => EventKind::UnmarshallingError,
            Event::WriteFailed { .. } => EventKind::WriteFailed,
            Event::Unhandled { .. } => EventKind::Unhandled,
        }
    }

    /// Identifier of the originating envelope, for payload events.
    pub fn envelope_id(&self) -> Option<&str> {
        match self {
            Event::Payload { envelope_id, .. } => Some(envelope_id),
            _ => None,
        }
    }

    /// Decoded payload, for payload events.
    pub fn payload(&self) -> Option<&EventPayload> {
        match self {
            Event::Payload { payload, .. } => Some(payload),
            _ => None,
        }
    }
}
