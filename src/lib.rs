//! # socketmode-client
//!
//! Managed persistent-connection client for the socket-mode event protocol.
//!
//! The client keeps one WebSocket open to an event-streaming endpoint,
//! reconnects with jittered exponential backoff when it drops, detects
//! silent connection death with a deadman timer, and routes every inbound
//! envelope to registered handlers. Each payload envelope is acknowledged
//! exactly once: by an explicit reply, or by an empty ack once its handlers
//! have finished.
//!
//! ## Architecture
//!
//! - **Supervisor** ([`Client::run`]): connect, run a session, reconnect
//! - **Receive loop**: sole reader of the transport
//! - **Pump**: sole writer of the transport; routes frames, writes replies,
//!   watches liveness
//! - **Handlers** ([`handler`]): spawned per event, reply via [`RequestContext`]
//!
//! ## Example
//!
//! ```ignore
//! use socketmode_client::{Client, EventKind, StaticEndpoint};
//!
//! #[tokio::main]
//! async fn main() -> socketmode_client::Result<()> {
//!     let (client, _events) = Client::builder()
//!         .on_event_type("app_mention", |event, _ctx| async move {
//!             tracing::info!(?event, "mentioned");
//!             Ok(())
//!         })
//!         .on(EventKind::Disconnected, |event, _ctx| async move {
//!             tracing::warn!(?event, "connection dropped");
//!             Ok(())
//!         })
//!         .build(StaticEndpoint("wss://example.invalid/link".into()));
//!
//!     client.run().await
//! }
//! ```

pub mod ack;
pub mod backoff;
pub mod codec;
pub mod config;
pub mod deadman;
pub mod error;
pub mod event;
pub mod handler;
pub mod opener;
pub mod protocol;
pub mod transport;

mod client;
mod hub;
mod pump;
mod receiver;
mod router;

pub use client::{Client, ClientBuilder, ClientState};
pub use config::ClientConfig;
pub use error::{ConnectError, Result, SocketModeError};
pub use event::{DisconnectReason, Event, EventKind, EventPayload};
pub use handler::{RequestContext, Selector};
pub use hub::EventStream;
pub use opener::{ConnectionSession, Endpoint, EndpointNegotiator, StaticEndpoint};
