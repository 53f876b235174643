//! In-memory endpoint for integration tests.
//!
//! Every dial creates a `tokio::io::duplex` pair with a WebSocket on each
//! end. The client gets one end through [`DuplexDialer`]; the test receives
//! the server end from [`MockEndpoint::accept`]. Everything is scoped to the
//! test that created it.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use socketmode_client::handler::BoxFuture;
use socketmode_client::transport::{Dialer, Transport};
use socketmode_client::{ConnectError, Endpoint, EndpointNegotiator, Event, EventStream};

pub type ServerSocket = WebSocketStream<DuplexStream>;

pub const ENDPOINT_URL: &str = "wss://mock.invalid/link?ticket=test";

const WAIT: Duration = Duration::from_secs(60);

/// Test side of the mock endpoint.
pub struct MockEndpoint {
    servers: mpsc::UnboundedReceiver<ServerSocket>,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl MockEndpoint {
    /// Wait for the client's next connection.
    pub async fn accept(&mut self) -> ServerSocket {
        tokio::time::timeout(WAIT, self.servers.recv())
            .await
            .expect("client did not connect")
            .expect("dialer dropped")
    }

    /// When each negotiation happened.
    pub fn negotiations(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

/// Negotiator that replays scripted results, then succeeds forever.
pub struct ScriptedNegotiator {
    script: Mutex<VecDeque<Result<Endpoint, ConnectError>>>,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl EndpointNegotiator for ScriptedNegotiator {
    fn negotiate(&self) -> BoxFuture<'_, Result<Endpoint, ConnectError>> {
        self.calls.lock().unwrap().push(Instant::now());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Endpoint::new(ENDPOINT_URL)));
        Box::pin(async move { next })
    }
}

/// Dialer that connects to the mock endpoint in memory.
pub struct DuplexDialer {
    servers: mpsc::UnboundedSender<ServerSocket>,
}

impl Dialer for DuplexDialer {
    fn dial<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<Transport, ConnectError>> {
        Box::pin(async move {
            let (client_io, server_io) = tokio::io::duplex(64 * 1024);
            let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
            let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
            self.servers
                .send(server)
                .map_err(|_| ConnectError::transient("mock endpoint gone"))?;
            Ok(Transport::from_websocket(client))
        })
    }
}

/// Build the three pieces of the mock endpoint.
pub fn mock_endpoint(
    script: Vec<Result<Endpoint, ConnectError>>,
) -> (MockEndpoint, ScriptedNegotiator, DuplexDialer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let calls = Arc::new(Mutex::new(Vec::new()));
    (
        MockEndpoint {
            servers: rx,
            calls: calls.clone(),
        },
        ScriptedNegotiator {
            script: Mutex::new(script.into()),
            calls,
        },
        DuplexDialer { servers: tx },
    )
}

/// Send a JSON text frame from the server.
pub async fn send_json(server: &mut ServerSocket, value: Value) {
    server.send(Message::Text(value.to_string())).await.unwrap();
}

/// Next text frame from the client, skipping control frames. `None` on
/// close or when nothing arrives within `within`.
pub async fn next_text(server: &mut ServerSocket, within: Duration) -> Option<String> {
    let deadline = Instant::now() + within;
    loop {
        let next = tokio::time::timeout_at(deadline, server.next()).await.ok()??;
        match next {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
            Ok(Message::Binary(_)) => continue,
            Ok(Message::Close(_)) | Err(_) => return None,
        }
    }
}

/// Next text frame from the client as JSON.
pub async fn next_json(server: &mut ServerSocket) -> Value {
    let text = next_text(server, WAIT)
        .await
        .expect("client sent no reply");
    serde_json::from_str(&text).unwrap()
}

/// Wait for the first event matching `pred`, discarding the rest.
pub async fn wait_for_event<F>(events: &mut EventStream, pred: F) -> Event
where
    F: Fn(&Event) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            let event = events.recv().await.expect("event stream closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event did not arrive")
}

/// Collect every event up to and including the first matching `pred`.
pub async fn events_until<F>(events: &mut EventStream, pred: F) -> Vec<Event>
where
    F: Fn(&Event) -> bool,
{
    tokio::time::timeout(WAIT, async {
        let mut seen = Vec::new();
        loop {
            let event = events.recv().await.expect("event stream closed");
            let done = pred(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
    })
    .await
    .expect("event did not arrive")
}

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
