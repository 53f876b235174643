//! Client builder and supervisory loop.
//!
//! The [`ClientBuilder`] registers handlers and tunes the configuration.
//! [`ClientBuilder::build`] returns the [`Client`] handle plus the
//! [`EventStream`]. The client lifecycle:
//! 1. Negotiate an endpoint and dial it
//! 2. Spawn the receive loop, run the pump until the session ends
//! 3. Publish `Disconnected`, then reconnect (immediately after a clean
//!    session, after a backoff delay after a failed attempt)
//! 4. Stop on `shutdown()` or when credentials are rejected
//!
//! # Example
//!
//! ```ignore
//! use socketmode_client::{Client, StaticEndpoint};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (client, mut events) = Client::builder()
//!         .on_slash_command("/deploy", |_event, ctx| async move {
//!             ctx.reply(&serde_json::json!({"text": "deploying"}))
//!         })
//!         .build(StaticEndpoint("wss://example.invalid/link".into()));
//!
//!     let runner = client.clone();
//!     tokio::spawn(async move { runner.run().await });
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event.kind());
//!     }
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::ack::{AckTracker, ReplyReceiver};
use crate::backoff::Backoff;
use crate::codec::{JsonPayloadDecoder, PayloadDecoder};
use crate::config::ClientConfig;
use crate::error::{ConnectError, Result, SocketModeError};
use crate::event::{DisconnectReason, Event, EventKind};
use crate::handler::{HandlerRegistry, HandlerResult, RequestContext, Selector};
use crate::hub::{EventHub, EventStream};
use crate::opener::{ConnectionOpener, ConnectionSession, EndpointNegotiator};
use crate::pump::{shutdown_requested, PumpTimings, SessionPump};
use crate::receiver::spawn_receiver;
use crate::router::EnvelopeRouter;
use crate::transport::{Dialer, Transport, WsDialer};

/// Lifecycle state of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    /// `run()` has not been called.
    Idle,
    /// Negotiating, dialing, or waiting out a retry delay.
    Connecting,
    /// A session is open and the pump is running.
    Running,
    /// The session is being torn down.
    Draining,
    /// `run()` has returned.
    Closed,
}

/// Builder for configuring and creating a client.
///
/// Handlers must be registered here; the registry is frozen once
/// [`build`](Self::build) is called.
pub struct ClientBuilder {
    registry: HandlerRegistry,
    config: ClientConfig,
    decoder: Arc<dyn PayloadDecoder>,
    dialer: Arc<dyn Dialer>,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            config: ClientConfig::default(),
            decoder: Arc::new(JsonPayloadDecoder),
            dialer: Arc::new(WsDialer),
        }
    }

    /// Register a handler for every event of `kind`.
    pub fn on<F, Fut>(self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(Arc<Event>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle(Selector::Kind(kind), handler)
    }

    /// Register a handler for Events API callbacks whose inner event has
    /// this type (e.g. `app_mention`).
    pub fn on_event_type<F, Fut>(self, event_type: &str, handler: F) -> Self
    where
        F: Fn(Arc<Event>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle(Selector::EventType(event_type.to_string()), handler)
    }

    /// Register a handler for interactions of this type (e.g. `view_submission`).
    pub fn on_interaction<F, Fut>(self, interaction_type: &str, handler: F) -> Self
    where
        F: Fn(Arc<Event>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle(Selector::Interaction(interaction_type.to_string()), handler)
    }

    /// Register the handler for a block action id.
    ///
    /// # Panics
    ///
    /// Panics if the action id already has a handler.
    pub fn on_block_action<F, Fut>(self, action_id: &str, handler: F) -> Self
    where
        F: Fn(Arc<Event>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle(Selector::BlockAction(action_id.to_string()), handler)
    }

    /// Register the handler for a slash command (including the slash).
    ///
    /// # Panics
    ///
    /// Panics if the command already has a handler.
    pub fn on_slash_command<F, Fut>(self, command: &str, handler: F) -> Self
    where
        F: Fn(Arc<Event>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle(Selector::SlashCommand(command.to_string()), handler)
    }

    /// Register a handler for an arbitrary selector.
    pub fn handle<F, Fut>(mut self, selector: Selector, handler: F) -> Self
    where
        F: Fn(Arc<Event>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.register(selector, handler);
        self
    }

    /// Register the handler for events nothing else matched.
    pub fn default_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<Event>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.register_default(handler);
        self
    }

    /// Replace the payload decoder.
    pub fn decoder(mut self, decoder: impl PayloadDecoder) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Replace the transport dialer.
    pub fn dialer(mut self, dialer: impl Dialer) -> Self {
        self.dialer = Arc::new(dialer);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the backoff base, cap and jitter bound.
    ///
    /// Default: 1s, 30s, 1s
    pub fn backoff(mut self, base: Duration, max: Duration, jitter: Duration) -> Self {
        self.config.backoff_base = base;
        self.config.backoff_max = max;
        self.config.backoff_jitter = jitter;
        self
    }

    /// Set how long a session may stay silent before it is dropped.
    ///
    /// Default: 30 seconds
    pub fn deadman_timeout(mut self, timeout: Duration) -> Self {
        self.config.deadman_timeout = timeout;
        self
    }

    /// Set the client ping interval; `None` disables pings.
    ///
    /// Default: 10 seconds
    pub fn keepalive_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.keepalive_interval = interval;
        self
    }

    /// Set the deadline for each transport write.
    ///
    /// Default: 10 seconds
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Set the deadline for the transport handshake.
    ///
    /// Default: 10 seconds
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.config.dial_timeout = timeout;
        self
    }

    /// Set the event stream buffer size.
    ///
    /// Default: 1024
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Ask the remote to cycle connections frequently.
    pub fn debug_reconnects(mut self, enabled: bool) -> Self {
        self.config.debug_reconnects = enabled;
        self
    }

    /// Build the client. `negotiator` is asked for a fresh endpoint before
    /// every connection attempt.
    pub fn build(self, negotiator: impl EndpointNegotiator) -> (Client, EventStream) {
        let config = self.config;
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();

        let tracker = AckTracker::new(reply_tx);
        let hub = EventHub::new(events_tx, Arc::new(self.registry));
        let router = EnvelopeRouter::new(self.decoder, hub.clone(), tracker.clone());
        let opener = ConnectionOpener::new(
            Arc::new(negotiator),
            self.dialer,
            config.dial_timeout,
            config.debug_reconnects,
        );

        let shared = Shared {
            opener,
            router,
            hub,
            tracker,
            config,
            shutdown: watch::Sender::new(false),
            state: watch::Sender::new(ClientState::Idle),
            replies: tokio::sync::Mutex::new(reply_rx),
            sessions: AtomicU64::new(0),
            current: Mutex::new(None),
        };

        (
            Client {
                shared: Arc::new(shared),
            },
            events_rx,
        )
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct Shared {
    opener: ConnectionOpener,
    router: EnvelopeRouter,
    hub: EventHub,
    tracker: AckTracker,
    config: ClientConfig,
    shutdown: watch::Sender<bool>,
    state: watch::Sender<ClientState>,
    /// Held by `run()` for its whole duration; doubles as the run guard.
    replies: tokio::sync::Mutex<ReplyReceiver>,
    sessions: AtomicU64,
    current: Mutex<Option<ConnectionSession>>,
}

impl Shared {
    fn current(&self) -> MutexGuard<'_, Option<ConnectionSession>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Leaves the client `Closed` however `run()` ends, including when its
/// future is dropped mid-session.
struct ClosedOnExit<'a> {
    shared: &'a Shared,
}

impl Drop for ClosedOnExit<'_> {
    fn drop(&mut self) {
        let orphaned = self.shared.current().take();
        self.shared.state.send_replace(ClientState::Closed);
        tracing::info!("client stopped");

        // Only reachable when the session never got to publish its own end.
        let Some(session) = orphaned else { return };
        tracing::info!(session = session.ordinal, "run cancelled, session dropped");
        if tokio::runtime::Handle::try_current().is_ok() {
            self.shared.hub.publish(
                Event::Disconnected {
                    session: session.ordinal,
                    reason: DisconnectReason::Shutdown,
                    intentional: true,
                },
                None,
            );
        }
    }
}

/// Handle to a managed connection. Cheap to clone; all clones drive and
/// observe the same connection.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connect and keep the connection alive until [`shutdown`](Self::shutdown)
    /// is called or credentials are rejected.
    ///
    /// Returns `Ok(())` after a shutdown and
    /// [`SocketModeError::Unauthenticated`] after a fatal rejection. A client
    /// that has been shut down stays down: calling `run()` again returns
    /// immediately.
    ///
    /// Dropping the future cancels the client like a shutdown without the
    /// reply drain: the session is dropped, a `Disconnected` event is
    /// published for it and the state becomes [`ClientState::Closed`].
    pub async fn run(&self) -> Result<()> {
        let mut replies = self
            .shared
            .replies
            .try_lock()
            .map_err(|_| SocketModeError::AlreadyRunning)?;

        // Dropped before the lock, so `Closed` is published while the run
        // guard is still held.
        let _closed = ClosedOnExit {
            shared: &*self.shared,
        };
        self.shared.state.send_replace(ClientState::Connecting);

        self.supervise(&mut replies).await
    }

    /// Stop the client and wait until the current session is torn down.
    ///
    /// Idempotent and safe to call from any task, including handlers. No
    /// events are published after this returns.
    pub async fn shutdown(&self) {
        self.shared.shutdown.send_replace(true);
        let mut state = self.shared.state.subscribe();
        let _ = state
            .wait_for(|s| matches!(s, ClientState::Idle | ClientState::Closed))
            .await;
    }

    /// Answer envelope `envelope_id`, with an optional payload.
    ///
    /// At most one reply is ever written per envelope: fails with
    /// [`SocketModeError::NotPending`] when it was already answered (by a
    /// handler, by an earlier call, or by the default ack). The default ack
    /// goes out as soon as the envelope's handlers finish, so replying from
    /// the event stream only works while a handler still holds it.
    pub fn reply(&self, envelope_id: &str, payload: Option<Value>) -> Result<()> {
        self.shared.tracker.reply(envelope_id, payload)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        *self.shared.state.borrow()
    }

    /// Subscribe to lifecycle state changes.
    pub fn watch_state(&self) -> watch::Receiver<ClientState> {
        self.shared.state.subscribe()
    }

    /// The open session, if any.
    pub fn current_session(&self) -> Option<ConnectionSession> {
        self.shared.current().clone()
    }

    /// The active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    async fn supervise(&self, replies: &mut ReplyReceiver) -> Result<()> {
        let shared = &*self.shared;
        let config = &shared.config;
        let mut backoff = Backoff::new(
            config.backoff_base,
            config.backoff_max,
            config.backoff_jitter,
        );
        let mut shutdown = shared.shutdown.subscribe();

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let ordinal = shared.sessions.fetch_add(1, Ordering::Relaxed) + 1;
            let attempt = backoff.attempts() + 1;
            shared.state.send_replace(ClientState::Connecting);
            tracing::info!(session = ordinal, attempt, "connecting");
            shared.hub.publish(
                Event::Connecting {
                    session: ordinal,
                    attempt,
                },
                None,
            );

            let opened = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => return Ok(()),
                opened = shared.opener.open(ordinal) => opened,
            };

            match opened {
                Ok((session, transport)) => {
                    backoff.reset();
                    let reason = self.run_session(session, transport, replies).await;
                    if reason == DisconnectReason::Shutdown {
                        return Ok(());
                    }
                }
                Err(ConnectError::Unauthenticated(message)) => {
                    tracing::error!(session = ordinal, "credentials rejected: {}", message);
                    shared.hub.publish(
                        Event::InvalidAuth {
                            message: message.clone(),
                        },
                        None,
                    );
                    return Err(SocketModeError::Unauthenticated(message));
                }
                Err(error) => {
                    let mut delay = backoff.next_delay();
                    if let Some(retry_after) = error.retry_after() {
                        delay = delay.max(retry_after);
                    }
                    tracing::warn!(
                        session = ordinal,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "connection attempt failed: {}",
                        error
                    );
                    shared.hub.publish(
                        Event::ConnectionError {
                            attempt,
                            error,
                            retry_in: delay,
                        },
                        None,
                    );

                    tokio::select! {
                        _ = shutdown_requested(&mut shutdown) => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Run one session to completion and publish its end.
    async fn run_session(
        &self,
        session: ConnectionSession,
        transport: Transport,
        replies: &mut ReplyReceiver,
    ) -> DisconnectReason {
        let shared = &*self.shared;
        let config = &shared.config;
        let ordinal = session.ordinal;

        let url = session.endpoint.url.clone();
        tracing::info!(session = ordinal, url = %url, "connected");
        *shared.current() = Some(session);
        shared.state.send_replace(ClientState::Running);
        shared.hub.publish(
            Event::Connected {
                session: ordinal,
                url,
            },
            None,
        );

        let (sink, stream) = transport.into_split();
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity.max(1));
        let mut receiver = spawn_receiver(stream, inbound_tx, ordinal);

        let pump = SessionPump {
            session: ordinal,
            sink,
            inbound: inbound_rx,
            replies,
            shutdown: shared.shutdown.subscribe(),
            router: &shared.router,
            hub: &shared.hub,
            state: &shared.state,
            timings: PumpTimings {
                deadman_timeout: config.deadman_timeout,
                keepalive_interval: config.keepalive_interval,
                write_timeout: config.write_timeout,
                close_grace: config.close_grace,
            },
        };
        let reason = pump.run().await;

        // The pump dropped its end of the inbound channel; the receive loop
        // exits on its own unless it is stuck in a read.
        if tokio::time::timeout(config.close_grace, &mut receiver)
            .await
            .is_err()
        {
            tracing::debug!(session = ordinal, "receive loop still reading, aborting");
            receiver.abort();
        }
        *shared.current() = None;

        let intentional = reason.is_intentional();
        if intentional {
            tracing::info!(session = ordinal, reason = ?reason, "disconnected");
        } else {
            tracing::warn!(session = ordinal, reason = ?reason, "connection lost");
        }
        shared.hub.publish(
            Event::Disconnected {
                session: ordinal,
                reason: reason.clone(),
                intentional,
            },
            None,
        );
        reason
    }
}
