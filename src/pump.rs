//! Per-session event pump.
//!
//! The pump is the single writer of a session's transport and the only
//! place where session state changes. It multiplexes:
//!
//! ```text
//! shutdown signal ─┐
//! deadman timer   ─┤
//! reply queue     ─┼─► select! ─► write replies / route frames / ping
//! receive loop    ─┤
//! keepalive tick  ─┘
//! ```
//!
//! Replies are written in batches: everything already queued is fed to the
//! sink and flushed once, under the write deadline.

use std::time::Duration;

use futures_util::SinkExt;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;

use crate::ack::ReplyReceiver;
use crate::client::ClientState;
use crate::deadman::DeadmanTimer;
use crate::event::{DisconnectReason, Event};
use crate::hub::EventHub;
use crate::protocol::OutboundReply;
use crate::receiver::Inbound;
use crate::router::{EnvelopeRouter, Flow};
use crate::transport::FrameSink;

/// Maximum replies written per flush.
const MAX_BATCH_SIZE: usize = 64;

/// Timing knobs for one session.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PumpTimings {
    pub deadman_timeout: Duration,
    pub keepalive_interval: Option<Duration>,
    pub write_timeout: Duration,
    pub close_grace: Duration,
}

pub(crate) struct SessionPump<'a> {
    pub session: u64,
    pub sink: FrameSink,
    pub inbound: mpsc::Receiver<Inbound>,
    pub replies: &'a mut ReplyReceiver,
    pub shutdown: watch::Receiver<bool>,
    pub router: &'a EnvelopeRouter,
    pub hub: &'a EventHub,
    pub state: &'a watch::Sender<ClientState>,
    pub timings: PumpTimings,
}

impl SessionPump<'_> {
    /// Drive the session until it ends and report why.
    pub(crate) async fn run(mut self) -> DisconnectReason {
        let mut deadman = DeadmanTimer::new(self.timings.deadman_timeout);
        let mut keepalive = self.timings.keepalive_interval.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        let reason = loop {
            tokio::select! {
                biased;

                _ = shutdown_requested(&mut self.shutdown) => break DisconnectReason::Shutdown,

                _ = deadman.elapsed() => {
                    tracing::warn!(
                        session = self.session,
                        timeout_ms = deadman.timeout().as_millis() as u64,
                        "no liveness signal, dropping connection"
                    );
                    break DisconnectReason::Timeout;
                }

                Some(first) = self.replies.recv() => {
                    self.write_batch(first).await;
                }

                item = self.inbound.recv() => match item {
                    Some(Inbound::Frame(raw)) => {
                        deadman.reset();
                        if self.router.process(raw) == Flow::Reconnect {
                            break DisconnectReason::RemoteRequested;
                        }
                    }
                    Some(Inbound::Liveness) => deadman.reset(),
                    Some(Inbound::Closed(reason)) => break DisconnectReason::RemoteClosed(reason),
                    Some(Inbound::Failed(e)) => break DisconnectReason::ReadError(e),
                    None => break DisconnectReason::ReadError("receive loop stopped".to_string()),
                },

                _ = tick(&mut keepalive) => {
                    self.send_ping().await;
                }
            }
        };

        self.state.send_replace(ClientState::Draining);
        if reason == DisconnectReason::Shutdown {
            self.drain_replies().await;
        }
        self.close().await;
        reason
    }

    /// Write `first` plus whatever else is already queued.
    async fn write_batch(&mut self, first: OutboundReply) {
        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match self.replies.try_recv() {
                Ok(reply) => batch.push(reply),
                Err(_) => break,
            }
        }

        let mut attempted = Vec::with_capacity(batch.len());
        let mut unsent = batch.into_iter();
        let mut failure = None;
        for reply in unsent.by_ref() {
            let text = match reply.encode() {
                Ok(text) => text,
                Err(e) => {
                    self.write_failed(Some(reply.envelope_id), e.to_string());
                    continue;
                }
            };
            attempted.push(reply.envelope_id);
            if let Err(e) = self.feed(Message::Text(text)).await {
                failure = Some(e);
                break;
            }
        }
        let result = match failure {
            Some(message) => Err(message),
            None => self.flush().await,
        };

        match result {
            Ok(()) => {
                for envelope_id in &attempted {
                    tracing::debug!(session = self.session, envelope_id = %envelope_id, "reply written");
                }
            }
            Err(message) => {
                // Fed but unflushed replies are lost with the failed write.
                for envelope_id in attempted {
                    self.write_failed(Some(envelope_id), message.clone());
                }
                // The rest of the batch is not fed into a sink that just
                // failed. Replies still queued are tried on the next turn.
                for reply in unsent {
                    self.write_failed(Some(reply.envelope_id), message.clone());
                }
            }
        }
    }

    /// Best effort: write replies that were queued before shutdown.
    async fn drain_replies(&mut self) {
        while let Ok(first) = self.replies.try_recv() {
            self.write_batch(first).await;
        }
    }

    async fn send_ping(&mut self) {
        let sent = match self.feed(Message::Ping(Vec::new())).await {
            Ok(()) => self.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            tracing::warn!(session = self.session, "keepalive ping failed: {}", e);
        }
    }

    async fn feed(&mut self, message: Message) -> Result<(), String> {
        match tokio::time::timeout(self.timings.write_timeout, self.sink.feed(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("write timed out after {:?}", self.timings.write_timeout)),
        }
    }

    async fn flush(&mut self) -> Result<(), String> {
        match tokio::time::timeout(self.timings.write_timeout, self.sink.flush()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("write timed out after {:?}", self.timings.write_timeout)),
        }
    }

    async fn close(&mut self) {
        match tokio::time::timeout(self.timings.close_grace, self.sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(session = self.session, "close failed: {}", e),
            Err(_) => tracing::debug!(session = self.session, "close timed out"),
        }
    }

    fn write_failed(&self, envelope_id: Option<String>, message: String) {
        tracing::warn!(session = self.session, envelope_id = ?envelope_id, "failed to write reply: {}", message);
        self.hub
            .publish(Event::WriteFailed { envelope_id, message }, None);
    }
}

/// Resolves once shutdown is signalled or the client is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
