//! Connection opener: endpoint negotiation plus transport handshake.
//!
//! Each attempt asks the [`EndpointNegotiator`] for a fresh short-lived URL
//! and then dials it. Failures come back already classified as
//! [`ConnectError`] so the supervisor can decide between stopping, waiting
//! out a rate limit, or backing off.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::error::ConnectError;
use crate::handler::BoxFuture;
use crate::transport::{Dialer, Transport};

/// A negotiated connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// WebSocket URL, including any ephemeral ticket.
    pub url: String,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Obtains a fresh connection target before every attempt.
pub trait EndpointNegotiator: Send + Sync + 'static {
    fn negotiate(&self) -> BoxFuture<'_, Result<Endpoint, ConnectError>>;
}

impl<F, Fut> EndpointNegotiator for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Endpoint, ConnectError>> + Send + 'static,
{
    fn negotiate(&self) -> BoxFuture<'_, Result<Endpoint, ConnectError>> {
        Box::pin(self())
    }
}

/// Negotiator that always hands out the same URL.
#[derive(Debug, Clone)]
pub struct StaticEndpoint(pub String);

impl EndpointNegotiator for StaticEndpoint {
    fn negotiate(&self) -> BoxFuture<'_, Result<Endpoint, ConnectError>> {
        let endpoint = Endpoint::new(self.0.clone());
        Box::pin(async move { Ok(endpoint) })
    }
}

/// One physical connection. Replaced, never mutated, on reconnect.
#[derive(Debug, Clone)]
pub struct ConnectionSession {
    /// Attempt ordinal, increasing for the lifetime of the client.
    pub ordinal: u64,
    /// When the handshake completed.
    pub opened_at: SystemTime,
    /// Where the connection went.
    pub endpoint: Endpoint,
}

/// Negotiates and dials connections for the supervisor.
pub(crate) struct ConnectionOpener {
    negotiator: Arc<dyn EndpointNegotiator>,
    dialer: Arc<dyn Dialer>,
    dial_timeout: Duration,
    debug_reconnects: bool,
}

impl ConnectionOpener {
    pub(crate) fn new(
        negotiator: Arc<dyn EndpointNegotiator>,
        dialer: Arc<dyn Dialer>,
        dial_timeout: Duration,
        debug_reconnects: bool,
    ) -> Self {
        Self {
            negotiator,
            dialer,
            dial_timeout,
            debug_reconnects,
        }
    }

    /// Open session `ordinal`.
    pub(crate) async fn open(
        &self,
        ordinal: u64,
    ) -> Result<(ConnectionSession, Transport), ConnectError> {
        let mut endpoint = self.negotiator.negotiate().await?;
        if self.debug_reconnects {
            endpoint.url = with_debug_reconnects(&endpoint.url);
        }

        tracing::debug!(session = ordinal, "dialing negotiated endpoint");
        let transport = tokio::time::timeout(self.dial_timeout, self.dialer.dial(&endpoint.url))
            .await
            .map_err(|_| {
                ConnectError::Transient(format!("dial timed out after {:?}", self.dial_timeout))
            })??;

        let session = ConnectionSession {
            ordinal,
            opened_at: SystemTime::now(),
            endpoint,
        };
        Ok((session, transport))
    }
}

fn with_debug_reconnects(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}debug_reconnects=true")
}
