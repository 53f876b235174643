//! WebSocket transport.
//!
//! A [`Transport`] is the two halves of one WebSocket connection: the sink
//! owned by the pump (sole writer) and the stream owned by the receive loop
//! (sole reader). Pings from the remote are answered by tungstenite itself
//! while the stream is being read; a close frame ends the stream.
//!
//! # Example
//!
//! ```ignore
//! use socketmode_client::transport::{Dialer, WsDialer};
//!
//! let transport = WsDialer.dial("wss://example.invalid/link?ticket=abc").await?;
//! let (sink, stream) = transport.into_split();
//! ```

use std::pin::Pin;
use std::time::Duration;

use futures_util::{Sink, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;

use crate::error::ConnectError;
use crate::handler::BoxFuture;

/// Retry-after used when a 429 response carries no usable header.
pub const DEFAULT_RATE_LIMIT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Write half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;

/// Read half of a connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Message, WsError>> + Send>>;

/// An open WebSocket connection, split into its halves.
pub struct Transport {
    sink: FrameSink,
    stream: FrameStream,
}

impl Transport {
    /// Wrap an established WebSocket stream.
    pub fn from_websocket<S>(ws: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }

    /// Build from arbitrary halves.
    pub fn from_parts(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }

    /// Split into write and read halves.
    pub fn into_split(self) -> (FrameSink, FrameStream) {
        (self.sink, self.stream)
    }
}

/// Performs the transport handshake against a negotiated URL.
pub trait Dialer: Send + Sync + 'static {
    /// Open a connection to `url`.
    fn dial<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Transport, ConnectError>>;
}

/// Dialer using `tokio-tungstenite` over TCP/TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsDialer;

impl Dialer for WsDialer {
    fn dial<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Transport, ConnectError>> {
        Box::pin(async move {
            let (ws, response) = tokio_tungstenite::connect_async(url)
                .await
                .map_err(classify_dial_error)?;
            tracing::debug!(status = %response.status(), "websocket handshake complete");
            Ok(Transport::from_websocket(ws))
        })
    }
}

/// Map a handshake failure onto the retry taxonomy.
pub fn classify_dial_error(err: WsError) -> ConnectError {
    match err {
        WsError::Http(response) => {
            let status = response.status();
            match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ConnectError::Unauthenticated(format!("handshake rejected with {status}"))
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_retry_after)
                        .unwrap_or(DEFAULT_RATE_LIMIT_RETRY_AFTER);
                    ConnectError::RateLimited { retry_after }
                }
                _ => ConnectError::Transient(format!("handshake failed with {status}")),
            }
        }
        other => ConnectError::transient(other),
    }
}

/// Parse a `Retry-After` header given in seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::http::Response;

    fn http_error(status: u16, retry_after: Option<&str>) -> WsError {
        let mut builder = Response::builder().status(status);
        if let Some(value) = retry_after {
            builder = builder.header("retry-after", value);
        }
        WsError::Http(builder.body(None).unwrap())
    }

    #[test]
    fn test_classify_unauthorized() {
        assert!(classify_dial_error(http_error(401, None)).is_fatal());
        assert!(classify_dial_error(http_error(403, None)).is_fatal());
    }

    #[test]
    fn test_classify_rate_limited() {
        let err = classify_dial_error(http_error(429, Some("12")));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));

        let err = classify_dial_error(http_error(429, None));
        assert_eq!(err.retry_after(), Some(DEFAULT_RATE_LIMIT_RETRY_AFTER));
    }

    #[test]
    fn test_classify_transient() {
        let err = classify_dial_error(http_error(503, None));
        assert!(matches!(err, ConnectError::Transient(_)));

        let err = classify_dial_error(WsError::ConnectionClosed);
        assert!(matches!(err, ConnectError::Transient(_)));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(" 30 "), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[tokio::test]
    async fn test_transport_over_duplex() {
        use futures_util::SinkExt;
        use tokio_tungstenite::tungstenite::protocol::Role;

        let (client_io, server_io) = tokio::io::duplex(4096);
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let mut server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;

        let (mut sink, _stream) = Transport::from_websocket(client).into_split();
        sink.send(Message::Text("hi".into())).await.unwrap();

        let received = server.next().await.unwrap().unwrap();
        assert_eq!(received, Message::Text("hi".into()));
    }
}
