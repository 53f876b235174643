//! Frame receive loop.
//!
//! The receiver is the only reader of a session's transport. It forwards
//! every frame to the pump over a bounded channel so that a blocking read
//! never stalls writes or timers. It stops on the first fatal read error,
//! after a close frame, or as soon as the pump drops its end of the channel.

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::transport::FrameStream;

/// What the receive loop hands to the pump.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Inbound {
    /// A text or binary frame.
    Frame(Bytes),
    /// Ping or pong: the connection is alive.
    Liveness,
    /// The remote sent a close frame.
    Closed(Option<String>),
    /// Reading failed; the connection is unusable.
    Failed(String),
}

/// Spawn the receive loop for one session.
pub(crate) fn spawn_receiver(
    stream: FrameStream,
    inbound: mpsc::Sender<Inbound>,
    session: u64,
) -> JoinHandle<()> {
    tokio::spawn(receive_loop(stream, inbound, session))
}

async fn receive_loop(mut stream: FrameStream, inbound: mpsc::Sender<Inbound>, session: u64) {
    loop {
        let next = tokio::select! {
            _ = inbound.closed() => {
                tracing::debug!(session, "pump gone, receive loop exiting");
                return;
            }
            next = stream.next() => next,
        };

        let (item, last) = match next {
            Some(Ok(Message::Text(text))) => (Inbound::Frame(Bytes::from(text)), false),
            Some(Ok(Message::Binary(data))) => (Inbound::Frame(Bytes::from(data)), false),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => (Inbound::Liveness, false),
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| f.reason.into_owned())
                    .filter(|r| !r.is_empty());
                (Inbound::Closed(reason), true)
            }
            Some(Ok(Message::Frame(_))) => continue,
            Some(Err(e)) if is_benign(&e) => {
                tracing::warn!(session, "ignoring malformed frame: {}", e);
                continue;
            }
            Some(Err(e)) => (Inbound::Failed(e.to_string()), true),
            None => (Inbound::Failed("transport stream ended".to_string()), true),
        };

        if inbound.send(item).await.is_err() {
            tracing::debug!(session, "pump gone, receive loop exiting");
            return;
        }
        if last {
            return;
        }
    }
}

/// Read errors that spoil one frame but not the connection.
fn is_benign(err: &WsError) -> bool {
    matches!(err, WsError::Utf8 | WsError::Capacity(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tokio_tungstenite::tungstenite::error::CapacityError;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    fn scripted(items: Vec<Result<Message, WsError>>) -> FrameStream {
        Box::pin(stream::iter(items).chain(stream::pending()))
    }

    async fn collect(items: Vec<Result<Message, WsError>>) -> Vec<Inbound> {
        let (tx, mut rx) = mpsc::channel(16);
        let task = spawn_receiver(scripted(items), tx, 1);
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            let stop = matches!(item, Inbound::Closed(_) | Inbound::Failed(_));
            out.push(item);
            if stop {
                break;
            }
        }
        task.await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_forwards_frames_and_liveness() {
        let out = collect(vec![
            Ok(Message::Text("{\"type\":\"hello\"}".into())),
            Ok(Message::Ping(vec![1])),
            Ok(Message::Close(None)),
        ])
        .await;

        assert_eq!(
            out,
            vec![
                Inbound::Frame(Bytes::from_static(b"{\"type\":\"hello\"}")),
                Inbound::Liveness,
                Inbound::Closed(None),
            ]
        );
    }

    #[tokio::test]
    async fn test_close_reason_is_kept() {
        let out = collect(vec![Ok(Message::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "going away".into(),
        })))])
        .await;

        assert_eq!(out, vec![Inbound::Closed(Some("going away".into()))]);
    }

    #[tokio::test]
    async fn test_benign_error_is_skipped() {
        let out = collect(vec![
            Err(WsError::Utf8),
            Err(WsError::Capacity(CapacityError::MessageTooLong {
                size: 10,
                max_size: 1,
            })),
            Ok(Message::Text("after".into())),
            Err(WsError::ConnectionClosed),
        ])
        .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Inbound::Frame(Bytes::from_static(b"after")));
        assert!(matches!(out[1], Inbound::Failed(_)));
    }

    #[tokio::test]
    async fn test_stream_end_is_fatal() {
        let (tx, mut rx) = mpsc::channel(4);
        let task = spawn_receiver(Box::pin(stream::empty()), tx, 1);

        assert!(matches!(rx.recv().await, Some(Inbound::Failed(_))));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_exits_when_pump_drops_channel() {
        let (tx, rx) = mpsc::channel(4);
        let task = spawn_receiver(Box::pin(stream::pending()), tx, 1);

        drop(rx);
        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .expect("receiver did not exit")
            .unwrap();
    }
}
