//! Echo Bot - slash command and mention handling over socket mode.
//!
//! This example demonstrates:
//! - Building a client with the fluent builder
//! - Replying to a slash command with a payload
//! - Observing lifecycle events on the event stream
//! - Shutting down cleanly on Ctrl-C
//!
//! # Running
//!
//! ```text
//! SOCKET_MODE_URL='wss://.../link?ticket=...' RUST_LOG=socketmode_client=debug,echo_bot=info \
//!     cargo run --example echo_bot
//! ```

use serde::Serialize;
use socketmode_client::{Client, Event, EventKind, EventPayload, StaticEndpoint};

/// Reply body for `/echo`.
#[derive(Serialize, Debug)]
struct EchoReply {
    response_type: &'static str,
    text: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let url = std::env::var("SOCKET_MODE_URL")?;

    let (client, mut events) = Client::builder()
        .on_slash_command("/echo", |event, ctx| async move {
            let text = match event.payload() {
                Some(EventPayload::SlashCommand(cmd)) => cmd.text.clone(),
                _ => String::new(),
            };
            ctx.reply(&EchoReply {
                response_type: "in_channel",
                text,
            })
        })
        .on_event_type("app_mention", |event, _ctx| async move {
            if let Some(EventPayload::EventsApi(callback)) = event.payload() {
                tracing::info!(fields = ?callback.event.fields, "mentioned");
            }
            Ok(())
        })
        .on(EventKind::InvalidAuth, |_event, _ctx| async {
            tracing::error!("the app token was rejected");
            Ok(())
        })
        .build(StaticEndpoint(url));

    let runner = client.clone();
    let run = tokio::spawn(async move { runner.run().await });

    let watcher = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                Event::Connected { session, .. } => tracing::info!(session, "connected"),
                Event::Disconnected {
                    session, reason, ..
                } => tracing::info!(session, ?reason, "disconnected"),
                Event::ConnectionError {
                    attempt, retry_in, ..
                } => tracing::info!(attempt, ?retry_in, "retrying"),
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            client.shutdown().await;
        }
        result = run => {
            watcher.abort();
            return Ok(result??);
        }
    }

    watcher.abort();
    Ok(())
}
