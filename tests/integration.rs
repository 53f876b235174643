//! Integration tests for the acknowledgment protocol.
//!
//! These tests run a full client against the in-memory endpoint and check
//! what actually goes over the wire.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use socketmode_client::{Client, ClientBuilder, Event, EventKind, EventPayload};

use common::*;

const QUIET: Duration = Duration::from_millis(200);

fn builder() -> ClientBuilder {
    Client::builder()
        .keepalive_interval(None)
        .backoff(Duration::from_millis(10), Duration::from_millis(100), Duration::ZERO)
}

fn app_mention(envelope_id: &str) -> serde_json::Value {
    json!({
        "envelope_id": envelope_id,
        "type": "events_api",
        "accepts_response_payload": false,
        "retry_attempt": 0,
        "retry_reason": "",
        "payload": {
            "team_id": "T1",
            "api_app_id": "A1",
            "event_id": "Ev1",
            "type": "event_callback",
            "event": {"type": "app_mention", "text": "<@U1> hi", "user": "U2"}
        }
    })
}

/// No handler for the envelope: exactly one empty ack.
#[tokio::test]
async fn test_unhandled_envelope_gets_single_empty_ack() {
    init_tracing();
    let (mut endpoint, negotiator, dialer) = mock_endpoint(vec![]);
    let (client, mut events) = builder().dialer(dialer).build(negotiator);
    let runner = client.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let mut server = endpoint.accept().await;
    send_json(&mut server, json!({"type": "hello", "num_connections": 1})).await;
    send_json(&mut server, app_mention("E1")).await;

    assert_eq!(next_json(&mut server).await, json!({"envelope_id": "E1"}));
    assert_eq!(next_text(&mut server, QUIET).await, None);

    let event = wait_for_event(&mut events, |e| e.kind() == EventKind::EventsApi).await;
    assert_eq!(event.envelope_id(), Some("E1"));

    client.shutdown().await;
    task.await.unwrap().unwrap();
}

/// A handler reply replaces the default ack.
#[tokio::test]
async fn test_handler_reply_is_the_only_reply() {
    init_tracing();
    let (mut endpoint, negotiator, dialer) = mock_endpoint(vec![]);
    let (client, _events) = builder()
        .dialer(dialer)
        .on_event_type("app_mention", |_event, ctx| async move {
            ctx.reply(&json!({"ok": true}))
        })
        .build(negotiator);
    let runner = client.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let mut server = endpoint.accept().await;
    send_json(&mut server, app_mention("E2")).await;

    assert_eq!(
        next_json(&mut server).await,
        json!({"envelope_id": "E2", "payload": {"ok": true}})
    );
    assert_eq!(next_text(&mut server, QUIET).await, None);

    client.shutdown().await;
    task.await.unwrap().unwrap();
}

/// Several handlers match; the envelope is still answered once, after all
/// of them finish.
#[tokio::test]
async fn test_multiple_handlers_share_one_ack() {
    let (mut endpoint, negotiator, dialer) = mock_endpoint(vec![]);
    let finished = Arc::new(AtomicUsize::new(0));
    let slow = finished.clone();
    let fast = finished.clone();
    let (client, _events) = builder()
        .dialer(dialer)
        .on(EventKind::EventsApi, move |_event, _ctx| {
            let slow = slow.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                slow.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .on_event_type("app_mention", move |_event, _ctx| {
            let fast = fast.clone();
            async move {
                fast.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .build(negotiator);
    let runner = client.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let mut server = endpoint.accept().await;
    send_json(&mut server, app_mention("E3")).await;

    assert_eq!(next_json(&mut server).await, json!({"envelope_id": "E3"}));
    assert_eq!(finished.load(Ordering::SeqCst), 2);
    assert_eq!(next_text(&mut server, QUIET).await, None);

    client.shutdown().await;
    task.await.unwrap().unwrap();
}

/// A handler can hand the envelope to `Client::reply` while it runs.
#[tokio::test]
async fn test_client_reply_while_handler_runs() {
    let (mut endpoint, negotiator, dialer) = mock_endpoint(vec![]);
    let (client, mut events) = builder()
        .dialer(dialer)
        .on_slash_command("/deploy", |_event, _ctx| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        })
        .build(negotiator);
    let runner = client.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let mut server = endpoint.accept().await;
    send_json(
        &mut server,
        json!({
            "envelope_id": "E4",
            "type": "slash_commands",
            "accepts_response_payload": true,
            "payload": {"command": "/deploy", "text": "prod"}
        }),
    )
    .await;

    let event = wait_for_event(&mut events, |e| e.kind() == EventKind::SlashCommand).await;
    match &event {
        Event::Payload {
            payload: EventPayload::SlashCommand(cmd),
            accepts_response_payload,
            ..
        } => {
            assert_eq!(cmd.text, "prod");
            assert!(*accepts_response_payload);
        }
        other => panic!("unexpected event {other:?}"),
    }
    client
        .reply("E4", Some(json!({"text": "deploying"})))
        .unwrap();
    assert!(client.reply("E4", None).is_err());

    assert_eq!(
        next_json(&mut server).await,
        json!({"envelope_id": "E4", "payload": {"text": "deploying"}})
    );
    assert_eq!(next_text(&mut server, QUIET).await, None);

    client.shutdown().await;
    task.await.unwrap().unwrap();
}

/// A panicking handler is contained and the envelope is still acked.
#[tokio::test]
async fn test_panicking_handler_still_acks() {
    let (mut endpoint, negotiator, dialer) = mock_endpoint(vec![]);
    let (client, _events) = builder()
        .dialer(dialer)
        .on_block_action("approve", |_event, _ctx| async move {
            if true {
                panic!("handler bug");
            }
            Ok(())
        })
        .build(negotiator);
    let runner = client.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let mut server = endpoint.accept().await;
    send_json(
        &mut server,
        json!({
            "envelope_id": "E5",
            "type": "interactive",
            "payload": {
                "type": "block_actions",
                "actions": [{"action_id": "approve", "block_id": "b1", "type": "button"}]
            }
        }),
    )
    .await;

    assert_eq!(next_json(&mut server).await, json!({"envelope_id": "E5"}));

    client.shutdown().await;
    task.await.unwrap().unwrap();
}

/// Undecodable payloads are reported and acked; unknown kinds are not.
#[tokio::test]
async fn test_bad_payload_and_unknown_kind() {
    let (mut endpoint, negotiator, dialer) = mock_endpoint(vec![]);
    let (client, mut events) = builder().dialer(dialer).build(negotiator);
    let runner = client.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let mut server = endpoint.accept().await;
    send_json(&mut server, json!({"envelope_id": "X1", "type": "mystery"})).await;
    send_json(
        &mut server,
        json!({"envelope_id": "E6", "type": "events_api", "payload": {"no_event": true}}),
    )
    .await;

    assert_eq!(next_json(&mut server).await, json!({"envelope_id": "E6"}));
    assert_eq!(next_text(&mut server, QUIET).await, None);

    let unhandled = wait_for_event(&mut events, |e| e.kind() == EventKind::Unhandled).await;
    assert!(matches!(unhandled, Event::Unhandled { ref wire_type, .. } if wire_type == "mystery"));
    let error = wait_for_event(&mut events, |e| e.kind() == EventKind::UnmarshallingError).await;
    assert!(matches!(
        error,
        Event::UnmarshallingError { envelope_id: Some(ref id), .. } if id == "E6"
    ));

    client.shutdown().await;
    task.await.unwrap().unwrap();
}
