// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket Mode listener tests against a local websocket server.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use vigil_config::SlackConfig;
use vigil_slack::{SlackClient, SlackListener};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn listener_against(ws_url: String) -> (MockServer, SlackListener) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/apps.connections.open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "url": ws_url})))
        .mount(&server)
        .await;
    let client = SlackClient::new(&SlackConfig {
        bot_token: Some("xoxb-test".into()),
        app_token: Some("xapp-test".into()),
        api_base: server.uri(),
        retry_base_delay_ms: 1,
        ..SlackConfig::default()
    })
    .unwrap();
    (server, SlackListener::new(client, Duration::from_millis(20)))
}

fn message_envelope(envelope_id: &str, ts: &str, text: &str) -> String {
    json!({
        "envelope_id": envelope_id,
        "type": "events_api",
        "accepts_response_payload": false,
        "payload": {
            "type": "event_callback",
            "event": {
                "type": "message",
                "channel": "C1",
                "user": "U1",
                "text": text,
                "ts": ts
            }
        }
    })
    .to_string()
}

#[tokio::test]
async fn envelopes_are_acked_and_messages_forwarded() {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let (ack_tx, ack_rx) = oneshot::channel::<Value>();

    let ws_server = tokio::spawn(async move {
        let (stream, _) = tcp.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(WsMessage::Text(
            json!({"type": "hello", "num_connections": 1}).to_string().into(),
        ))
        .await
        .unwrap();
        ws.send(WsMessage::Text(
            message_envelope("env-42", "1772470800.000100", "is anyone there?").into(),
        ))
        .await
        .unwrap();

        while let Some(Ok(frame)) = ws.next().await {
            if let WsMessage::Text(text) = frame {
                let ack: Value = serde_json::from_str(text.as_str()).unwrap();
                let _ = ack_tx.send(ack);
                break;
            }
        }
        // Hold the socket open until the client leaves.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (_mock, listener) = listener_against(format!("ws://{addr}")).await;
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move { listener.run(tx, cancel).await }
    });

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.channel_id, "C1");
    assert_eq!(event.author_id.as_deref(), Some("U1"));
    assert_eq!(event.text.as_deref(), Some("is anyone there?"));

    let ack = tokio::time::timeout(Duration::from_secs(5), ack_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ack, json!({"envelope_id": "env-42"}));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap();
    let _ = tokio::time::timeout(Duration::from_secs(5), ws_server).await;
}

#[tokio::test]
async fn listener_reconnects_after_server_disconnect() {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();

    let ws_server = tokio::spawn(async move {
        // First session: ask the client to reconnect.
        let (stream, _) = tcp.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(WsMessage::Text(
            json!({"type": "disconnect", "reason": "refresh_requested"})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();

        // Second session: deliver one message.
        let (stream, _) = tcp.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(WsMessage::Text(
            message_envelope("env-2", "1772470900.000100", "second session").into(),
        ))
        .await
        .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (_mock, listener) = listener_against(format!("ws://{addr}")).await;
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move { listener.run(tx, cancel).await }
    });

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.text.as_deref(), Some("second session"));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap();
    let _ = tokio::time::timeout(Duration::from_secs(5), ws_server).await;
}

#[tokio::test]
async fn listener_stops_when_cancelled_before_connecting() {
    let (_mock, listener) = listener_against("ws://127.0.0.1:9".into()).await;
    let (tx, _rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), listener.run(tx, cancel))
        .await
        .unwrap();
}
