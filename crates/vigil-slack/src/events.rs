// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket Mode envelope parsing and message event normalization.

use serde::Deserialize;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use vigil_core::{GatewayEvent, VigilError};

/// Message subtypes that carry a real user message.
///
/// Everything else (joins, topic changes, deletions) is platform noise.
const USER_SUBTYPES: &[&str] = &["message_changed", "thread_broadcast", "file_share", "me_message"];

/// One Socket Mode frame.
#[derive(Debug, Clone, Deserialize)]
pub struct SocketEnvelope {
    /// Absent on `hello` and `disconnect` frames, which need no ack.
    #[serde(default)]
    pub envelope_id: Option<String>,
    #[serde(rename = "type")]
    pub envelope_type: String,
    #[serde(default)]
    pub payload: Value,
    /// Set on `disconnect` frames.
    #[serde(default)]
    pub reason: Option<String>,
}

/// What the listener should do with a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketAction {
    /// Forward a normalized message to the engine.
    Forward(GatewayEvent),
    /// Slack asked us to reconnect.
    Reconnect(String),
    /// Nothing to do.
    Ignore,
}

/// Decodes a websocket frame into an envelope.
///
/// Control frames (ping, pong, close) decode to `None`.
pub fn parse_socket_envelope(message: &WsMessage) -> Result<Option<SocketEnvelope>, VigilError> {
    let text = match message {
        WsMessage::Text(text) => text.as_str(),
        WsMessage::Binary(bytes) => std::str::from_utf8(bytes).map_err(|e| {
            VigilError::MalformedResponse {
                message: format!("invalid utf-8 slack socket payload: {e}"),
            }
        })?,
        _ => return Ok(None),
    };
    serde_json::from_str::<SocketEnvelope>(text)
        .map(Some)
        .map_err(|e| VigilError::MalformedResponse {
            message: format!("failed to parse slack socket envelope: {e}"),
        })
}

/// Decides what a decoded envelope means for the listener.
pub fn interpret(envelope: &SocketEnvelope) -> SocketAction {
    match envelope.envelope_type.as_str() {
        "disconnect" => SocketAction::Reconnect(
            envelope
                .reason
                .clone()
                .unwrap_or_else(|| "unspecified".to_string()),
        ),
        "events_api" => {
            let Some(event) = envelope.payload.get("event") else {
                return SocketAction::Ignore;
            };
            match normalize_message_event(event) {
                Some(event) => SocketAction::Forward(event),
                None => SocketAction::Ignore,
            }
        }
        _ => SocketAction::Ignore,
    }
}

/// Converts a Slack `message` event into a [`GatewayEvent`].
///
/// Edits arrive as `message_changed` with the new content nested under
/// `message`; the nested content wins, the channel stays top-level. Bot
/// messages, system subtypes and messages without a user yield `None`.
pub fn normalize_message_event(event: &Value) -> Option<GatewayEvent> {
    if str_field(event, "type") != Some("message") {
        return None;
    }
    if let Some(subtype) = str_field(event, "subtype")
        && !USER_SUBTYPES.contains(&subtype)
    {
        return None;
    }

    let content = event.get("message").unwrap_or(event);
    if event.get("bot_id").is_some() || content.get("bot_id").is_some() {
        return None;
    }

    let channel_id = str_field(event, "channel")?;
    let author_id = str_field(content, "user")?;
    let sequence_ts = str_field(content, "ts")?;

    Some(GatewayEvent {
        channel_id: channel_id.to_string(),
        author_id: Some(author_id.to_string()),
        text: str_field(content, "text").map(str::to_string),
        sequence_ts: sequence_ts.to_string(),
        dedup_key: str_field(content, "client_msg_id").map(str::to_string),
    })
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}
