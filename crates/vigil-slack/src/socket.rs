// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket Mode listener.
//!
//! Holds one websocket session open at a time, acknowledges every envelope,
//! and forwards normalized message events over an `mpsc` channel. Any
//! session error leads to a reconnect after the configured delay.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vigil_core::{GatewayEvent, VigilError};

use crate::client::SlackClient;
use crate::events::{SocketAction, interpret, parse_socket_envelope};

/// How a websocket session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Cancellation was requested or the event receiver is gone.
    Stop,
    /// The server closed the socket or asked for a reconnect.
    Reconnect,
}

/// Receives message events from Slack over Socket Mode.
#[derive(Debug, Clone)]
pub struct SlackListener {
    client: SlackClient,
    reconnect_delay: Duration,
}

impl SlackListener {
    pub fn new(client: SlackClient, reconnect_delay: Duration) -> Self {
        Self {
            client,
            reconnect_delay,
        }
    }

    /// Runs sessions until `cancel` fires or `events` is closed.
    pub async fn run(&self, events: mpsc::Sender<GatewayEvent>, cancel: CancellationToken) {
        info!("slack socket mode listener starting");
        loop {
            match self.run_session(&events, &cancel).await {
                Ok(SessionEnd::Stop) => break,
                Ok(SessionEnd::Reconnect) => {
                    info!("slack socket session ended, reconnecting");
                }
                Err(e) => {
                    warn!(error = %e, "slack socket session failed");
                }
            }
            if events.is_closed() {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
        info!("slack socket mode listener stopped");
    }

    async fn run_session(
        &self,
        events: &mpsc::Sender<GatewayEvent>,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd, VigilError> {
        let url = tokio::select! {
            _ = cancel.cancelled() => return Ok(SessionEnd::Stop),
            url = self.client.open_socket_connection() => url?,
        };
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| VigilError::Gateway {
                message: format!("failed to connect slack socket mode websocket: {e}"),
                source: Some(Box::new(e)),
            })?;
        let (mut sink, mut source) = stream.split();
        info!("slack socket session connected");

        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return Ok(SessionEnd::Stop);
                }
                frame = source.next() => frame,
            };
            let Some(frame) = frame else {
                return Ok(SessionEnd::Reconnect);
            };
            let frame = frame.map_err(|e| VigilError::Gateway {
                message: format!("failed reading slack websocket frame: {e}"),
                source: Some(Box::new(e)),
            })?;
            if matches!(frame, WsMessage::Close(_)) {
                return Ok(SessionEnd::Reconnect);
            }

            let envelope = match parse_socket_envelope(&frame) {
                Ok(Some(envelope)) => envelope,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, "dropping unreadable slack socket frame");
                    continue;
                }
            };

            if let Some(envelope_id) = envelope.envelope_id.as_deref() {
                let ack = json!({ "envelope_id": envelope_id }).to_string();
                sink.send(WsMessage::Text(ack.into()))
                    .await
                    .map_err(|e| VigilError::Gateway {
                        message: format!("failed to ack slack envelope: {e}"),
                        source: Some(Box::new(e)),
                    })?;
            }

            match interpret(&envelope) {
                SocketAction::Forward(event) => {
                    debug!(
                        channel_id = %event.channel_id,
                        sequence_ts = %event.sequence_ts,
                        "slack message event received"
                    );
                    if events.send(event).await.is_err() {
                        return Ok(SessionEnd::Stop);
                    }
                }
                SocketAction::Reconnect(reason) => {
                    info!(reason = %reason, "slack requested socket reconnect");
                    return Ok(SessionEnd::Reconnect);
                }
                SocketAction::Ignore => {}
            }
        }
    }
}
