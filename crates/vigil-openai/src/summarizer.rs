// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily channel summarizer backed by a chat-completions model.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};
use vigil_core::{
    AdapterType, AuthorRole, ChannelRef, HealthStatus, HistoryMessage, HistorySource,
    IdentityResolver, PluginAdapter, Summarizer, VigilError,
};
use vigil_directory::ChannelDirectory;

use crate::client::OpenAiClient;
use crate::prompts::SUMMARIZER_PROMPT;
use crate::types::ChatRequest;

const SUMMARY_TEMPERATURE: f32 = 0.2;

/// Summarizes the last day of a channel's history.
pub struct OpenAiSummarizer {
    client: OpenAiClient,
    model: String,
    history: Arc<dyn HistorySource>,
    identity: Arc<dyn IdentityResolver>,
    directory: Arc<ChannelDirectory>,
    timezone: Tz,
    window: TimeDelta,
}

impl OpenAiSummarizer {
    pub fn new(
        client: OpenAiClient,
        model: impl Into<String>,
        history: Arc<dyn HistorySource>,
        identity: Arc<dyn IdentityResolver>,
        directory: Arc<ChannelDirectory>,
        timezone: Tz,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            history,
            identity,
            directory,
            timezone,
            window: TimeDelta::hours(24),
        }
    }

    /// Formats history as `9:42 AM - Client: text` lines, oldest first.
    ///
    /// Bot messages and messages without an author or text are skipped.
    /// Roles are looked up once per author for the duration of the call.
    pub async fn render_history(&self, channel_name: &str, messages: &[HistoryMessage]) -> String {
        let mut roles: HashMap<String, AuthorRole> = HashMap::new();
        let mut lines = Vec::new();

        for message in messages {
            if message.is_bot {
                continue;
            }
            let (Some(author_id), Some(text)) = (message.author_id.as_deref(), message.text.as_deref())
            else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }

            let role = match roles.get(author_id).copied() {
                Some(role) => role,
                None => {
                    let role = self.resolve_role(author_id, channel_name).await;
                    if let Some(role) = role {
                        roles.insert(author_id.to_string(), role);
                    }
                    role.unwrap_or(AuthorRole::Unknown)
                }
            };

            let time = format_local_time(&message.sequence_ts, self.timezone);
            lines.push(format!("{time} - {}: {text}", role_label(role)));
        }

        lines.join("\n")
    }

    /// `None` when the author's email cannot be fetched; not cached.
    async fn resolve_role(&self, author_id: &str, channel_name: &str) -> Option<AuthorRole> {
        match self.identity.user_email(author_id).await {
            Ok(Some(email)) => Some(self.directory.resolve_role(&email, channel_name)),
            Ok(None) => None,
            Err(e) => {
                warn!(author_id, error = %e, "email lookup failed while summarizing");
                None
            }
        }
    }
}

fn role_label(role: AuthorRole) -> &'static str {
    match role {
        AuthorRole::Internal => "Internal",
        AuthorRole::Client => "Client",
        AuthorRole::Unknown => "Unknown",
    }
}

/// Renders a platform timestamp (`seconds.micros`) as a 12-hour local time.
///
/// Unparseable timestamps are shown verbatim.
pub fn format_local_time(sequence_ts: &str, tz: Tz) -> String {
    parse_sequence_ts(sequence_ts)
        .map(|at| at.with_timezone(&tz).format("%-I:%M %p").to_string())
        .unwrap_or_else(|| sequence_ts.to_string())
}

fn parse_sequence_ts(sequence_ts: &str) -> Option<DateTime<Utc>> {
    let (secs, frac) = sequence_ts.split_once('.').unwrap_or((sequence_ts, "0"));
    let secs: i64 = secs.parse().ok()?;
    let micros: u32 = format!("{frac:0<6}").get(..6)?.parse().ok()?;
    DateTime::from_timestamp(secs, micros * 1_000)
}

#[async_trait]
impl PluginAdapter for OpenAiSummarizer {
    fn name(&self) -> &str {
        "openai-summarizer"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Summarizer
    }

    async fn health_check(&self) -> Result<HealthStatus, VigilError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, channel: &ChannelRef) -> Result<Option<String>, VigilError> {
        let since = Utc::now() - self.window;
        let messages = self.history.history(&channel.id, since).await?;
        if messages.is_empty() {
            info!(channel = %channel.name, "no messages in the last day, skipping summary");
            return Ok(None);
        }

        let dialogue = self.render_history(&channel.name, &messages).await;
        if dialogue.is_empty() {
            info!(channel = %channel.name, "nothing summarizable after filtering");
            return Ok(None);
        }

        debug!(channel = %channel.name, messages = messages.len(), model = %self.model, "requesting daily summary");
        let request = ChatRequest::new(&self.model, SUMMARIZER_PROMPT, dialogue, SUMMARY_TEMPERATURE);
        let summary = self.client.complete(&request).await?;
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(VigilError::MalformedResponse {
                message: "summarizer returned an empty summary".into(),
            });
        }
        Ok(Some(summary.to_string()))
    }
}
