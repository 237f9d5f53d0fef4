// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Slack Web API.
//!
//! Provides [`SlackClient`], which posts alerts, resolves permalinks and
//! identities, reads channel history, and opens Socket Mode connections.
//! Every call goes through one retry loop that honours `Retry-After` and
//! turns `ok: false` bodies into [`VigilError::Gateway`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};
use vigil_config::SlackConfig;
use vigil_core::{
    AdapterType, AlertPoster, HealthStatus, HistoryMessage, HistorySource, IdentityResolver,
    PermalinkResolver, PluginAdapter, VigilError,
};

use crate::retry::{
    is_retryable_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};
use crate::types::{
    ApiResponse, AuthTestResponse, ConnectionsOpenResponse, ConversationHistoryResponse,
    ConversationInfoResponse, ConversationListResponse, HistoryEntry, PermalinkResponse,
    PostMessageResponse, UserInfoResponse,
};

/// Page size for paginated `conversations.*` calls.
const PAGE_LIMIT: &str = "200";

/// Slack error codes that mean "no such thing" rather than a failed call.
const NOT_FOUND_ERRORS: &[&str] = &["channel_not_found", "user_not_found", "message_not_found"];

/// Slack Web API client bound to one workspace's bot and app tokens.
///
/// Cheap to clone; the channel id cache is shared between clones.
#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    app_token: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
    channel_ids: Arc<DashMap<String, String>>,
}

impl SlackClient {
    /// Builds a client from the `[slack]` configuration section.
    ///
    /// Both tokens are required.
    pub fn new(config: &SlackConfig) -> Result<Self, VigilError> {
        let bot_token = required_secret(config.bot_token.as_deref(), "slack.bot_token")?;
        let app_token = required_secret(config.app_token.as_deref(), "slack.app_token")?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("vigil-slack"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(|e| VigilError::Gateway {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token,
            app_token,
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms,
            channel_ids: Arc::new(DashMap::new()),
        })
    }

    /// Verifies the bot token (`auth.test`).
    pub async fn auth_test(&self) -> Result<AuthTestResponse, VigilError> {
        let url = self.method_url("auth.test", &[])?;
        self.call("auth.test", || {
            self.http.post(url.clone()).bearer_auth(&self.bot_token)
        })
        .await
    }

    /// Posts `text` to the channel called `channel` (`chat.postMessage`).
    ///
    /// Returns the timestamp of the posted message.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<String, VigilError> {
        let url = self.method_url("chat.postMessage", &[])?;
        let payload = json!({
            "channel": destination(channel),
            "text": text,
        });
        let response: PostMessageResponse = self
            .call("chat.postMessage", || {
                self.http
                    .post(url.clone())
                    .bearer_auth(&self.bot_token)
                    .json(&payload)
            })
            .await?;
        debug!(channel, "posted slack message");
        Ok(response.ts.unwrap_or_default())
    }

    /// Resolves a link to one message (`chat.getPermalink`).
    pub async fn permalink(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<Option<String>, VigilError> {
        let url = self.method_url(
            "chat.getPermalink",
            &[("channel", channel_id), ("message_ts", message_ts)],
        )?;
        let response: Option<PermalinkResponse> = self
            .call_optional("chat.getPermalink", || {
                self.http.get(url.clone()).bearer_auth(&self.bot_token)
            })
            .await?;
        Ok(response.and_then(|r| r.permalink))
    }

    /// Looks up a channel's name by id (`conversations.info`).
    pub async fn channel_name(&self, channel_id: &str) -> Result<Option<String>, VigilError> {
        let url = self.method_url("conversations.info", &[("channel", channel_id)])?;
        let response: Option<ConversationInfoResponse> = self
            .call_optional("conversations.info", || {
                self.http.get(url.clone()).bearer_auth(&self.bot_token)
            })
            .await?;
        Ok(response.and_then(|r| r.channel).and_then(|c| c.name))
    }

    /// Looks up a user's email address (`users.info`).
    pub async fn user_email(&self, user_id: &str) -> Result<Option<String>, VigilError> {
        let url = self.method_url("users.info", &[("user", user_id)])?;
        let response: Option<UserInfoResponse> = self
            .call_optional("users.info", || {
                self.http.get(url.clone()).bearer_auth(&self.bot_token)
            })
            .await?;
        Ok(response
            .and_then(|r| r.user)
            .and_then(|u| u.profile)
            .and_then(|p| p.email)
            .filter(|e| !e.trim().is_empty()))
    }

    /// Finds a channel id by name across public and private channels.
    ///
    /// Every page walked populates the cache, so later lookups for any
    /// channel seen on the way are answered locally.
    pub async fn find_channel_id(&self, name: &str) -> Result<Option<String>, VigilError> {
        let name = name.trim_start_matches('#');
        if let Some(id) = self.channel_ids.get(name) {
            return Ok(Some(id.clone()));
        }

        let mut cursor: Option<String> = None;
        loop {
            let mut params = vec![
                ("types", "public_channel,private_channel"),
                ("exclude_archived", "true"),
                ("limit", PAGE_LIMIT),
            ];
            if let Some(cursor) = cursor.as_deref() {
                params.push(("cursor", cursor));
            }
            let url = self.method_url("conversations.list", &params)?;
            let page: ConversationListResponse = self
                .call("conversations.list", || {
                    self.http.get(url.clone()).bearer_auth(&self.bot_token)
                })
                .await?;

            for channel in page.channels {
                if let Some(channel_name) = channel.name {
                    self.channel_ids.insert(channel_name, channel.id);
                }
            }
            if let Some(id) = self.channel_ids.get(name) {
                return Ok(Some(id.clone()));
            }

            match page.response_metadata.as_ref().and_then(|m| m.cursor()) {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        warn!(channel = name, "channel not found in conversations.list");
        Ok(None)
    }

    /// Messages posted in `channel_id` after `oldest`, oldest first
    /// (`conversations.history`).
    pub async fn channel_history(
        &self,
        channel_id: &str,
        oldest: DateTime<Utc>,
    ) -> Result<Vec<HistoryMessage>, VigilError> {
        let oldest = format!(
            "{}.{:06}",
            oldest.timestamp(),
            oldest.timestamp_subsec_micros()
        );
        let mut entries: Vec<HistoryEntry> = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut params = vec![
                ("channel", channel_id),
                ("oldest", oldest.as_str()),
                ("limit", PAGE_LIMIT),
            ];
            if let Some(cursor) = cursor.as_deref() {
                params.push(("cursor", cursor));
            }
            let url = self.method_url("conversations.history", &params)?;
            let page: ConversationHistoryResponse = self
                .call("conversations.history", || {
                    self.http.get(url.clone()).bearer_auth(&self.bot_token)
                })
                .await?;
            entries.extend(page.messages);

            let next = page
                .response_metadata
                .as_ref()
                .and_then(|m| m.cursor())
                .map(str::to_string);
            match next {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        // The API pages newest first.
        entries.reverse();
        Ok(entries
            .into_iter()
            .map(|entry| HistoryMessage {
                is_bot: entry.bot_id.is_some() || entry.subtype.as_deref() == Some("bot_message"),
                author_id: entry.user,
                text: entry.text,
                sequence_ts: entry.ts,
            })
            .collect())
    }

    /// Requests a Socket Mode websocket URL (`apps.connections.open`).
    pub async fn open_socket_connection(&self) -> Result<String, VigilError> {
        let url = self.method_url("apps.connections.open", &[])?;
        let response: ConnectionsOpenResponse = self
            .call("apps.connections.open", || {
                self.http.post(url.clone()).bearer_auth(&self.app_token)
            })
            .await?;
        response
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| VigilError::gateway("apps.connections.open returned no url"))
    }

    fn method_url(&self, method: &str, params: &[(&str, &str)]) -> Result<Url, VigilError> {
        let raw = format!("{}/{method}", self.api_base);
        let parsed = if params.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, params)
        };
        parsed.map_err(|e| VigilError::Config(format!("invalid slack api url {raw}: {e}")))
    }

    /// Like [`Self::call`], but a not-found error code yields `Ok(None)`.
    async fn call_optional<T, F>(&self, operation: &str, builder: F) -> Result<Option<T>, VigilError>
    where
        T: DeserializeOwned + ApiResponse,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response: T = self.request_json(operation, builder).await?;
        if response.ok() {
            return Ok(Some(response));
        }
        match response.error() {
            Some(code) if NOT_FOUND_ERRORS.contains(&code) => {
                debug!(operation, code, "slack lookup found nothing");
                Ok(None)
            }
            code => Err(api_error(operation, code)),
        }
    }

    /// Sends a request and requires an `ok: true` body.
    async fn call<T, F>(&self, operation: &str, builder: F) -> Result<T, VigilError>
    where
        T: DeserializeOwned + ApiResponse,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response: T = self.request_json(operation, builder).await?;
        if !response.ok() {
            return Err(api_error(operation, response.error()));
        }
        Ok(response)
    }

    async fn request_json<T, F>(&self, operation: &str, mut builder: F) -> Result<T, VigilError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            match builder().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<T>().await.map_err(|e| {
                            VigilError::MalformedResponse {
                                message: format!("failed to decode slack {operation}: {e}"),
                            }
                        });
                    }

                    let retry_after = parse_retry_after(response.headers());
                    if attempt < self.retry_max_attempts && is_retryable_status(status.as_u16()) {
                        let delay = retry_delay(self.retry_base_delay_ms, attempt, retry_after);
                        warn!(
                            operation,
                            status = status.as_u16(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "slack api call failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let body = response.text().await.unwrap_or_default();
                    return Err(status_error(operation, status, &body));
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        let delay = retry_delay(self.retry_base_delay_ms, attempt, None);
                        warn!(operation, attempt, error = %error, "slack api transport error, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(VigilError::Gateway {
                        message: format!("slack api {operation} request failed: {error}"),
                        source: Some(Box::new(error)),
                    });
                }
            }
        }
    }
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("api_base", &self.api_base)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("cached_channels", &self.channel_ids.len())
            .finish_non_exhaustive()
    }
}

fn required_secret(value: Option<&str>, key: &str) -> Result<String, VigilError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| VigilError::Config(format!("{key} is required")))
}

/// Channel argument for `chat.postMessage`.
fn destination(channel: &str) -> String {
    if channel.starts_with('#') {
        channel.to_string()
    } else {
        format!("#{channel}")
    }
}

fn api_error(operation: &str, code: Option<&str>) -> VigilError {
    VigilError::gateway(format!(
        "slack {operation} failed: {}",
        code.unwrap_or("unknown_error")
    ))
}

fn status_error(operation: &str, status: StatusCode, body: &str) -> VigilError {
    VigilError::gateway(format!(
        "slack api {operation} failed with status {}: {}",
        status.as_u16(),
        truncate_for_error(body, 800)
    ))
}

#[async_trait]
impl PluginAdapter for SlackClient {
    fn name(&self) -> &str {
        "slack"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Gateway
    }

    async fn health_check(&self) -> Result<HealthStatus, VigilError> {
        match self.auth_test().await {
            Ok(identity) => {
                info!(
                    bot_user = identity.user_id.as_deref().unwrap_or("unknown"),
                    team = identity.team.as_deref().unwrap_or("unknown"),
                    "slack token verified"
                );
                Ok(HealthStatus::Healthy)
            }
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }
}

#[async_trait]
impl AlertPoster for SlackClient {
    async fn post(&self, destination: &str, text: &str) -> Result<(), VigilError> {
        self.post_message(destination, text).await.map(|_| ())
    }
}

#[async_trait]
impl PermalinkResolver for SlackClient {
    async fn permalink(
        &self,
        channel_id: &str,
        sequence_ts: &str,
    ) -> Result<Option<String>, VigilError> {
        SlackClient::permalink(self, channel_id, sequence_ts).await
    }
}

#[async_trait]
impl IdentityResolver for SlackClient {
    async fn channel_name(&self, channel_id: &str) -> Result<Option<String>, VigilError> {
        SlackClient::channel_name(self, channel_id).await
    }

    async fn channel_id(&self, channel_name: &str) -> Result<Option<String>, VigilError> {
        self.find_channel_id(channel_name).await
    }

    async fn user_email(&self, user_id: &str) -> Result<Option<String>, VigilError> {
        SlackClient::user_email(self, user_id).await
    }
}

#[async_trait]
impl HistorySource for SlackClient {
    async fn history(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<HistoryMessage>, VigilError> {
        self.channel_history(channel_id, since).await
    }
}
