// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the subset of the Slack Web API Vigil uses.

use serde::Deserialize;

/// Fields every Web API response carries.
pub(crate) trait ApiResponse {
    fn ok(&self) -> bool;
    fn error(&self) -> Option<&str>;
}

macro_rules! api_response {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ApiResponse for $ty {
                fn ok(&self) -> bool {
                    self.ok
                }

                fn error(&self) -> Option<&str> {
                    self.error.as_deref()
                }
            }
        )+
    };
}

api_response!(
    AuthTestResponse,
    PostMessageResponse,
    PermalinkResponse,
    ConversationInfoResponse,
    ConversationListResponse,
    ConversationHistoryResponse,
    UserInfoResponse,
    ConnectionsOpenResponse,
);

/// Identity of the bot token, as reported by `auth.test`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTestResponse {
    pub(crate) ok: bool,
    #[serde(default)]
    pub(crate) error: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostMessageResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PermalinkResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationInfoResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub channel: Option<Conversation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Conversation {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationListResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub channels: Vec<Conversation>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationHistoryResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub messages: Vec<HistoryEntry>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryEntry {
    pub ts: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl ResponseMetadata {
    /// The pagination cursor, when another page exists.
    pub fn cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserInfoResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct User {
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserProfile {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConnectionsOpenResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}
