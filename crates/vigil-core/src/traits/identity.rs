// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform identity and history lookups.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::VigilError;
use crate::types::HistoryMessage;

/// Resolves platform ids to names and contact details.
///
/// `Ok(None)` means the platform answered but has no such record.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Channel id to channel name.
    async fn channel_name(&self, channel_id: &str) -> Result<Option<String>, VigilError>;

    /// Channel name to channel id.
    async fn channel_id(&self, channel_name: &str) -> Result<Option<String>, VigilError>;

    /// User id to the user's email address.
    async fn user_email(&self, user_id: &str) -> Result<Option<String>, VigilError>;
}

/// Reads past messages from a channel.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Messages posted after `since`, oldest first.
    async fn history(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<HistoryMessage>, VigilError>;
}
