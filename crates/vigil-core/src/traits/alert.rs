// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound alert delivery and deep-link resolution.

use async_trait::async_trait;

use crate::error::VigilError;
use crate::traits::adapter::PluginAdapter;

/// Posts formatted alert text to a named destination.
///
/// Fire-and-forget: the engine logs a failed post and never retries it.
#[async_trait]
pub trait AlertPoster: PluginAdapter {
    /// Posts `text` to the channel named `destination` (without a leading `#`).
    async fn post(&self, destination: &str, text: &str) -> Result<(), VigilError>;
}

/// Builds deep links to individual platform messages.
#[async_trait]
pub trait PermalinkResolver: Send + Sync {
    /// Returns a link to the message at `sequence_ts` in `channel_id`, if one exists.
    async fn permalink(
        &self,
        channel_id: &str,
        sequence_ts: &str,
    ) -> Result<Option<String>, VigilError>;
}
