// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily summary collaborator.

use async_trait::async_trait;

use crate::error::VigilError;
use crate::traits::adapter::PluginAdapter;
use crate::types::ChannelRef;

/// Produces a human-readable summary of a channel's recent conversation.
#[async_trait]
pub trait Summarizer: PluginAdapter {
    /// Returns `Ok(None)` when the channel had nothing worth summarizing.
    async fn summarize(&self, channel: &ChannelRef) -> Result<Option<String>, VigilError>;
}
