// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted summarizer.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use vigil_core::{AdapterType, ChannelRef, HealthStatus, PluginAdapter, Summarizer, VigilError};

/// Answers summaries by channel name; unscripted channels have nothing to summarize.
#[derive(Default)]
pub struct MockSummarizer {
    summaries: Mutex<HashMap<String, Option<String>>>,
    failing: Mutex<Vec<String>>,
    calls: Mutex<Vec<ChannelRef>>,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_summary(&self, channel_name: &str, body: &str) {
        self.summaries
            .lock()
            .await
            .insert(channel_name.to_string(), Some(body.to_string()));
    }

    pub async fn fail_for(&self, channel_name: &str) {
        self.failing.lock().await.push(channel_name.to_string());
    }

    pub async fn calls(&self) -> Vec<ChannelRef> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for MockSummarizer {
    fn name(&self) -> &str {
        "mock-summarizer"
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
impl Summarizer for MockSummarizer {
    async fn summarize(&self, channel: &ChannelRef) -> Result<Option<String>, VigilError> {
        self.calls.lock().await.push(channel.clone());
        if self.failing.lock().await.contains(&channel.name) {
            return Err(VigilError::inference("mock summarizer failed"));
        }
        Ok(self
            .summaries
            .lock()
            .await
            .get(&channel.name)
            .cloned()
            .flatten())
    }
}
