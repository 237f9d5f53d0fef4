// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory platform directory: channel names, user emails, and history.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use vigil_core::{HistoryMessage, HistorySource, IdentityResolver, VigilError};

/// Resolves ids from tables filled in by the test.
///
/// Unknown ids resolve to `Ok(None)`; ids marked failing return a gateway error.
#[derive(Default)]
pub struct MockIdentityResolver {
    channels: Mutex<HashMap<String, String>>,
    users: Mutex<HashMap<String, String>>,
    history: Mutex<HashMap<String, Vec<HistoryMessage>>>,
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    lookups: Mutex<Vec<String>>,
}

impl MockIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_channel(&self, id: &str, name: &str) {
        self.channels
            .lock()
            .await
            .insert(id.to_string(), name.to_string());
    }

    pub async fn add_user(&self, id: &str, email: &str) {
        self.users
            .lock()
            .await
            .insert(id.to_string(), email.to_string());
    }

    pub async fn set_history(&self, channel_id: &str, messages: Vec<HistoryMessage>) {
        self.history
            .lock()
            .await
            .insert(channel_id.to_string(), messages);
    }

    /// Make lookups of `id` (channel id, channel name, or user id) fail.
    pub async fn fail_lookup(&self, id: &str) {
        self.failing.lock().await.insert(id.to_string());
    }

    /// Make the next lookup of `id` sleep for `delay` before answering.
    pub async fn delay_next_lookup(&self, id: &str, delay: Duration) {
        self.delays.lock().await.insert(id.to_string(), delay);
    }

    /// Every id or name looked up so far, in order.
    pub async fn lookups(&self) -> Vec<String> {
        self.lookups.lock().await.clone()
    }

    async fn check(&self, id: &str) -> Result<(), VigilError> {
        self.lookups.lock().await.push(id.to_string());
        let delay = self.delays.lock().await.remove(id);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().await.contains(id) {
            return Err(VigilError::gateway(format!("mock lookup of {id} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityResolver for MockIdentityResolver {
    async fn channel_name(&self, channel_id: &str) -> Result<Option<String>, VigilError> {
        self.check(channel_id).await?;
        Ok(self.channels.lock().await.get(channel_id).cloned())
    }

    async fn channel_id(&self, channel_name: &str) -> Result<Option<String>, VigilError> {
        self.check(channel_name).await?;
        Ok(self
            .channels
            .lock()
            .await
            .iter()
            .find(|(_, name)| name.as_str() == channel_name)
            .map(|(id, _)| id.clone()))
    }

    async fn user_email(&self, user_id: &str) -> Result<Option<String>, VigilError> {
        self.check(user_id).await?;
        Ok(self.users.lock().await.get(user_id).cloned())
    }
}

#[async_trait]
impl HistorySource for MockIdentityResolver {
    async fn history(
        &self,
        channel_id: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<HistoryMessage>, VigilError> {
        self.check(channel_id).await?;
        Ok(self
            .history
            .lock()
            .await
            .get(channel_id)
            .cloned()
            .unwrap_or_default())
    }
}
