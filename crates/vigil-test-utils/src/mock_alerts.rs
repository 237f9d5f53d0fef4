// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alert sink and permalink mocks that capture what the engine sends.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use vigil_core::{
    AdapterType, AlertPoster, HealthStatus, PermalinkResolver, PluginAdapter, VigilError,
};

/// One captured alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedAlert {
    pub destination: String,
    pub text: String,
}

/// Records every post. Posts to destinations marked failing return an error
/// and are not recorded.
#[derive(Default)]
pub struct MockAlertPoster {
    posted: Mutex<Vec<PostedAlert>>,
    failing: Mutex<Vec<String>>,
}

impl MockAlertPoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_destination(&self, destination: &str) {
        self.failing.lock().await.push(destination.to_string());
    }

    pub async fn posted(&self) -> Vec<PostedAlert> {
        self.posted.lock().await.clone()
    }

    /// Alerts sent to one destination, in order.
    pub async fn posted_to(&self, destination: &str) -> Vec<String> {
        self.posted
            .lock()
            .await
            .iter()
            .filter(|a| a.destination == destination)
            .map(|a| a.text.clone())
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.posted.lock().await.len()
    }
}

#[async_trait]
impl PluginAdapter for MockAlertPoster {
    fn name(&self) -> &str {
        "mock-alerts"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::AlertSink
    }

    async fn health_check(&self) -> Result<HealthStatus, VigilError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl AlertPoster for MockAlertPoster {
    async fn post(&self, destination: &str, text: &str) -> Result<(), VigilError> {
        if self.failing.lock().await.iter().any(|d| d == destination) {
            return Err(VigilError::gateway(format!("mock post to {destination} failed")));
        }
        self.posted.lock().await.push(PostedAlert {
            destination: destination.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Builds links of the form `https://mock.slack/{channel}/p{ts-without-dot}`.
#[derive(Default)]
pub struct MockPermalinks {
    failing: AtomicBool,
    missing: AtomicBool,
}

impl MockPermalinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every lookup return an error.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Make every lookup succeed with no link.
    pub fn missing(&self) {
        self.missing.store(true, Ordering::SeqCst);
    }

    pub fn link_for(channel_id: &str, sequence_ts: &str) -> String {
        format!("https://mock.slack/{channel_id}/p{}", sequence_ts.replace('.', ""))
    }
}

#[async_trait]
impl PermalinkResolver for MockPermalinks {
    async fn permalink(
        &self,
        channel_id: &str,
        sequence_ts: &str,
    ) -> Result<Option<String>, VigilError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(VigilError::gateway("mock permalink lookup failed"));
        }
        if self.missing.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(Self::link_for(channel_id, sequence_ts)))
    }
}
