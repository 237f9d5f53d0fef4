// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness assembling an [`EscalationEngine`] over mock collaborators.

use std::sync::Arc;
use std::time::Duration;

use vigil_config::AlertsConfig;
use vigil_core::GatewayEvent;
use vigil_directory::{ChannelDirectory, ChannelMetadata};
use vigil_engine::{Collaborators, EscalationEngine, IngestOutcome, Ingestor, ScheduleSettings};

use crate::clock::ManualClock;
use crate::mock_alerts::{MockAlertPoster, MockPermalinks};
use crate::mock_classifier::MockClassifier;
use crate::mock_identity::MockIdentityResolver;
use crate::mock_summarizer::MockSummarizer;

/// Email domain treated as internal staff unless overridden.
pub const TEAM_DOMAIN: &str = "vigil.dev";

struct ChannelSpec {
    id: String,
    name: String,
    client_name: Option<String>,
    client_domain: Option<String>,
    monitored: bool,
}

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    channels: Vec<ChannelSpec>,
    users: Vec<(String, String)>,
    internal_domains: Vec<String>,
    settings: ScheduleSettings,
    alerts: AlertsConfig,
    gated_classifier: bool,
    clock: ManualClock,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            channels: Vec::new(),
            users: Vec::new(),
            internal_domains: vec![TEAM_DOMAIN.to_string()],
            settings: ScheduleSettings::default(),
            alerts: AlertsConfig::default(),
            gated_classifier: false,
            clock: ManualClock::at_default_epoch(),
        }
    }

    /// A monitored channel owned by `client_name`, whose users mail from `client_domain`.
    pub fn with_client_channel(
        mut self,
        id: &str,
        name: &str,
        client_name: Option<&str>,
        client_domain: &str,
    ) -> Self {
        self.channels.push(ChannelSpec {
            id: id.to_string(),
            name: name.to_string(),
            client_name: client_name.map(str::to_string),
            client_domain: Some(client_domain.to_string()),
            monitored: true,
        });
        self
    }

    /// A channel the gateway knows about but the directory does not list.
    pub fn with_unmonitored_channel(mut self, id: &str, name: &str) -> Self {
        self.channels.push(ChannelSpec {
            id: id.to_string(),
            name: name.to_string(),
            client_name: None,
            client_domain: None,
            monitored: false,
        });
        self
    }

    pub fn with_user(mut self, id: &str, email: &str) -> Self {
        self.users.push((id.to_string(), email.to_string()));
        self
    }

    pub fn with_settings(mut self, settings: ScheduleSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_inactivity_threshold(mut self, threshold: Duration) -> Self {
        self.settings.inactivity_threshold = threshold;
        self
    }

    pub fn with_question_deadline(mut self, deadline: Duration) -> Self {
        self.settings.question_deadline = deadline;
        self
    }

    pub fn with_alerts(mut self, alerts: AlertsConfig) -> Self {
        self.alerts = alerts;
        self
    }

    /// Hold classifier calls until the test releases them.
    pub fn with_gated_classifier(mut self) -> Self {
        self.gated_classifier = true;
        self
    }

    pub fn with_clock(mut self, clock: ManualClock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn build(self) -> TestHarness {
        let identity = Arc::new(MockIdentityResolver::new());
        for channel in &self.channels {
            identity.add_channel(&channel.id, &channel.name).await;
        }
        for (id, email) in &self.users {
            identity.add_user(id, email).await;
        }

        let directory = Arc::new(ChannelDirectory::from_entries(
            self.channels
                .iter()
                .filter(|c| c.monitored)
                .map(|c| ChannelMetadata {
                    channel_name: c.name.clone(),
                    client_name: c.client_name.clone(),
                    client_email_domain: c.client_domain.clone(),
                    channel_url: None,
                }),
            &self.internal_domains,
        ));

        let classifier = Arc::new(if self.gated_classifier {
            MockClassifier::gated()
        } else {
            MockClassifier::new()
        });
        let summarizer = Arc::new(MockSummarizer::new());
        let alerts = Arc::new(MockAlertPoster::new());
        let permalinks = Arc::new(MockPermalinks::new());

        let collaborators = Collaborators {
            classifier: classifier.clone(),
            summarizer: summarizer.clone(),
            poster: alerts.clone(),
            permalinks: permalinks.clone(),
            identity: identity.clone(),
        };

        let engine = EscalationEngine::new(
            self.settings,
            self.alerts,
            directory.clone(),
            collaborators,
            Arc::new(self.clock.clone()),
        );
        let ingestor = engine.ingestor();

        TestHarness {
            engine,
            ingestor,
            classifier,
            summarizer,
            alerts,
            permalinks,
            identity,
            directory,
            clock: self.clock,
        }
    }
}

/// An engine wired to mocks, with handles to every mock for assertions.
pub struct TestHarness {
    pub engine: EscalationEngine,
    pub ingestor: Ingestor,
    pub classifier: Arc<MockClassifier>,
    pub summarizer: Arc<MockSummarizer>,
    pub alerts: Arc<MockAlertPoster>,
    pub permalinks: Arc<MockPermalinks>,
    pub identity: Arc<MockIdentityResolver>,
    pub directory: Arc<ChannelDirectory>,
    pub clock: ManualClock,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Ingest a plain message without a dedup key.
    pub async fn say(&self, channel_id: &str, user_id: &str, text: &str, ts: &str) -> IngestOutcome {
        self.ingest(event(channel_id, user_id, text, ts, None)).await
    }

    /// Ingest a message carrying a dedup key.
    pub async fn say_keyed(
        &self,
        channel_id: &str,
        user_id: &str,
        text: &str,
        ts: &str,
        key: &str,
    ) -> IngestOutcome {
        self.ingest(event(channel_id, user_id, text, ts, Some(key)))
            .await
    }

    pub async fn ingest(&self, event: GatewayEvent) -> IngestOutcome {
        self.ingestor.ingest(event).await
    }

    pub fn advance_secs(&self, secs: u64) {
        self.clock.advance_secs(secs);
    }
}

/// A gateway event with every field populated.
pub fn event(
    channel_id: &str,
    user_id: &str,
    text: &str,
    ts: &str,
    dedup_key: Option<&str>,
) -> GatewayEvent {
    GatewayEvent {
        channel_id: channel_id.to_string(),
        author_id: Some(user_id.to_string()),
        text: Some(text.to_string()),
        sequence_ts: ts.to_string(),
        dedup_key: dedup_key.map(str::to_string),
    }
}
