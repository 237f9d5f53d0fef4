// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types exchanged between the engine and its external collaborators.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Role of a message author relative to the monitored client channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuthorRole {
    /// A member of the support/operations team.
    Internal,
    /// A member of the client organisation that owns the channel.
    Client,
    /// Anyone the directory cannot place.
    Unknown,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of collaborator behind an adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Gateway,
    Classifier,
    Summarizer,
    AlertSink,
}

/// A monitored channel, by platform id and human-readable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: String,
    pub name: String,
}

impl ChannelRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One message event as delivered by the chat platform gateway.
///
/// Fields are optional where the platform may omit them; the ingestion entry
/// point decides what to drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub channel_id: String,
    pub author_id: Option<String>,
    pub text: Option<String>,
    /// Platform-assigned message timestamp.
    pub sequence_ts: String,
    /// Client-supplied id used to collapse edits and retries.
    pub dedup_key: Option<String>,
}

/// One dialogue line sent to the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub author_role: AuthorRole,
    pub text: String,
    pub sequence_ts: String,
}

/// A question the classifier extracted from a batch, keyed by the timestamp of
/// the message that asked it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionCandidate {
    pub text: String,
    pub sequence_ts: String,
}

/// Structured judgment returned by the classifier for one channel batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub is_fire: bool,
    #[serde(default)]
    pub fire_text: Option<String>,
    #[serde(default)]
    pub is_testimonial: bool,
    #[serde(default)]
    pub testimonial_text: Option<String>,
    #[serde(default)]
    pub is_question: bool,
    #[serde(default)]
    pub questions: Vec<QuestionCandidate>,
}

impl Classification {
    /// The fire excerpt, present only when flagged and non-blank.
    pub fn fire(&self) -> Option<&str> {
        flagged_text(self.is_fire, self.fire_text.as_deref())
    }

    /// The testimonial excerpt, present only when flagged and non-blank.
    pub fn testimonial(&self) -> Option<&str> {
        flagged_text(self.is_testimonial, self.testimonial_text.as_deref())
    }

    /// Questions to track; empty unless `is_question` is set.
    pub fn pending_questions(&self) -> &[QuestionCandidate] {
        if self.is_question {
            &self.questions
        } else {
            &[]
        }
    }
}

fn flagged_text(flag: bool, text: Option<&str>) -> Option<&str> {
    if !flag {
        return None;
    }
    text.map(str::trim).filter(|t| !t.is_empty())
}

/// A historical channel message, as returned by the platform history API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub author_id: Option<String>,
    pub text: Option<String>,
    pub sequence_ts: String,
    pub is_bot: bool,
}
