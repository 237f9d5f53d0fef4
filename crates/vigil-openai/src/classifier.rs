// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch classifier backed by a chat-completions model.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;
use vigil_core::{
    AdapterType, AuthorRole, ChannelRef, Classification, Classifier, DialogueTurn, HealthStatus,
    PluginAdapter, QuestionCandidate, VigilError,
};

use crate::client::OpenAiClient;
use crate::prompts::CLASSIFIER_PROMPT;
use crate::types::ChatRequest;

/// Flags fires, testimonials and unanswered questions in a message batch.
#[derive(Debug, Clone)]
pub struct OpenAiClassifier {
    client: OpenAiClient,
    model: String,
}

impl OpenAiClassifier {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

/// Renders turns as `Client (timestamp: ts): text` lines.
///
/// Everyone who is not the client is shown as `Team`.
pub fn render_dialogue(turns: &[DialogueTurn]) -> String {
    turns
        .iter()
        .map(|turn| {
            let speaker = match turn.author_role {
                AuthorRole::Client => "Client",
                AuthorRole::Internal | AuthorRole::Unknown => "Team",
            };
            format!("{speaker} (timestamp: {}): {}", turn.sequence_ts, turn.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Deserialize)]
struct WireClassification {
    #[serde(default)]
    is_fire: bool,
    #[serde(default)]
    fire_text: Option<String>,
    #[serde(default)]
    is_testimonial: bool,
    #[serde(default)]
    testimonial_text: Option<String>,
    #[serde(default)]
    is_question: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    questions: Vec<WireQuestion>,
}

#[derive(Debug, Deserialize)]
struct WireQuestion {
    #[serde(default)]
    text: String,
    #[serde(default, deserialize_with = "wire_timestamp")]
    timestamp: Option<WireTimestamp>,
}

/// Half of the microsecond resolution of platform timestamps.
const NUMERIC_TS_TOLERANCE: f64 = 5e-7;

#[derive(Debug)]
enum WireTimestamp {
    Text(String),
    /// Unquoted; already rounded to the nearest `f64`.
    Number(f64),
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<WireQuestion>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<WireQuestion>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Models sometimes echo a numeric timestamp without quotes.
fn wire_timestamp<'de, D>(deserializer: D) -> Result<Option<WireTimestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(WireTimestamp::Text(s)),
        Value::Number(n) => n.as_f64().map(WireTimestamp::Number),
        _ => None,
    })
}

impl WireTimestamp {
    /// The exact `sequence_ts` this timestamp names.
    ///
    /// A number has lost its trailing zeros and possibly some precision, so
    /// it only resolves to the nearest turn within half a microsecond.
    fn resolve(self, turns: &[DialogueTurn]) -> Option<String> {
        match self {
            Self::Text(ts) => Some(ts),
            Self::Number(value) => turns
                .iter()
                .filter_map(|turn| {
                    let diff = (turn.sequence_ts.trim().parse::<f64>().ok()? - value).abs();
                    (diff < NUMERIC_TS_TOLERANCE).then_some((diff, turn))
                })
                .min_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, turn)| turn.sequence_ts.clone()),
        }
    }
}

/// Parses the model's JSON answer for the batch `turns`.
///
/// Questions without a timestamp cannot be tracked and are dropped, as are
/// unquoted timestamps that match no turn in the batch.
pub fn parse_classification(
    content: &str,
    turns: &[DialogueTurn],
) -> Result<Classification, VigilError> {
    let wire: WireClassification =
        serde_json::from_str(content.trim()).map_err(|e| VigilError::MalformedResponse {
            message: format!("classifier answer is not the expected JSON: {e}"),
        })?;

    let questions = wire
        .questions
        .into_iter()
        .filter_map(|q| {
            let Some(sequence_ts) = q.timestamp.and_then(|ts| ts.resolve(turns)) else {
                debug!(text = %q.text, "dropping question with no usable timestamp");
                return None;
            };
            Some(QuestionCandidate {
                text: q.text,
                sequence_ts,
            })
        })
        .collect();

    Ok(Classification {
        is_fire: wire.is_fire,
        fire_text: wire.fire_text,
        is_testimonial: wire.is_testimonial,
        testimonial_text: wire.testimonial_text,
        is_question: wire.is_question,
        questions,
    })
}

#[async_trait]
impl PluginAdapter for OpenAiClassifier {
    fn name(&self) -> &str {
        "openai-classifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, VigilError> {
        // Probing the API would spend tokens.
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(
        &self,
        channel: &ChannelRef,
        turns: &[DialogueTurn],
    ) -> Result<Classification, VigilError> {
        if turns.is_empty() {
            return Ok(Classification::default());
        }

        let request =
            ChatRequest::new(&self.model, CLASSIFIER_PROMPT, render_dialogue(turns), 0.0)
                .json_object();
        debug!(channel = %channel.name, turns = turns.len(), model = %self.model, "classifying batch");

        let content = self.client.complete(&request).await?;
        parse_classification(&content, turns)
    }
}
