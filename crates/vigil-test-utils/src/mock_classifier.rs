// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted classifier for deterministic engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, Semaphore};
use vigil_core::{
    AdapterType, ChannelRef, Classification, Classifier, DialogueTurn, HealthStatus,
    PluginAdapter, VigilError,
};

/// What the mock answers for one call.
#[derive(Debug, Clone)]
pub enum MockVerdict {
    Classified(Classification),
    /// Fails with an inference error.
    Unavailable,
    /// Fails with a malformed-response error.
    Malformed,
}

impl From<Classification> for MockVerdict {
    fn from(c: Classification) -> Self {
        Self::Classified(c)
    }
}

/// One recorded `classify` call.
#[derive(Debug, Clone)]
pub struct ClassifyCall {
    pub channel: ChannelRef,
    pub turns: Vec<DialogueTurn>,
}

/// A classifier with per-channel verdicts, a FIFO fallback queue, and an
/// optional gate that holds calls until released.
///
/// With nothing scripted it answers an empty [`Classification`].
#[derive(Default)]
pub struct MockClassifier {
    by_channel: Mutex<HashMap<String, MockVerdict>>,
    queue: Mutex<VecDeque<MockVerdict>>,
    calls: Mutex<Vec<ClassifyCall>>,
    entered: Notify,
    gate: Option<Arc<Semaphore>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A classifier whose calls block until [`release`](Self::release) is called.
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Answer every call for `channel_name` with `verdict`.
    pub async fn respond_for(&self, channel_name: &str, verdict: impl Into<MockVerdict>) {
        self.by_channel
            .lock()
            .await
            .insert(channel_name.to_string(), verdict.into());
    }

    /// Queue a verdict for the next call without a per-channel answer.
    pub async fn push(&self, verdict: impl Into<MockVerdict>) {
        self.queue.lock().await.push_back(verdict.into());
    }

    /// Let `n` gated calls proceed.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Wait until at least `n` calls have started.
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let notified = self.entered.notified();
            if self.calls.lock().await.len() >= n {
                return;
            }
            notified.await;
        }
    }

    pub async fn calls(&self) -> Vec<ClassifyCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl PluginAdapter for MockClassifier {
    fn name(&self) -> &str {
        "mock-classifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, VigilError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(
        &self,
        channel: &ChannelRef,
        turns: &[DialogueTurn],
    ) -> Result<Classification, VigilError> {
        self.calls.lock().await.push(ClassifyCall {
            channel: channel.clone(),
            turns: turns.to_vec(),
        });
        self.entered.notify_waiters();

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| VigilError::Internal(e.to_string()))?;
            permit.forget();
        }

        let scripted = self.by_channel.lock().await.get(&channel.name).cloned();
        let verdict = match scripted {
            Some(v) => v,
            None => self
                .queue
                .lock()
                .await
                .pop_front()
                .unwrap_or(MockVerdict::Classified(Classification::default())),
        };

        match verdict {
            MockVerdict::Classified(c) => Ok(c),
            MockVerdict::Unavailable => Err(VigilError::inference("mock classifier unavailable")),
            MockVerdict::Malformed => Err(VigilError::MalformedResponse {
                message: "mock classifier returned garbage".into(),
            }),
        }
    }
}
