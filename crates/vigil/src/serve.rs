// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vigil serve` command implementation.
//!
//! Wires the Slack gateway, the OpenAI collaborators and the channel
//! directory into an [`EscalationEngine`], starts its periodic jobs, and
//! feeds it every message the Socket Mode listener receives, in order per
//! channel, until a shutdown signal arrives.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use vigil_config::VigilConfig;
use vigil_core::{HealthStatus, PluginAdapter, VigilError};
use vigil_directory::ChannelDirectory;
use vigil_engine::shutdown;
use vigil_engine::{Collaborators, EscalationEngine, ScheduleSettings, SystemClock};
use vigil_openai::{OpenAiClassifier, OpenAiClient, OpenAiSummarizer};
use vigil_slack::{SlackClient, SlackListener};

/// Capacity of the listener-to-engine event queue.
const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Runs the `vigil serve` command.
pub async fn run_serve(config: VigilConfig) -> Result<(), VigilError> {
    init_tracing(&config.monitor.log_level);

    info!(name = %config.monitor.name, "starting vigil serve");

    let directory = Arc::new(ChannelDirectory::load(
        Path::new(&config.directory.metadata_path),
        &config.directory.internal_domains,
    )?);
    if directory.is_empty() {
        warn!(path = %config.directory.metadata_path, "channel directory is empty, nothing will be monitored");
    }

    let settings = ScheduleSettings::from_config(&config.schedule)?;

    let slack = Arc::new(SlackClient::new(&config.slack)?);
    let openai = OpenAiClient::from_config(&config.openai)?;
    let classifier = Arc::new(OpenAiClassifier::new(
        openai.clone(),
        &config.openai.classifier_model,
    ));
    let summarizer = Arc::new(OpenAiSummarizer::new(
        openai,
        &config.openai.summarizer_model,
        slack.clone(),
        slack.clone(),
        directory.clone(),
        settings.summary_timezone,
    ));

    log_adapter_health(&[
        slack.as_ref() as &dyn PluginAdapter,
        classifier.as_ref(),
        summarizer.as_ref(),
    ])
    .await;

    let collaborators = Collaborators {
        classifier,
        summarizer,
        poster: slack.clone(),
        permalinks: slack.clone(),
        identity: slack.clone(),
    };
    let engine = EscalationEngine::new(
        settings,
        config.alerts.clone(),
        directory,
        collaborators,
        Arc::new(SystemClock),
    );

    let cancel = shutdown::install_signal_handler();
    let mut handles = engine.spawn(cancel.clone());

    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let listener = SlackListener::new(
        slack.as_ref().clone(),
        Duration::from_secs(config.slack.reconnect_delay_secs),
    );
    let listener_cancel = cancel.clone();
    handles.push(tokio::spawn(async move {
        listener.run(events_tx, listener_cancel).await;
    }));

    let in_flight = TaskTracker::new();
    engine.ingestor().run(events_rx, &in_flight).await;

    info!("shutdown requested, draining");
    let grace = config.schedule.shutdown_grace();
    in_flight.close();
    if tokio::time::timeout(grace, in_flight.wait()).await.is_err() {
        warn!(pending = in_flight.len(), "ingest tasks still running at shutdown");
    }

    let aborted = shutdown::drain_jobs(handles, grace).await;
    if aborted > 0 {
        warn!(aborted, "jobs aborted after grace period");
    }

    info!(
        buffered_messages = engine.buffers().total_messages(),
        pending_questions = engine.tracker().pending_count(),
        "vigil serve shutdown complete, in-memory state discarded"
    );
    Ok(())
}

async fn log_adapter_health(adapters: &[&dyn PluginAdapter]) {
    for adapter in adapters {
        match adapter.health_check().await {
            Ok(HealthStatus::Healthy) => {
                info!(adapter = adapter.name(), kind = %adapter.adapter_type(), "adapter healthy");
            }
            Ok(HealthStatus::Degraded(reason)) => {
                warn!(adapter = adapter.name(), reason = %reason, "adapter degraded");
            }
            Ok(HealthStatus::Unhealthy(reason)) => {
                error!(adapter = adapter.name(), reason = %reason, "adapter unhealthy");
            }
            Err(e) => {
                error!(adapter = adapter.name(), error = %e, "adapter health check failed");
            }
        }
    }
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides `log_level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vigil={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
