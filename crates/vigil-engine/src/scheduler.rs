// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The escalation engine and its periodic jobs.
//!
//! Three jobs run independently: the inactivity sweep, the question expiry
//! sweep, and the daily summary run. Each has its own [`JobGuard`], so a run
//! that is still going when the next tick fires is not overlapped; the tick
//! is skipped instead. Per-channel and per-question work inside a run happens
//! on a `JoinSet`, and a failure in one unit never reaches the others.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use vigil_config::{AlertsConfig, ScheduleConfig};
use vigil_core::{
    AlertPoster, ChannelRef, Classifier, DialogueTurn, IdentityResolver, PermalinkResolver,
    Summarizer, VigilError,
};
use vigil_directory::ChannelDirectory;

use crate::buffer::{BufferedMessage, ChannelBufferStore};
use crate::clock::Clock;
use crate::daily::{next_daily_run, summary_date};
use crate::dispatcher::EscalationDispatcher;
use crate::ingest::Ingestor;
use crate::tracker::QuestionTracker;

/// Client display name used when the directory has none for a channel.
pub const UNKNOWN_CLIENT: &str = "An unknown client";

/// Parsed schedule values the engine runs on.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSettings {
    pub inactivity_threshold: Duration,
    pub inactivity_sweep_interval: Duration,
    pub expiry_sweep_interval: Duration,
    pub question_deadline: Duration,
    pub summary_time: NaiveTime,
    pub summary_timezone: Tz,
}

impl ScheduleSettings {
    pub fn from_config(config: &ScheduleConfig) -> Result<Self, VigilError> {
        let summary_time = config.summary_time().ok_or_else(|| {
            VigilError::Config(format!(
                "invalid daily_summary_time `{}`",
                config.daily_summary_time
            ))
        })?;
        let summary_timezone = config.summary_timezone().ok_or_else(|| {
            VigilError::Config(format!(
                "invalid daily_summary_timezone `{}`",
                config.daily_summary_timezone
            ))
        })?;

        let settings = Self {
            inactivity_threshold: config.inactivity_threshold(),
            inactivity_sweep_interval: config.inactivity_sweep_interval(),
            expiry_sweep_interval: config.expiry_sweep_interval(),
            question_deadline: config.question_deadline(),
            summary_time,
            summary_timezone,
        };
        if settings.inactivity_sweep_interval.is_zero()
            || settings.expiry_sweep_interval.is_zero()
            || settings.question_deadline.is_zero()
            || settings.inactivity_threshold.is_zero()
        {
            return Err(VigilError::Config(
                "schedule durations must be greater than zero".to_string(),
            ));
        }
        Ok(settings)
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            inactivity_threshold: Duration::from_secs(300),
            inactivity_sweep_interval: Duration::from_secs(60),
            expiry_sweep_interval: Duration::from_secs(60),
            question_deadline: Duration::from_secs(1800),
            summary_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
            summary_timezone: chrono_tz::America::Los_Angeles,
        }
    }
}

/// External services the engine calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub classifier: Arc<dyn Classifier>,
    pub summarizer: Arc<dyn Summarizer>,
    pub poster: Arc<dyn AlertPoster>,
    pub permalinks: Arc<dyn PermalinkResolver>,
    pub identity: Arc<dyn IdentityResolver>,
}

/// Prevents overlapping runs of the same job.
#[derive(Debug, Default)]
pub struct JobGuard {
    running: AtomicBool,
}

/// Held for the duration of one job run; releases the guard on drop.
#[derive(Debug)]
pub struct JobPermit<'a> {
    guard: &'a JobGuard,
}

impl JobGuard {
    /// Returns `None` while another permit for this guard is alive.
    pub fn try_acquire(&self) -> Option<JobPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| JobPermit { guard: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for JobPermit<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// The previous run was still in progress; nothing was done.
    pub skipped: bool,
    pub channels_flushed: usize,
    pub messages_flushed: usize,
    pub failed_batches: usize,
    pub alerts_posted: usize,
    pub alerts_failed: usize,
    pub questions_registered: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpiryReport {
    pub skipped: bool,
    pub expired: usize,
    pub alerts_posted: usize,
    pub alerts_failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryReport {
    pub skipped: bool,
    pub channels: usize,
    pub posted: usize,
    /// Channels with nothing to summarize.
    pub empty: usize,
    /// Channels whose id could not be resolved.
    pub unresolved: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
struct BatchOutcome {
    failed: bool,
    alerts_posted: usize,
    alerts_failed: usize,
    questions_registered: usize,
}

enum SummaryOutcome {
    Posted,
    Empty,
    Unresolved,
    Failed,
}

/// Owns the buffer store, question tracker and dispatcher, and drives the
/// periodic jobs over them.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct EscalationEngine {
    buffers: Arc<ChannelBufferStore>,
    tracker: Arc<QuestionTracker>,
    dispatcher: EscalationDispatcher,
    collaborators: Collaborators,
    directory: Arc<ChannelDirectory>,
    clock: Arc<dyn Clock>,
    settings: ScheduleSettings,
    inactivity_guard: Arc<JobGuard>,
    expiry_guard: Arc<JobGuard>,
    summary_guard: Arc<JobGuard>,
}

impl EscalationEngine {
    pub fn new(
        settings: ScheduleSettings,
        alerts: AlertsConfig,
        directory: Arc<ChannelDirectory>,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let dispatcher = EscalationDispatcher::new(
            collaborators.poster.clone(),
            collaborators.permalinks.clone(),
            alerts,
        );
        Self {
            buffers: Arc::new(ChannelBufferStore::new()),
            tracker: Arc::new(QuestionTracker::new(settings.question_deadline)),
            dispatcher,
            collaborators,
            directory,
            clock,
            settings,
            inactivity_guard: Arc::default(),
            expiry_guard: Arc::default(),
            summary_guard: Arc::default(),
        }
    }

    /// An ingestion entry point feeding this engine's buffers and tracker.
    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(
            self.buffers.clone(),
            self.tracker.clone(),
            self.collaborators.identity.clone(),
            self.directory.clone(),
            self.clock.clone(),
        )
    }

    pub fn buffers(&self) -> &ChannelBufferStore {
        &self.buffers
    }

    pub fn tracker(&self) -> &QuestionTracker {
        &self.tracker
    }

    pub fn settings(&self) -> &ScheduleSettings {
        &self.settings
    }

    pub fn inactivity_guard(&self) -> &JobGuard {
        &self.inactivity_guard
    }

    pub fn expiry_guard(&self) -> &JobGuard {
        &self.expiry_guard
    }

    pub fn summary_guard(&self) -> &JobGuard {
        &self.summary_guard
    }

    /// Flush every channel that has been idle longer than the threshold and
    /// act on the classifier's verdict for each batch.
    pub async fn run_inactivity_sweep(&self) -> SweepReport {
        let Some(_permit) = self.inactivity_guard.try_acquire() else {
            return SweepReport {
                skipped: true,
                ..Default::default()
            };
        };

        let now = self.clock.now();
        let threshold = self.settings.inactivity_threshold;
        let mut report = SweepReport::default();
        let mut batches = JoinSet::new();

        for channel_id in self.buffers.channel_ids() {
            let Some(batch) = self.buffers.drain_if_idle(&channel_id, now, threshold) else {
                continue;
            };
            if batch.is_empty() {
                continue;
            }
            info!(channel_id = %channel_id, messages = batch.len(), "channel inactive, flushing buffer");
            report.channels_flushed += 1;
            report.messages_flushed += batch.len();
            let engine = self.clone();
            batches.spawn(async move { engine.process_batch(channel_id, batch, now).await });
        }

        while let Some(joined) = batches.join_next().await {
            match joined {
                Ok(outcome) => {
                    report.failed_batches += usize::from(outcome.failed);
                    report.alerts_posted += outcome.alerts_posted;
                    report.alerts_failed += outcome.alerts_failed;
                    report.questions_registered += outcome.questions_registered;
                }
                Err(e) => {
                    error!(error = %e, "batch task failed");
                    report.failed_batches += 1;
                }
            }
        }
        report
    }

    async fn process_batch(
        &self,
        channel_id: String,
        batch: Vec<BufferedMessage>,
        drained_at: DateTime<Utc>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let Some(first) = batch.first() else {
            return outcome;
        };
        let channel = ChannelRef::new(channel_id, first.channel_name.clone());
        let anchor_ts = first.sequence_ts.clone();
        let client = self
            .directory
            .client_name(&channel.name)
            .unwrap_or(UNKNOWN_CLIENT)
            .to_string();
        let turns: Vec<DialogueTurn> = batch.iter().map(BufferedMessage::to_turn).collect();

        let classification = match self.collaborators.classifier.classify(&channel, &turns).await {
            Ok(c) => c,
            Err(e) => {
                error!(channel = %channel.name, error = %e, "classification failed");
                warn!(channel = %channel.name, messages = batch.len(), "dropping batch");
                outcome.failed = true;
                return outcome;
            }
        };

        if let Some(excerpt) = classification.fire() {
            warn!(channel = %channel.name, client = %client, "client fire detected");
            let posted = self
                .dispatcher
                .dispatch_fire(&client, &channel.id, Some(&anchor_ts), excerpt)
                .await;
            outcome.count_alert(posted);
        }

        if let Some(excerpt) = classification.testimonial() {
            info!(channel = %channel.name, client = %client, "testimonial detected");
            let posted = self
                .dispatcher
                .dispatch_testimonial(&client, &channel.id, Some(&anchor_ts), excerpt)
                .await;
            outcome.count_alert(posted);
        }

        let questions = classification.pending_questions();
        if !questions.is_empty() {
            outcome.questions_registered = self.tracker.register(questions, &channel, drained_at);
        }
        outcome
    }

    /// Escalate every question whose deadline has passed.
    pub async fn run_expiry_sweep(&self) -> ExpiryReport {
        let Some(_permit) = self.expiry_guard.try_acquire() else {
            return ExpiryReport {
                skipped: true,
                ..Default::default()
            };
        };

        let expired = self.tracker.sweep_expired(self.clock.now());
        let mut report = ExpiryReport {
            expired: expired.len(),
            ..Default::default()
        };
        let mut alerts = JoinSet::new();

        for question in expired {
            warn!(
                channel = %question.channel_name,
                question_ts = %question.id,
                "question expired unanswered"
            );
            let dispatcher = self.dispatcher.clone();
            alerts.spawn(async move { dispatcher.dispatch_expired_question(&question).await });
        }

        while let Some(joined) = alerts.join_next().await {
            match joined {
                Ok(true) => report.alerts_posted += 1,
                Ok(false) => report.alerts_failed += 1,
                Err(e) => {
                    error!(error = %e, "expiry alert task failed");
                    report.alerts_failed += 1;
                }
            }
        }
        report
    }

    /// Summarize every monitored channel and post the results.
    pub async fn run_daily_summaries(&self) -> SummaryReport {
        let Some(_permit) = self.summary_guard.try_acquire() else {
            return SummaryReport {
                skipped: true,
                ..Default::default()
            };
        };

        let date = summary_date(self.clock.now(), self.settings.summary_timezone);
        let channels: Vec<String> = self
            .directory
            .monitored_channels()
            .into_iter()
            .map(str::to_string)
            .collect();
        info!(channels = channels.len(), %date, "running daily summaries");

        let mut report = SummaryReport {
            channels: channels.len(),
            ..Default::default()
        };
        let mut runs = JoinSet::new();
        for name in channels {
            let engine = self.clone();
            runs.spawn(async move { engine.summarize_channel(name, date).await });
        }

        while let Some(joined) = runs.join_next().await {
            match joined {
                Ok(SummaryOutcome::Posted) => report.posted += 1,
                Ok(SummaryOutcome::Empty) => report.empty += 1,
                Ok(SummaryOutcome::Unresolved) => report.unresolved += 1,
                Ok(SummaryOutcome::Failed) => report.failed += 1,
                Err(e) => {
                    error!(error = %e, "summary task failed");
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn summarize_channel(&self, name: String, date: chrono::NaiveDate) -> SummaryOutcome {
        let channel_id = match self.collaborators.identity.channel_id(&name).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                warn!(channel = %name, "cannot summarize, channel id not found");
                return SummaryOutcome::Unresolved;
            }
            Err(e) => {
                error!(channel = %name, error = %e, "channel id lookup failed");
                return SummaryOutcome::Unresolved;
            }
        };
        let channel = ChannelRef::new(channel_id, name);

        match self.collaborators.summarizer.summarize(&channel).await {
            Ok(Some(body)) => {
                let client = self
                    .directory
                    .client_name(&channel.name)
                    .unwrap_or(channel.name.as_str())
                    .to_string();
                if self
                    .dispatcher
                    .dispatch_daily_summary(&client, date, &body)
                    .await
                {
                    SummaryOutcome::Posted
                } else {
                    SummaryOutcome::Failed
                }
            }
            Ok(None) => {
                info!(channel = %channel.name, "no messages to summarize");
                SummaryOutcome::Empty
            }
            Err(e) => {
                error!(channel = %channel.name, error = %e, "summary generation failed");
                SummaryOutcome::Failed
            }
        }
    }

    /// Start the three periodic jobs.
    ///
    /// Each returned handle ends after `cancel` fires and that job's in-flight
    /// runs have finished.
    pub fn spawn(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        let sweep = self.clone();
        let expiry = self.clone();
        vec![
            spawn_periodic(
                "inactivity_sweep",
                self.settings.inactivity_sweep_interval,
                cancel.clone(),
                move || {
                    let engine = sweep.clone();
                    async move {
                        let report = engine.run_inactivity_sweep().await;
                        log_report("inactivity_sweep", report.skipped, &report);
                    }
                },
            ),
            spawn_periodic(
                "expiry_sweep",
                self.settings.expiry_sweep_interval,
                cancel.clone(),
                move || {
                    let engine = expiry.clone();
                    async move {
                        let report = engine.run_expiry_sweep().await;
                        log_report("expiry_sweep", report.skipped, &report);
                    }
                },
            ),
            self.spawn_daily(cancel),
        ]
    }

    fn spawn_daily(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let runs = TaskTracker::new();
            let time = engine.settings.summary_time;
            let tz = engine.settings.summary_timezone;
            let mut after = engine.clock.now();

            loop {
                let now = engine.clock.now();
                let Some(next) = next_daily_run(now.max(after), time, tz) else {
                    error!(%time, %tz, "no upcoming daily summary time, stopping job");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or_default();
                info!(next_run = %next, "daily summaries scheduled");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        let engine = engine.clone();
                        runs.spawn(async move {
                            let report = engine.run_daily_summaries().await;
                            log_report("daily_summaries", report.skipped, &report);
                        });
                        after = next;
                    }
                    _ = cancel.cancelled() => break,
                }
            }

            runs.close();
            runs.wait().await;
            debug!(job = "daily_summaries", "job stopped");
        })
    }
}

/// Run `job` every `every`, first after one full period.
///
/// Each tick spawns the run instead of awaiting it, so a slow run does not
/// push back the timer. Overlap of the same job is handled by its guard.
fn spawn_periodic<F, Fut>(
    name: &'static str,
    every: Duration,
    cancel: CancellationToken,
    job: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let runs = TaskTracker::new();
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    runs.spawn(job());
                }
                _ = cancel.cancelled() => break,
            }
        }

        runs.close();
        runs.wait().await;
        debug!(job = name, "job stopped");
    })
}

fn log_report(job: &'static str, skipped: bool, report: &impl std::fmt::Debug) {
    if skipped {
        warn!(job, "previous run still in progress, skipping");
    } else {
        debug!(job, ?report, "job finished");
    }
}

impl BatchOutcome {
    fn count_alert(&mut self, posted: bool) {
        if posted {
            self.alerts_posted += 1;
        } else {
            self.alerts_failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_blocks_second_permit_until_drop() {
        let guard = JobGuard::default();
        let first = guard.try_acquire();
        assert!(first.is_some());
        assert!(guard.is_running());
        assert!(guard.try_acquire().is_none());
        drop(first);
        assert!(!guard.is_running());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn settings_from_default_config() {
        let settings = ScheduleSettings::from_config(&ScheduleConfig::default()).unwrap();
        assert_eq!(settings, ScheduleSettings::default());
    }

    #[test]
    fn settings_reject_bad_timezone() {
        let config = ScheduleConfig {
            daily_summary_timezone: "Nowhere/Land".into(),
            ..Default::default()
        };
        assert!(matches!(
            ScheduleSettings::from_config(&config),
            Err(VigilError::Config(_))
        ));
    }

    #[test]
    fn settings_reject_zero_interval() {
        let config = ScheduleConfig {
            expiry_sweep_interval_secs: 0,
            ..Default::default()
        };
        assert!(ScheduleSettings::from_config(&config).is_err());
    }
}
