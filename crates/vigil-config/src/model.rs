// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Vigil channel monitor.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Top-level Vigil configuration.
///
/// Every section is optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VigilConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Sweep cadences, thresholds, and the daily summary time.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Alert destination channel names.
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Slack gateway settings.
    #[serde(default)]
    pub slack: SlackConfig,

    /// OpenAI classification and summarization settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Channel metadata directory settings.
    #[serde(default)]
    pub directory: DirectoryConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Instance name, used in log lines.
    #[serde(default = "default_monitor_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            name: default_monitor_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_monitor_name() -> String {
    "vigil".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Periodic job configuration. All durations are in whole seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// A channel is flushed once it has been silent for longer than this.
    #[serde(default = "default_inactivity_threshold_secs")]
    pub inactivity_threshold_secs: u64,

    /// How often the inactivity sweep runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub inactivity_sweep_interval_secs: u64,

    /// How often the question expiry sweep runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub expiry_sweep_interval_secs: u64,

    /// How long a question may stay unanswered before it is escalated.
    #[serde(default = "default_question_deadline_secs")]
    pub question_deadline_secs: u64,

    /// Local wall-clock time of the daily summary, `HH:MM`.
    #[serde(default = "default_daily_summary_time")]
    pub daily_summary_time: String,

    /// IANA timezone the daily summary time is expressed in.
    #[serde(default = "default_daily_summary_timezone")]
    pub daily_summary_timezone: String,

    /// How long shutdown waits for in-flight jobs.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            inactivity_threshold_secs: default_inactivity_threshold_secs(),
            inactivity_sweep_interval_secs: default_sweep_interval_secs(),
            expiry_sweep_interval_secs: default_sweep_interval_secs(),
            question_deadline_secs: default_question_deadline_secs(),
            daily_summary_time: default_daily_summary_time(),
            daily_summary_timezone: default_daily_summary_timezone(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl ScheduleConfig {
    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_secs(self.inactivity_threshold_secs)
    }

    pub fn inactivity_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.inactivity_sweep_interval_secs)
    }

    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_sweep_interval_secs)
    }

    pub fn question_deadline(&self) -> Duration {
        Duration::from_secs(self.question_deadline_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Parses `daily_summary_time`; `None` if it is not a valid `HH:MM`.
    pub fn summary_time(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_summary_time.trim(), "%H:%M").ok()
    }

    /// Parses `daily_summary_timezone`; `None` if it is not a known IANA zone.
    pub fn summary_timezone(&self) -> Option<Tz> {
        self.daily_summary_timezone.trim().parse::<Tz>().ok()
    }
}

fn default_inactivity_threshold_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_question_deadline_secs() -> u64 {
    1800
}

fn default_daily_summary_time() -> String {
    "18:00".to_string()
}

fn default_daily_summary_timezone() -> String {
    "America/Los_Angeles".to_string()
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

/// Names of the channels alerts are posted to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AlertsConfig {
    /// Destination for fire alerts and unanswered-question alerts.
    #[serde(default = "default_client_alerts_channel")]
    pub client_alerts_channel: String,

    /// Destination for testimonial alerts.
    #[serde(default = "default_testimonials_channel")]
    pub testimonials_channel: String,

    /// Destination for daily summaries.
    #[serde(default = "default_summaries_channel")]
    pub summaries_channel: String,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            client_alerts_channel: default_client_alerts_channel(),
            testimonials_channel: default_testimonials_channel(),
            summaries_channel: default_summaries_channel(),
        }
    }
}

fn default_client_alerts_channel() -> String {
    "client-alerts".to_string()
}

fn default_testimonials_channel() -> String {
    "testimonials".to_string()
}

fn default_summaries_channel() -> String {
    "client-summaries".to_string()
}

/// Slack gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`) for Web API calls. Required by `serve`.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// App-level token (`xapp-...`) for Socket Mode. Required by `serve`.
    #[serde(default)]
    pub app_token: Option<String>,

    /// Base URL of the Web API.
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_slack_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Attempts per Web API call, including the first.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: usize,

    /// Base delay between retries when the server gives no `Retry-After`.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Delay before reconnecting a dropped Socket Mode session.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            app_token: None,
            api_base: default_slack_api_base(),
            request_timeout_ms: default_slack_request_timeout_ms(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}

fn default_slack_request_timeout_ms() -> u64 {
    10_000
}

fn default_retry_max_attempts() -> usize {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

/// OpenAI configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// API key. Falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the API.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model used to classify message batches.
    #[serde(default = "default_classifier_model")]
    pub classifier_model: String,

    /// Model used for daily summaries.
    #[serde(default = "default_summarizer_model")]
    pub summarizer_model: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_openai_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            classifier_model: default_classifier_model(),
            summarizer_model: default_summarizer_model(),
            request_timeout_secs: default_openai_timeout_secs(),
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_classifier_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_summarizer_model() -> String {
    "gpt-4o".to_string()
}

fn default_openai_timeout_secs() -> u64 {
    120
}

/// Channel metadata directory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryConfig {
    /// CSV file with `channel_name,client_name,client_email_domain,channel_url` rows.
    #[serde(default = "default_metadata_path")]
    pub metadata_path: String,

    /// Email domains whose users are treated as internal staff.
    #[serde(default)]
    pub internal_domains: Vec<String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            metadata_path: default_metadata_path(),
            internal_domains: Vec::new(),
        }
    }
}

fn default_metadata_path() -> String {
    "channel_metadata.csv".to_string()
}
