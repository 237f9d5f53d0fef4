// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express: non-zero cadences,
//! parseable schedule values, non-empty destinations.

use crate::diagnostic::ConfigError;
use crate::model::VigilConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure rather than stopping at the first.
pub fn validate_config(config: &VigilConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.monitor.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "monitor.log_level `{}` must be one of: {}",
                config.monitor.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    let schedule = &config.schedule;
    for (key, value) in [
        ("inactivity_threshold_secs", schedule.inactivity_threshold_secs),
        (
            "inactivity_sweep_interval_secs",
            schedule.inactivity_sweep_interval_secs,
        ),
        ("expiry_sweep_interval_secs", schedule.expiry_sweep_interval_secs),
        ("question_deadline_secs", schedule.question_deadline_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::Validation {
                message: format!("schedule.{key} must be greater than zero"),
            });
        }
    }

    if schedule.summary_time().is_none() {
        errors.push(ConfigError::Validation {
            message: format!(
                "schedule.daily_summary_time `{}` is not a valid HH:MM time",
                schedule.daily_summary_time
            ),
        });
    }

    if schedule.summary_timezone().is_none() {
        errors.push(ConfigError::Validation {
            message: format!(
                "schedule.daily_summary_timezone `{}` is not a known IANA timezone",
                schedule.daily_summary_timezone
            ),
        });
    }

    for (key, value) in [
        ("client_alerts_channel", &config.alerts.client_alerts_channel),
        ("testimonials_channel", &config.alerts.testimonials_channel),
        ("summaries_channel", &config.alerts.summaries_channel),
    ] {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("alerts.{key} must not be empty"),
            });
        } else if trimmed.starts_with('#') {
            errors.push(ConfigError::Validation {
                message: format!("alerts.{key} `{value}` must be given without a leading `#`"),
            });
        }
    }

    if config.slack.retry_max_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "slack.retry_max_attempts must be at least 1".to_string(),
        });
    }

    for (key, url) in [
        ("slack.api_base", &config.slack.api_base),
        ("openai.base_url", &config.openai.base_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ConfigError::Validation {
                message: format!("{key} `{url}` must be an http(s) URL"),
            });
        }
    }

    if config.directory.metadata_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "directory.metadata_path must not be empty".to_string(),
        });
    }

    for (i, domain) in config.directory.internal_domains.iter().enumerate() {
        if domain.trim().is_empty() || domain.contains('@') {
            errors.push(ConfigError::Validation {
                message: format!(
                    "directory.internal_domains[{i}] `{domain}` must be a bare domain such as `example.com`"
                ),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
