// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vigil config` command implementation.

use vigil_config::VigilConfig;

const REDACTED: &str = "<redacted>";

/// Renders `config` as TOML with every secret replaced.
pub fn render_redacted(config: &VigilConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&redact(config))
}

fn redact(config: &VigilConfig) -> VigilConfig {
    let mut redacted = config.clone();
    for secret in [
        &mut redacted.slack.bot_token,
        &mut redacted.slack.app_token,
        &mut redacted.openai.api_key,
    ] {
        if secret.is_some() {
            *secret = Some(REDACTED.to_string());
        }
    }
    redacted
}
