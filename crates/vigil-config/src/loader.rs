// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later overriding earlier:
//! 1. Compiled defaults
//! 2. `/etc/vigil/vigil.toml`
//! 3. `~/.config/vigil/vigil.toml`
//! 4. `./vigil.toml`
//! 5. `VIGIL_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::VigilConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/vigil/vigil.toml";
pub(crate) const LOCAL_CONFIG: &str = "vigil.toml";

/// Config sections addressable from the environment.
const ENV_SECTIONS: &[&str] = &["monitor", "schedule", "alerts", "slack", "openai", "directory"];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vigil/vigil.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
pub fn load_config() -> Result<VigilConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no environment).
pub fn load_config_from_str(toml_content: &str) -> Result<VigilConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VigilConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<VigilConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VigilConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for the default config lookup, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(VigilConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Environment provider mapping `VIGIL_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `VIGIL_SLACK_BOT_TOKEN` must become `slack.bot_token`.
fn env_provider() -> Env {
    Env::prefixed("VIGIL_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env key onto its dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
