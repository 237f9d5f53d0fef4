// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Static channel metadata and author role resolution.
//!
//! The directory is loaded once at startup from a CSV file with the headers
//! `channel_name,client_name,client_email_domain,channel_url`. A channel is
//! monitored if and only if it has a row.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};
use vigil_core::{AuthorRole, VigilError};

/// One monitored channel's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMetadata {
    pub channel_name: String,
    pub client_name: Option<String>,
    pub client_email_domain: Option<String>,
    pub channel_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataRow {
    channel_name: Option<String>,
    client_name: Option<String>,
    client_email_domain: Option<String>,
    channel_url: Option<String>,
}

/// Lookup table of monitored channels plus the internal staff domains.
#[derive(Debug, Clone, Default)]
pub struct ChannelDirectory {
    channels: HashMap<String, ChannelMetadata>,
    internal_domains: HashSet<String>,
}

impl ChannelDirectory {
    /// Load the directory from a CSV file.
    ///
    /// A missing or unreadable file is an error: running with an empty
    /// directory would silently monitor nothing.
    pub fn load(path: &Path, internal_domains: &[String]) -> Result<Self, VigilError> {
        let file = std::fs::File::open(path).map_err(|e| {
            VigilError::Directory(format!(
                "cannot open channel metadata `{}`: {e}",
                path.display()
            ))
        })?;
        let directory = Self::from_reader(file, internal_domains)?;
        info!(
            path = %path.display(),
            channels = directory.len(),
            "loaded channel metadata"
        );
        Ok(directory)
    }

    /// Parse CSV content from any reader.
    pub fn from_reader<R: Read>(reader: R, internal_domains: &[String]) -> Result<Self, VigilError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut channels = HashMap::new();
        for (line, record) in csv_reader.deserialize::<MetadataRow>().enumerate() {
            let row = record.map_err(|e| {
                VigilError::Directory(format!("malformed metadata row {}: {e}", line + 1))
            })?;
            let Some(channel_name) = non_empty(row.channel_name) else {
                warn!(row = line + 1, "skipping metadata row without channel_name");
                continue;
            };
            channels.insert(
                channel_name.clone(),
                ChannelMetadata {
                    channel_name,
                    client_name: non_empty(row.client_name),
                    client_email_domain: non_empty(row.client_email_domain),
                    channel_url: non_empty(row.channel_url),
                },
            );
        }

        Ok(Self::from_entries(channels.into_values(), internal_domains))
    }

    /// Build a directory from already-parsed entries.
    pub fn from_entries(
        entries: impl IntoIterator<Item = ChannelMetadata>,
        internal_domains: &[String],
    ) -> Self {
        Self {
            channels: entries
                .into_iter()
                .map(|m| (m.channel_name.clone(), m))
                .collect(),
            internal_domains: internal_domains
                .iter()
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn get(&self, channel_name: &str) -> Option<&ChannelMetadata> {
        self.channels.get(channel_name)
    }

    pub fn is_monitored(&self, channel_name: &str) -> bool {
        self.channels.contains_key(channel_name)
    }

    /// Display name of the client owning `channel_name`, if the directory has one.
    pub fn client_name(&self, channel_name: &str) -> Option<&str> {
        self.get(channel_name)?.client_name.as_deref()
    }

    /// Names of all monitored channels, sorted.
    pub fn monitored_channels(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Classify an author by email domain.
    ///
    /// Internal domains win over the channel's client domain. Anything without
    /// an `@`, or matching neither, is [`AuthorRole::Unknown`].
    pub fn resolve_role(&self, email: &str, channel_name: &str) -> AuthorRole {
        let Some((_, domain)) = email.trim().rsplit_once('@') else {
            return AuthorRole::Unknown;
        };
        let domain = domain.to_ascii_lowercase();

        if self.internal_domains.contains(&domain) {
            return AuthorRole::Internal;
        }

        match self
            .get(channel_name)
            .and_then(|m| m.client_email_domain.as_deref())
        {
            Some(client) if client.eq_ignore_ascii_case(&domain) => AuthorRole::Client,
            _ => AuthorRole::Unknown,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
