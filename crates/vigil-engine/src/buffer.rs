// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel message buffers with edit deduplication.
//!
//! Each channel owns one ordered sequence of [`BufferedMessage`]s. A channel
//! entry exists only while it holds at least one message: it is created by the
//! first append and removed whole by a drain. Append and drain on the same
//! channel serialize on the map shard lock, so a message is either part of a
//! drained batch or the first entry of a fresh buffer.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use vigil_core::{AuthorRole, DialogueTurn};

/// Snapshot of one chat message taken at ingestion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedMessage {
    pub channel_id: String,
    pub channel_name: String,
    pub author_id: String,
    pub author_role: AuthorRole,
    pub text: String,
    pub sequence_ts: String,
    /// Messages sharing a non-empty key replace each other in place.
    pub dedup_key: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl BufferedMessage {
    pub fn to_turn(&self) -> DialogueTurn {
        DialogueTurn {
            author_role: self.author_role,
            text: self.text.clone(),
            sequence_ts: self.sequence_ts.clone(),
        }
    }

    fn dedup_key(&self) -> Option<&str> {
        self.dedup_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Result of [`ChannelBufferStore::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The message went to the end; `len` is the new buffer length.
    Appended { len: usize },
    /// The message replaced the entry with the same dedup key at `index`.
    Replaced { index: usize },
}

#[derive(Debug)]
struct ChannelBuffer {
    messages: Vec<BufferedMessage>,
    last_activity_at: DateTime<Utc>,
}

/// All channel buffers, keyed by channel id.
#[derive(Debug, Default)]
pub struct ChannelBufferStore {
    channels: DashMap<String, ChannelBuffer>,
}

impl ChannelBufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `message` to the buffer of `channel_id`.
    ///
    /// With a dedup key matching an existing entry, that entry is replaced at
    /// its original position. Either way `last_activity` moves forward to the
    /// message's `received_at`; it never moves back.
    pub fn append(&self, channel_id: &str, message: BufferedMessage) -> AppendOutcome {
        let mut buffer = self
            .channels
            .entry(channel_id.to_string())
            .or_insert_with(|| ChannelBuffer {
                messages: Vec::new(),
                last_activity_at: message.received_at,
            });
        buffer.last_activity_at = buffer.last_activity_at.max(message.received_at);

        let existing = message.dedup_key().and_then(|key| {
            buffer
                .messages
                .iter()
                .position(|m| m.dedup_key() == Some(key))
        });

        match existing {
            Some(index) => {
                buffer.messages[index] = message;
                AppendOutcome::Replaced { index }
            }
            None => {
                buffer.messages.push(message);
                AppendOutcome::Appended {
                    len: buffer.messages.len(),
                }
            }
        }
    }

    /// Time of the most recent append, or `None` if nothing is buffered.
    pub fn last_activity(&self, channel_id: &str) -> Option<DateTime<Utc>> {
        self.channels.get(channel_id).map(|b| b.last_activity_at)
    }

    /// Take every buffered message for `channel_id`, leaving it empty.
    pub fn drain(&self, channel_id: &str) -> Vec<BufferedMessage> {
        self.channels
            .remove(channel_id)
            .map(|(_, buffer)| buffer.messages)
            .unwrap_or_default()
    }

    /// Drain `channel_id` only if its last activity is strictly older than
    /// `threshold` at `now`.
    ///
    /// The idle check and the removal happen under one shard lock, so an
    /// append racing with this call either refreshes the activity time first
    /// (and the channel is kept) or lands in a fresh buffer afterwards.
    pub fn drain_if_idle(
        &self,
        channel_id: &str,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Option<Vec<BufferedMessage>> {
        let threshold = TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX);
        self.channels
            .remove_if(channel_id, |_, buffer| {
                now.signed_duration_since(buffer.last_activity_at) > threshold
            })
            .map(|(_, buffer)| buffer.messages)
    }

    /// Ids of all channels that currently hold messages.
    pub fn channel_ids(&self) -> Vec<String> {
        self.channels.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of messages buffered for `channel_id`.
    pub fn len(&self, channel_id: &str) -> usize {
        self.channels
            .get(channel_id)
            .map_or(0, |b| b.messages.len())
    }

    /// Copy of the buffered messages for `channel_id`, in order.
    pub fn snapshot(&self, channel_id: &str) -> Vec<BufferedMessage> {
        self.channels
            .get(channel_id)
            .map(|b| b.messages.clone())
            .unwrap_or_default()
    }

    /// Total messages across every channel.
    pub fn total_messages(&self) -> usize {
        self.channels.iter().map(|b| b.messages.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn msg(ts: &str, text: &str, key: Option<&str>, received: i64) -> BufferedMessage {
        BufferedMessage {
            channel_id: "C1".into(),
            channel_name: "acme".into(),
            author_id: "U1".into(),
            author_role: AuthorRole::Client,
            text: text.into(),
            sequence_ts: ts.into(),
            dedup_key: key.map(str::to_string),
            received_at: at(received),
        }
    }

    #[test]
    fn same_dedup_key_replaces_in_place() {
        let store = ChannelBufferStore::new();
        assert_eq!(
            store.append("C1", msg("1", "helo", Some("k1"), 0)),
            AppendOutcome::Appended { len: 1 }
        );
        assert_eq!(
            store.append("C1", msg("1", "hello", Some("k1"), 5)),
            AppendOutcome::Replaced { index: 0 }
        );
        let buffered = store.snapshot("C1");
        assert_eq!(buffered.len(), 1);
        assert_eq!(buffered[0].text, "hello");
        assert_eq!(store.last_activity("C1"), Some(at(5)));
    }

    #[test]
    fn last_activity_never_moves_backwards() {
        let store = ChannelBufferStore::new();
        store.append("C1", msg("2", "later", None, 10));
        store.append("C1", msg("1", "stale", None, 4));
        assert_eq!(store.last_activity("C1"), Some(at(10)));
        assert!(
            store
                .drain_if_idle("C1", at(15), Duration::from_secs(10))
                .is_none()
        );
    }

    #[test]
    fn replacement_keeps_position_among_others() {
        let store = ChannelBufferStore::new();
        store.append("C1", msg("1", "a", Some("k1"), 0));
        store.append("C1", msg("2", "b", None, 1));
        store.append("C1", msg("1", "a2", Some("k1"), 2));
        let texts: Vec<String> = store.snapshot("C1").into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["a2", "b"]);
    }

    #[test]
    fn distinct_or_absent_keys_append_in_order() {
        let store = ChannelBufferStore::new();
        store.append("C1", msg("1", "first", None, 0));
        store.append("C1", msg("2", "second", None, 1));
        store.append("C1", msg("3", "third", Some("a"), 2));
        store.append("C1", msg("4", "fourth", Some("b"), 3));
        let texts: Vec<String> = store.snapshot("C1").into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn empty_dedup_key_never_deduplicates() {
        let store = ChannelBufferStore::new();
        store.append("C1", msg("1", "a", Some(""), 0));
        store.append("C1", msg("2", "b", Some(""), 1));
        assert_eq!(store.len("C1"), 2);
    }

    #[test]
    fn dedup_is_scoped_to_channel() {
        let store = ChannelBufferStore::new();
        store.append("C1", msg("1", "a", Some("k"), 0));
        store.append("C2", msg("1", "a", Some("k"), 0));
        assert_eq!(store.len("C1"), 1);
        assert_eq!(store.len("C2"), 1);
    }

    #[test]
    fn drain_empties_and_next_append_starts_fresh() {
        let store = ChannelBufferStore::new();
        store.append("C1", msg("1", "a", None, 0));
        store.append("C1", msg("2", "b", None, 1));

        let drained = store.drain("C1");
        assert_eq!(drained.len(), 2);
        assert_eq!(store.len("C1"), 0);
        assert_eq!(store.last_activity("C1"), None);
        assert!(store.channel_ids().is_empty());

        store.append("C1", msg("3", "c", None, 2));
        assert_eq!(store.len("C1"), 1);
        assert!(store.drain("C1").iter().all(|m| m.text == "c"));
    }

    #[test]
    fn drain_of_unknown_channel_is_empty() {
        let store = ChannelBufferStore::new();
        assert!(store.drain("nope").is_empty());
    }

    #[test]
    fn idle_boundary_is_strict() {
        let store = ChannelBufferStore::new();
        let threshold = Duration::from_secs(300);
        store.append("C1", msg("1", "a", None, 0));

        assert!(store.drain_if_idle("C1", at(300), threshold).is_none());
        assert_eq!(store.len("C1"), 1);

        let drained = store.drain_if_idle("C1", at(301), threshold).unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(store.len("C1"), 0);
    }

    #[test]
    fn replacement_refreshes_idle_clock() {
        let store = ChannelBufferStore::new();
        let threshold = Duration::from_secs(60);
        store.append("C1", msg("1", "a", Some("k"), 0));
        store.append("C1", msg("1", "a!", Some("k"), 50));
        assert!(store.drain_if_idle("C1", at(100), threshold).is_none());
        assert!(store.drain_if_idle("C1", at(111), threshold).is_some());
    }

    #[test]
    fn total_messages_spans_channels() {
        let store = ChannelBufferStore::new();
        store.append("C1", msg("1", "a", None, 0));
        store.append("C2", msg("2", "b", None, 0));
        store.append("C2", msg("3", "c", None, 0));
        assert_eq!(store.total_messages(), 3);
        let mut ids = store.channel_ids();
        ids.sort();
        assert_eq!(ids, vec!["C1", "C2"]);
    }
}
