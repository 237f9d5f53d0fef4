// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unanswered client questions awaiting a team response.
//!
//! Questions are keyed by the timestamp of the message that asked them. The
//! tracker only ever holds pending questions: an answered or expired question
//! is removed, and every removal goes through `DashMap::remove_if` so the
//! answer path and the expiry sweep cannot both claim the same entry.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};
use vigil_core::{AuthorRole, ChannelRef, QuestionCandidate};

/// One pending question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedQuestion {
    /// Timestamp of the originating message.
    pub id: String,
    pub text: String,
    pub channel_id: String,
    pub channel_name: String,
    pub created_at: DateTime<Utc>,
    pub deadline_at: DateTime<Utc>,
}

impl TrackedQuestion {
    /// A question is expired once `now` is strictly past its deadline.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline_at
    }

    /// How long the question was allowed to wait.
    pub fn allowed_wait(&self) -> TimeDelta {
        self.deadline_at - self.created_at
    }
}

#[derive(Debug)]
pub struct QuestionTracker {
    questions: DashMap<String, TrackedQuestion>,
    deadline: TimeDelta,
}

impl QuestionTracker {
    pub fn new(deadline: Duration) -> Self {
        Self {
            questions: DashMap::new(),
            deadline: TimeDelta::from_std(deadline).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Start tracking `candidates` raised in `channel`, each due at `now + deadline`.
    ///
    /// Candidates with a blank id are skipped. An id that is already tracked
    /// is left untouched, deadline included. Returns how many were added.
    pub fn register(
        &self,
        candidates: &[QuestionCandidate],
        channel: &ChannelRef,
        now: DateTime<Utc>,
    ) -> usize {
        let deadline_at = now.checked_add_signed(self.deadline).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut added = 0;

        for candidate in candidates {
            let id = candidate.sequence_ts.trim();
            if id.is_empty() {
                continue;
            }
            match self.questions.entry(id.to_string()) {
                Entry::Occupied(_) => {
                    debug!(question_ts = id, "question already tracked");
                }
                Entry::Vacant(slot) => {
                    slot.insert(TrackedQuestion {
                        id: id.to_string(),
                        text: candidate.text.clone(),
                        channel_id: channel.id.clone(),
                        channel_name: channel.name.clone(),
                        created_at: now,
                        deadline_at,
                    });
                    added += 1;
                    info!(
                        channel = %channel.name,
                        question_ts = id,
                        deadline = %deadline_at,
                        "tracking new question"
                    );
                }
            }
        }
        added
    }

    /// React to a new message in `channel_id`.
    ///
    /// A message from an internal author answers every pending question in the
    /// channel, whether or not it replies to any of them. Returns the questions
    /// this call removed; ones concurrently claimed by expiry are not included.
    pub fn notify_message(&self, channel_id: &str, role: AuthorRole) -> Vec<TrackedQuestion> {
        if role != AuthorRole::Internal {
            return Vec::new();
        }

        let ids: Vec<String> = self
            .questions
            .iter()
            .filter(|q| q.channel_id == channel_id)
            .map(|q| q.key().clone())
            .collect();

        let answered: Vec<TrackedQuestion> = ids
            .iter()
            .filter_map(|id| {
                self.questions
                    .remove_if(id, |_, q| q.channel_id == channel_id)
                    .map(|(_, q)| q)
            })
            .collect();

        for q in &answered {
            info!(channel = %q.channel_name, question_ts = %q.id, "question answered");
        }
        answered
    }

    /// Remove and return every question whose deadline is strictly before `now`.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<TrackedQuestion> {
        let ids: Vec<String> = self
            .questions
            .iter()
            .filter(|q| q.is_expired(now))
            .map(|q| q.key().clone())
            .collect();

        ids.iter()
            .filter_map(|id| {
                self.questions
                    .remove_if(id, |_, q| q.is_expired(now))
                    .map(|(_, q)| q)
            })
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.questions.contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.questions.len()
    }

    /// Pending questions in one channel.
    pub fn pending_in(&self, channel_id: &str) -> usize {
        self.questions
            .iter()
            .filter(|q| q.channel_id == channel_id)
            .count()
    }

    pub fn deadline(&self, id: &str) -> Option<DateTime<Utc>> {
        self.questions.get(id).map(|q| q.deadline_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn candidate(ts: &str, text: &str) -> QuestionCandidate {
        QuestionCandidate {
            text: text.into(),
            sequence_ts: ts.into(),
        }
    }

    fn channel(id: &str) -> ChannelRef {
        ChannelRef::new(id, format!("{id}-name"))
    }

    fn tracker() -> QuestionTracker {
        QuestionTracker::new(Duration::from_secs(1800))
    }

    #[test]
    fn registration_is_idempotent_and_keeps_first_deadline() {
        let t = tracker();
        assert_eq!(t.register(&[candidate("100", "Is this broken?")], &channel("C"), at(0)), 1);
        assert_eq!(t.register(&[candidate("100", "Is this broken?")], &channel("C"), at(600)), 0);
        assert_eq!(t.pending_count(), 1);
        assert_eq!(t.deadline("100"), Some(at(1800)));
    }

    #[test]
    fn blank_ids_are_skipped() {
        let t = tracker();
        let added = t.register(
            &[candidate("", "no id"), candidate("  ", "blank"), candidate("7", "ok")],
            &channel("C"),
            at(0),
        );
        assert_eq!(added, 1);
        assert!(t.contains("7"));
    }

    #[test]
    fn internal_message_clears_whole_channel_only() {
        let t = tracker();
        t.register(&[candidate("1", "a"), candidate("2", "b")], &channel("C1"), at(0));
        t.register(&[candidate("3", "c")], &channel("C2"), at(0));

        let answered = t.notify_message("C1", AuthorRole::Internal);
        assert_eq!(answered.len(), 2);
        assert_eq!(t.pending_in("C1"), 0);
        assert!(t.contains("3"));
    }

    #[test]
    fn non_internal_messages_answer_nothing() {
        let t = tracker();
        t.register(&[candidate("1", "a")], &channel("C1"), at(0));
        assert!(t.notify_message("C1", AuthorRole::Client).is_empty());
        assert!(t.notify_message("C1", AuthorRole::Unknown).is_empty());
        assert!(t.contains("1"));
    }

    #[test]
    fn expiry_boundary_is_strict() {
        let t = tracker();
        t.register(&[candidate("1", "a")], &channel("C1"), at(0));

        assert!(t.sweep_expired(at(1800)).is_empty());
        assert!(t.contains("1"));

        let expired = t.sweep_expired(at(1801));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].text, "a");
        assert_eq!(expired[0].allowed_wait(), TimeDelta::seconds(1800));
        assert!(!t.contains("1"));
        assert!(t.sweep_expired(at(5000)).is_empty());
    }

    #[test]
    fn answered_question_is_not_expired_later() {
        let t = tracker();
        t.register(&[candidate("1", "a")], &channel("C1"), at(0));
        assert_eq!(t.notify_message("C1", AuthorRole::Internal).len(), 1);
        assert!(t.sweep_expired(at(4000)).is_empty());
    }

    #[test]
    fn expired_question_is_not_answered_later() {
        let t = tracker();
        t.register(&[candidate("1", "a")], &channel("C1"), at(0));
        assert_eq!(t.sweep_expired(at(4000)).len(), 1);
        assert!(t.notify_message("C1", AuthorRole::Internal).is_empty());
    }

    #[test]
    fn re_registration_after_removal_tracks_again() {
        let t = tracker();
        t.register(&[candidate("1", "a")], &channel("C1"), at(0));
        t.notify_message("C1", AuthorRole::Internal);
        assert_eq!(t.register(&[candidate("1", "a")], &channel("C1"), at(10)), 1);
        assert_eq!(t.deadline("1"), Some(at(1810)));
    }
}
