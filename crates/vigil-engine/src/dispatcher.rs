// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alert formatting and hand-off to the alert poster.
//!
//! The dispatcher holds no state. Each `dispatch_*` call resolves an optional
//! deep link, formats one message, and posts it once. Failures are logged and
//! reported through the returned `bool`; nothing is retried.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, info, warn};
use vigil_config::AlertsConfig;
use vigil_core::{AlertPoster, PermalinkResolver};

use crate::tracker::TrackedQuestion;

/// Formats alerts and posts them to their configured destinations.
#[derive(Clone)]
pub struct EscalationDispatcher {
    poster: Arc<dyn AlertPoster>,
    permalinks: Arc<dyn PermalinkResolver>,
    routes: AlertsConfig,
}

impl EscalationDispatcher {
    pub fn new(
        poster: Arc<dyn AlertPoster>,
        permalinks: Arc<dyn PermalinkResolver>,
        routes: AlertsConfig,
    ) -> Self {
        Self {
            poster,
            permalinks,
            routes,
        }
    }

    pub fn routes(&self) -> &AlertsConfig {
        &self.routes
    }

    /// Post a fire alert, linked to `anchor_ts` in `channel_id` when resolvable.
    pub async fn dispatch_fire(
        &self,
        client: &str,
        channel_id: &str,
        anchor_ts: Option<&str>,
        excerpt: &str,
    ) -> bool {
        let link = self.link(channel_id, anchor_ts).await;
        let text = format_fire_alert(client, excerpt, link.as_deref());
        self.post(&self.routes.client_alerts_channel, &text, "fire")
            .await
    }

    /// Post a testimonial alert, linked like [`dispatch_fire`](Self::dispatch_fire).
    pub async fn dispatch_testimonial(
        &self,
        client: &str,
        channel_id: &str,
        anchor_ts: Option<&str>,
        excerpt: &str,
    ) -> bool {
        let link = self.link(channel_id, anchor_ts).await;
        let text = format_testimonial_alert(client, excerpt, link.as_deref());
        self.post(&self.routes.testimonials_channel, &text, "testimonial")
            .await
    }

    pub async fn dispatch_expired_question(&self, question: &TrackedQuestion) -> bool {
        let link = self.link(&question.channel_id, Some(&question.id)).await;
        let text = format_expired_question_alert(
            &question.channel_name,
            &question.text,
            question.allowed_wait().num_minutes(),
            link.as_deref(),
        );
        self.post(&self.routes.client_alerts_channel, &text, "expired_question")
            .await
    }

    pub async fn dispatch_daily_summary(&self, client: &str, date: NaiveDate, body: &str) -> bool {
        let text = format_daily_summary(client, date, body);
        self.post(&self.routes.summaries_channel, &text, "daily_summary")
            .await
    }

    async fn link(&self, channel_id: &str, sequence_ts: Option<&str>) -> Option<String> {
        let ts = sequence_ts?;
        match self.permalinks.permalink(channel_id, ts).await {
            Ok(link) => link,
            Err(e) => {
                warn!(channel_id, sequence_ts = ts, error = %e, "permalink lookup failed, posting without link");
                None
            }
        }
    }

    async fn post(&self, destination: &str, text: &str, kind: &'static str) -> bool {
        match self.poster.post(destination, text).await {
            Ok(()) => {
                info!(kind, destination, "alert posted");
                true
            }
            Err(e) => {
                error!(kind, destination, error = %e, "failed to post alert");
                false
            }
        }
    }
}

/// Prefix every line of `text` with `> `.
fn quote(text: &str) -> String {
    text.lines()
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn with_link(mut body: String, link: Option<&str>, label: &str) -> String {
    if let Some(link) = link {
        body.push('\n');
        body.push_str(&format!("<{link}|{label}>"));
    }
    body
}

pub fn format_fire_alert(client: &str, excerpt: &str, link: Option<&str>) -> String {
    let body = format!(
        "🔥 Client Fire Detected for *{client}*!\n\n{}\n",
        quote(excerpt)
    );
    with_link(body, link, "Jump to conversation")
}

pub fn format_testimonial_alert(client: &str, excerpt: &str, link: Option<&str>) -> String {
    let body = format!("🌟 New Testimonial from *{client}*!\n\n{}\n", quote(excerpt));
    with_link(body, link, "Jump to conversation")
}

pub fn format_expired_question_alert(
    channel_name: &str,
    question: &str,
    minutes: i64,
    link: Option<&str>,
) -> String {
    let body = format!(
        "❓ Unanswered Question for *#{channel_name}* needs attention!\n\n{}\n\nThis question has been unanswered for {minutes} minutes.",
        quote(question)
    );
    with_link(body, link, "Jump to question")
}

pub fn format_daily_summary(client: &str, date: NaiveDate, body: &str) -> String {
    format!(
        "📝 *Daily Summary for {client} - {}*\n\n{body}",
        date.format("%B %d, %Y")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_alert_with_link() {
        let text = format_fire_alert("Acme", "Site is down", Some("https://x/p1"));
        assert_eq!(
            text,
            "🔥 Client Fire Detected for *Acme*!\n\n> Site is down\n\n<https://x/p1|Jump to conversation>"
        );
    }

    #[test]
    fn link_line_is_omitted_without_permalink() {
        let text = format_testimonial_alert("Acme", "Love it", None);
        assert_eq!(text, "🌟 New Testimonial from *Acme*!\n\n> Love it\n");
        assert!(!text.contains("Jump to"));
    }

    #[test]
    fn every_quoted_line_is_prefixed() {
        let text = format_fire_alert("Acme", "line one\nline two", None);
        assert!(text.contains("> line one\n> line two"));
    }

    #[test]
    fn expired_question_mentions_channel_and_wait() {
        let text = format_expired_question_alert("acme-support", "Is this broken?", 30, Some("L"));
        assert_eq!(
            text,
            "❓ Unanswered Question for *#acme-support* needs attention!\n\n> Is this broken?\n\nThis question has been unanswered for 30 minutes.\n<L|Jump to question>"
        );
    }

    #[test]
    fn daily_summary_header_uses_long_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let text = format_daily_summary("Acme", date, "*Key Concerns Raised*\n- none");
        assert!(text.starts_with("📝 *Daily Summary for Acme - March 07, 2026*\n\n"));
        assert!(text.ends_with("- none"));
    }
}
