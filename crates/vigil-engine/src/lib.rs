// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation buffering and escalation engine.
//!
//! Messages from monitored channels are buffered per channel until the
//! channel goes quiet. The quiet channel's batch is then classified, fires and
//! testimonials are alerted, and client questions are tracked until a team
//! member replies or the deadline passes. A daily job posts per-channel
//! summaries.
//!
//! All state lives in memory in an explicitly constructed
//! [`EscalationEngine`]; nothing survives a restart.

pub mod buffer;
pub mod clock;
pub mod daily;
pub mod dispatcher;
pub mod ingest;
pub mod scheduler;
pub mod shutdown;
pub mod tracker;

pub use buffer::{AppendOutcome, BufferedMessage, ChannelBufferStore};
pub use clock::{Clock, SystemClock};
pub use daily::{next_daily_run, summary_date};
pub use dispatcher::{
    EscalationDispatcher, format_daily_summary, format_expired_question_alert, format_fire_alert,
    format_testimonial_alert,
};
pub use ingest::{IgnoreReason, IngestOutcome, Ingestor};
pub use scheduler::{
    Collaborators, EscalationEngine, ExpiryReport, JobGuard, JobPermit, ScheduleSettings,
    SummaryReport, SweepReport, UNKNOWN_CLIENT,
};
pub use tracker::{QuestionTracker, TrackedQuestion};
