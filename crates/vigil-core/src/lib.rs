// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Vigil channel monitor.
//!
//! This crate provides the error type, the shared domain types, and the
//! collaborator traits that the escalation engine depends on. Platform and
//! inference adapters implement the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

pub use error::VigilError;
pub use types::{
    AdapterType, AuthorRole, ChannelRef, Classification, DialogueTurn, GatewayEvent,
    HealthStatus, HistoryMessage, QuestionCandidate,
};

pub use traits::{
    AlertPoster, Classifier, HistorySource, IdentityResolver, PermalinkResolver, PluginAdapter,
    Summarizer,
};
