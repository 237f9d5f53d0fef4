// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits at the edge of the escalation engine.
//!
//! Every trait uses `#[async_trait]` so implementations can be held as
//! `Arc<dyn Trait>` by the engine. Calls through these traits are treated as
//! blocking I/O and are never made while a shared map is locked.

pub mod adapter;
pub mod alert;
pub mod classifier;
pub mod identity;
pub mod summarizer;

pub use adapter::PluginAdapter;
pub use alert::{AlertPoster, PermalinkResolver};
pub use classifier::Classifier;
pub use identity::{HistorySource, IdentityResolver};
pub use summarizer::Summarizer;
