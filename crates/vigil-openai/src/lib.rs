// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-backed collaborators for the Vigil channel monitor.
//!
//! [`OpenAiClassifier`] judges buffered batches; [`OpenAiSummarizer`] writes
//! the daily per-channel digest. Both share one [`OpenAiClient`].

pub mod classifier;
pub mod client;
mod prompts;
pub mod summarizer;
pub mod types;

pub use classifier::{OpenAiClassifier, parse_classification, render_dialogue};
pub use client::OpenAiClient;
pub use summarizer::OpenAiSummarizer;
