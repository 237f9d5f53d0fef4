// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Vigil integration tests.
//!
//! Mock implementations of every collaborator trait, a manually advanced
//! clock, and a [`TestHarness`] that wires them into an engine.

pub mod clock;
pub mod harness;
pub mod mock_alerts;
pub mod mock_classifier;
pub mod mock_identity;
pub mod mock_summarizer;

pub use clock::ManualClock;
pub use harness::{TEAM_DOMAIN, TestHarness, TestHarnessBuilder, event};
pub use mock_alerts::{MockAlertPoster, MockPermalinks, PostedAlert};
pub use mock_classifier::{ClassifyCall, MockClassifier, MockVerdict};
pub use mock_identity::MockIdentityResolver;
pub use mock_summarizer::MockSummarizer;
