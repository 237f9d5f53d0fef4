// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch classification collaborator.

use async_trait::async_trait;

use crate::error::VigilError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChannelRef, Classification, DialogueTurn};

/// Judges one drained channel batch for fires, testimonials, and open questions.
#[async_trait]
pub trait Classifier: PluginAdapter {
    /// Classifies `turns`, which are in buffer order.
    ///
    /// An unparseable answer is reported as [`VigilError::MalformedResponse`].
    async fn classify(
        &self,
        channel: &ChannelRef,
        turns: &[DialogueTurn],
    ) -> Result<Classification, VigilError>;
}
