// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingestion of single gateway events into the buffer store and tracker.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};
use vigil_core::{AuthorRole, ChannelRef, GatewayEvent, IdentityResolver};
use vigil_directory::ChannelDirectory;

use crate::buffer::{AppendOutcome, BufferedMessage, ChannelBufferStore};
use crate::clock::Clock;
use crate::tracker::QuestionTracker;

/// Why an event was not buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    MissingAuthor,
    MissingText,
    /// The channel id could not be resolved to a name.
    UnresolvedChannel,
    /// The channel has no directory entry.
    Unmonitored,
    /// The author's email could not be looked up.
    UnresolvedAuthor,
}

/// What [`Ingestor::ingest`] did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Buffered {
        channel: ChannelRef,
        role: AuthorRole,
        append: AppendOutcome,
        /// Questions this message marked as answered.
        answered: usize,
    },
    Ignored(IgnoreReason),
}

/// Entry point for messages arriving from the chat gateway.
///
/// Cheap to clone; every clone feeds the same buffer store and tracker.
#[derive(Clone)]
pub struct Ingestor {
    buffers: Arc<ChannelBufferStore>,
    tracker: Arc<QuestionTracker>,
    identity: Arc<dyn IdentityResolver>,
    directory: Arc<ChannelDirectory>,
    clock: Arc<dyn Clock>,
}

impl Ingestor {
    pub fn new(
        buffers: Arc<ChannelBufferStore>,
        tracker: Arc<QuestionTracker>,
        identity: Arc<dyn IdentityResolver>,
        directory: Arc<ChannelDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            buffers,
            tracker,
            identity,
            directory,
            clock,
        }
    }

    /// Buffer one event and let the tracker see who wrote it.
    ///
    /// Events without an author or text, in unmonitored channels, or whose
    /// channel or author cannot be resolved are dropped before anything is
    /// stored. The append happens before the tracker is notified.
    pub async fn ingest(&self, event: GatewayEvent) -> IngestOutcome {
        let Some(author_id) = event.author_id.filter(|a| !a.trim().is_empty()) else {
            return ignored(&event.channel_id, IgnoreReason::MissingAuthor);
        };
        let Some(text) = event.text.filter(|t| !t.trim().is_empty()) else {
            return ignored(&event.channel_id, IgnoreReason::MissingText);
        };

        let channel_name = match self.identity.channel_name(&event.channel_id).await {
            Ok(Some(name)) => name,
            Ok(None) => return ignored(&event.channel_id, IgnoreReason::UnresolvedChannel),
            Err(e) => {
                warn!(channel_id = %event.channel_id, error = %e, "channel lookup failed, dropping message");
                return IngestOutcome::Ignored(IgnoreReason::UnresolvedChannel);
            }
        };

        if !self.directory.is_monitored(&channel_name) {
            return ignored(&event.channel_id, IgnoreReason::Unmonitored);
        }

        let email = match self.identity.user_email(&author_id).await {
            Ok(Some(email)) => email,
            Ok(None) => return ignored(&event.channel_id, IgnoreReason::UnresolvedAuthor),
            Err(e) => {
                warn!(author_id = %author_id, error = %e, "user lookup failed, dropping message");
                return IngestOutcome::Ignored(IgnoreReason::UnresolvedAuthor);
            }
        };
        let role = self.directory.resolve_role(&email, &channel_name);

        let message = BufferedMessage {
            channel_id: event.channel_id.clone(),
            channel_name: channel_name.clone(),
            author_id,
            author_role: role,
            text,
            sequence_ts: event.sequence_ts,
            dedup_key: event.dedup_key,
            received_at: self.clock.now(),
        };
        let append = self.buffers.append(&event.channel_id, message);
        let answered = self.tracker.notify_message(&event.channel_id, role).len();

        debug!(
            channel = %channel_name,
            role = %role,
            ?append,
            answered,
            "message buffered"
        );

        IngestOutcome::Buffered {
            channel: ChannelRef::new(event.channel_id, channel_name),
            role,
            append,
            answered,
        }
    }

    /// Ingest every event from `events` until the sender side closes.
    ///
    /// Each channel gets one worker on `workers` that ingests that channel's
    /// events in arrival order, so an edit can never be overtaken by the
    /// message it replaces. Different channels proceed concurrently.
    pub async fn run(&self, mut events: mpsc::Receiver<GatewayEvent>, workers: &TaskTracker) {
        let mut queues: HashMap<String, mpsc::UnboundedSender<GatewayEvent>> = HashMap::new();
        while let Some(event) = events.recv().await {
            let queue = queues.entry(event.channel_id.clone()).or_insert_with(|| {
                let (tx, rx) = mpsc::unbounded_channel();
                workers.spawn(self.clone().ingest_queue(rx));
                tx
            });
            if let Err(mpsc::error::SendError(event)) = queue.send(event) {
                warn!(channel_id = %event.channel_id, "channel worker stopped, dropping message");
            }
        }
        debug!(channels = queues.len(), "event stream closed");
    }

    async fn ingest_queue(self, mut queue: mpsc::UnboundedReceiver<GatewayEvent>) {
        while let Some(event) = queue.recv().await {
            self.ingest(event).await;
        }
    }
}

fn ignored(channel_id: &str, reason: IgnoreReason) -> IngestOutcome {
    debug!(channel_id, ?reason, "message ignored");
    IngestOutcome::Ignored(reason)
}
