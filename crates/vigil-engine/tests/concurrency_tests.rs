// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Races between ingestion, sweeps, and the periodic job loops.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Barrier, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use vigil_core::{AuthorRole, ChannelRef, QuestionCandidate};
use vigil_engine::shutdown::drain_jobs;
use vigil_engine::{
    AppendOutcome, BufferedMessage, ChannelBufferStore, IngestOutcome, QuestionTracker,
    ScheduleSettings,
};
use vigil_test_utils::{TestHarness, event};

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

fn message(ts: String) -> BufferedMessage {
    BufferedMessage {
        channel_id: "C1".into(),
        channel_name: "acme".into(),
        author_id: "U1".into(),
        author_role: AuthorRole::Client,
        text: format!("msg {ts}"),
        sequence_ts: ts,
        dedup_key: None,
        received_at: at(0),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_and_drains_lose_nothing() {
    const WRITERS: usize = 8;
    const PER_WRITER: usize = 500;

    let store = Arc::new(ChannelBufferStore::new());
    let done = CancellationToken::new();

    let drainer = {
        let store = store.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while !done.is_cancelled() {
                seen.extend(store.drain("C1"));
                tokio::task::yield_now().await;
            }
            seen.extend(store.drain("C1"));
            seen
        })
    };

    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..PER_WRITER {
                    store.append("C1", message(format!("{w}.{i}")));
                    if i % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        })
        .collect();

    for w in writers {
        w.await.unwrap();
    }
    done.cancel();
    let seen = drainer.await.unwrap();

    assert_eq!(seen.len(), WRITERS * PER_WRITER);
    let unique: HashSet<&str> = seen.iter().map(|m| m.sequence_ts.as_str()).collect();
    assert_eq!(unique.len(), WRITERS * PER_WRITER);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn answer_and_expiry_never_both_claim_a_question() {
    let channel = ChannelRef::new("C1", "acme");

    for round in 0..200 {
        let tracker = Arc::new(QuestionTracker::new(Duration::from_secs(60)));
        let id = format!("{round}.0001");
        tracker.register(
            &[QuestionCandidate {
                text: "Any update?".into(),
                sequence_ts: id.clone(),
            }],
            &channel,
            at(0),
        );

        let barrier = Arc::new(Barrier::new(2));
        let answer = {
            let tracker = tracker.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                tracker.notify_message("C1", AuthorRole::Internal).len()
            })
        };
        let expire = {
            let tracker = tracker.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                tracker.sweep_expired(at(61)).len()
            })
        };

        let answered = answer.await.unwrap();
        let expired = expire.await.unwrap();
        assert_eq!(answered + expired, 1, "round {round}: both or neither claimed");
        assert!(!tracker.contains(&id));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_sweep_is_skipped() {
    let h = TestHarness::builder()
        .with_client_channel("C1", "acme-support", Some("Acme"), "acme.com")
        .with_user("U1", "jo@acme.com")
        .with_gated_classifier()
        .build()
        .await;

    h.say("C1", "U1", "hello", "1").await;
    h.advance_secs(301);

    let first = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.run_inactivity_sweep().await })
    };
    h.classifier.wait_for_calls(1).await;
    assert!(h.engine.inactivity_guard().is_running());

    let second = h.engine.run_inactivity_sweep().await;
    assert!(second.skipped);
    assert_eq!(second.channels_flushed, 0);

    // A different job is not blocked by the stuck sweep.
    assert!(!h.engine.run_expiry_sweep().await.skipped);

    h.classifier.release(1);
    let first = first.await.unwrap();
    assert!(!first.skipped);
    assert_eq!(first.channels_flushed, 1);

    assert!(!h.engine.run_inactivity_sweep().await.skipped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn message_arriving_mid_flush_starts_fresh_buffer() {
    let h = TestHarness::builder()
        .with_client_channel("C1", "acme-support", Some("Acme"), "acme.com")
        .with_user("U1", "jo@acme.com")
        .with_gated_classifier()
        .build()
        .await;

    h.say("C1", "U1", "before", "1").await;
    h.advance_secs(301);

    let sweep = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.run_inactivity_sweep().await })
    };
    h.classifier.wait_for_calls(1).await;

    let outcome = h.say("C1", "U1", "during", "2").await;
    assert!(matches!(
        outcome,
        IngestOutcome::Buffered {
            append: AppendOutcome::Appended { len: 1 },
            ..
        }
    ));

    h.classifier.release(1);
    sweep.await.unwrap();

    let calls = h.classifier.calls().await;
    assert_eq!(calls[0].turns.len(), 1);
    assert_eq!(calls[0].turns[0].text, "before");
    let remaining = h.engine.buffers().snapshot("C1");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].text, "during");
}

#[tokio::test(start_paused = true)]
async fn spawned_jobs_run_on_their_intervals_and_stop_on_cancel() {
    let settings = ScheduleSettings {
        inactivity_sweep_interval: Duration::from_secs(60),
        expiry_sweep_interval: Duration::from_secs(60),
        ..ScheduleSettings::default()
    };
    let h = TestHarness::builder()
        .with_client_channel("C1", "acme-support", Some("Acme"), "acme.com")
        .with_user("U1", "jo@acme.com")
        .with_settings(settings)
        .build()
        .await;

    h.say("C1", "U1", "hello", "1").await;
    h.advance_secs(301);

    let cancel = CancellationToken::new();
    let handles = h.engine.spawn(cancel.clone());
    assert_eq!(handles.len(), 3);

    // Nothing runs before the first full interval.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.classifier.call_count().await, 0);

    tokio::time::sleep(Duration::from_secs(31)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.classifier.call_count().await, 1);
    assert_eq!(h.engine.buffers().len("C1"), 0);

    cancel.cancel();
    assert_eq!(drain_jobs(handles, Duration::from_secs(5)).await, 0);
}

async fn ordering_harness() -> TestHarness {
    TestHarness::builder()
        .with_client_channel("C1", "acme", Some("Acme"), "acme.com")
        .with_client_channel("C2", "globex", Some("Globex"), "globex.io")
        .with_user("U1", "jo@acme.com")
        .with_user("U2", "ana@globex.io")
        .with_user("U_TEAM", "sam@vigil.dev")
        .build()
        .await
}

async fn run_ingestor(h: &TestHarness, events: Vec<vigil_core::GatewayEvent>) {
    let (tx, rx) = mpsc::channel(events.len().max(1));
    for e in events {
        tx.send(e).await.unwrap();
    }
    drop(tx);

    let workers = TaskTracker::new();
    h.ingestor.run(rx, &workers).await;
    workers.close();
    workers.wait().await;
}

#[tokio::test]
async fn edit_is_not_overtaken_by_slow_original() {
    let h = ordering_harness().await;
    h.identity
        .delay_next_lookup("U1", Duration::from_millis(50))
        .await;

    run_ingestor(
        &h,
        vec![
            event("C1", "U1", "helo", "1.000100", Some("k1")),
            event("C1", "U1", "hello (edited)", "1.000100", Some("k1")),
        ],
    )
    .await;

    let buffered = h.engine.buffers().snapshot("C1");
    assert_eq!(buffered.len(), 1);
    assert_eq!(buffered[0].text, "hello (edited)");
}

#[tokio::test]
async fn channel_keeps_arrival_order_while_other_channels_proceed() {
    let h = ordering_harness().await;
    h.identity
        .delay_next_lookup("U1", Duration::from_millis(50))
        .await;

    run_ingestor(
        &h,
        vec![
            event("C1", "U1", "first", "1.000100", None),
            event("C2", "U2", "elsewhere", "1.000200", None),
            event("C1", "U_TEAM", "second", "1.000300", None),
        ],
    )
    .await;

    let c1: Vec<String> = h
        .engine
        .buffers()
        .snapshot("C1")
        .into_iter()
        .map(|m| m.text)
        .collect();
    assert_eq!(c1, vec!["first", "second"]);
    assert_eq!(h.engine.buffers().len("C2"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_activity_never_moves_backwards_under_concurrent_appends() {
    let store = Arc::new(ChannelBufferStore::new());
    let writers: Vec<_> = (0..8i64)
        .map(|w| {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..100i64 {
                    let mut m = message(format!("{w}.{i}"));
                    // Stamps interleave out of order across writers.
                    m.received_at = at((w * 37 + i * 11) % 500);
                    store.append("C1", m);
                    let seen = store.last_activity("C1").unwrap();
                    assert!(seen >= at((w * 37 + i * 11) % 500));
                }
            })
        })
        .collect();
    for w in writers {
        w.await.unwrap();
    }

    let latest = store.snapshot("C1").iter().map(|m| m.received_at).max();
    assert_eq!(store.last_activity("C1"), latest);
}
