// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classifier and summarizer tests against a mock completions endpoint.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use vigil_core::{
    AuthorRole, ChannelRef, Classifier, DialogueTurn, HistoryMessage, Summarizer, VigilError,
};
use vigil_directory::{ChannelDirectory, ChannelMetadata};
use vigil_openai::{OpenAiClassifier, OpenAiClient, OpenAiSummarizer};
use vigil_test_utils::MockIdentityResolver;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn completion(content: &str) -> Value {
    json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

fn client(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new("sk-test", &server.uri(), Duration::from_secs(5)).unwrap()
}

fn acme() -> ChannelRef {
    ChannelRef::new("C1", "acme-support")
}

fn directory() -> Arc<ChannelDirectory> {
    Arc::new(ChannelDirectory::from_entries(
        [ChannelMetadata {
            channel_name: "acme-support".into(),
            client_name: Some("Acme".into()),
            client_email_domain: Some("acme.io".into()),
            channel_url: None,
        }],
        &["vigil.dev".to_string()],
    ))
}

fn history(ts: &str, user: Option<&str>, text: Option<&str>, is_bot: bool) -> HistoryMessage {
    HistoryMessage {
        author_id: user.map(str::to_string),
        text: text.map(str::to_string),
        sequence_ts: ts.into(),
        is_bot,
    }
}

fn user_content(request: &Request) -> String {
    let body: Value = serde_json::from_slice(&request.body).unwrap();
    body["messages"][1]["content"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn classifier_sends_json_mode_request_and_parses_answer() {
    let server = MockServer::start().await;
    let answer = json!({
        "is_fire": true,
        "fire_text": "The dashboard is down again!",
        "is_testimonial": false,
        "testimonial_text": null,
        "is_question": true,
        "questions": [{"text": "When will it be fixed?", "timestamp": "1772470801.000200"}]
    })
    .to_string();
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "temperature": 0.0,
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&answer)))
        .expect(1)
        .mount(&server)
        .await;

    let classifier = OpenAiClassifier::new(client(&server), "gpt-3.5-turbo");
    let turns = [
        DialogueTurn {
            author_role: AuthorRole::Client,
            text: "The dashboard is down again!".into(),
            sequence_ts: "1772470800.000100".into(),
        },
        DialogueTurn {
            author_role: AuthorRole::Client,
            text: "When will it be fixed?".into(),
            sequence_ts: "1772470801.000200".into(),
        },
    ];
    let result = classifier.classify(&acme(), &turns).await.unwrap();
    assert_eq!(result.fire(), Some("The dashboard is down again!"));
    assert_eq!(result.pending_questions()[0].sequence_ts, "1772470801.000200");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        user_content(&requests[0]),
        "Client (timestamp: 1772470800.000100): The dashboard is down again!\n\
         Client (timestamp: 1772470801.000200): When will it be fixed?"
    );
}

#[tokio::test]
async fn classifier_reports_unparseable_answer_as_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("I think it's fine")))
        .mount(&server)
        .await;

    let classifier = OpenAiClassifier::new(client(&server), "gpt-3.5-turbo");
    let turns = [DialogueTurn {
        author_role: AuthorRole::Client,
        text: "hello".into(),
        sequence_ts: "1.0".into(),
    }];
    let err = classifier.classify(&acme(), &turns).await.unwrap_err();
    assert!(matches!(err, VigilError::MalformedResponse { .. }));
}

#[tokio::test]
async fn classifier_skips_empty_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let classifier = OpenAiClassifier::new(client(&server), "gpt-3.5-turbo");
    let result = classifier.classify(&acme(), &[]).await.unwrap();
    assert!(result.fire().is_none());
}

#[tokio::test]
async fn summarizer_labels_roles_and_times() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "gpt-4o"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("**Key Concerns Raised**\n- Outage\n")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let identity = Arc::new(MockIdentityResolver::new());
    identity.add_user("U1", "dana@acme.io").await;
    identity.add_user("U2", "sam@vigil.dev").await;
    identity
        .set_history(
            "C1",
            vec![
                history("1772473320.000100", Some("U1"), Some("Site is down"), false),
                history("1772473380.000100", Some("U2"), Some("On it"), false),
                history("1772473400.000100", None, Some("system note"), false),
                history("1772473440.000100", Some("B1"), Some("deploy finished"), true),
                history("1772473500.000100", Some("U3"), Some("who am I"), false),
                history("1772473560.000100", Some("U1"), Some("Thanks!"), false),
            ],
        )
        .await;

    let summarizer = OpenAiSummarizer::new(
        client(&server),
        "gpt-4o",
        identity.clone(),
        identity.clone(),
        directory(),
        "America/Los_Angeles".parse().unwrap(),
    );
    let summary = summarizer.summarize(&acme()).await.unwrap();
    assert_eq!(summary.as_deref(), Some("**Key Concerns Raised**\n- Outage"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        user_content(&requests[0]),
        "9:42 AM - Client: Site is down\n\
         9:43 AM - Internal: On it\n\
         9:45 AM - Unknown: who am I\n\
         9:46 AM - Client: Thanks!"
    );

    // U1 was resolved once for both of their messages.
    let lookups = identity.lookups().await;
    assert_eq!(lookups.iter().filter(|id| id.as_str() == "U1").count(), 1);
}

#[tokio::test]
async fn summarizer_returns_none_without_usable_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let identity = Arc::new(MockIdentityResolver::new());
    identity
        .set_history(
            "C1",
            vec![history("1772473440.000100", Some("B1"), Some("bot only"), true)],
        )
        .await;

    let summarizer = OpenAiSummarizer::new(
        client(&server),
        "gpt-4o",
        identity.clone(),
        identity.clone(),
        directory(),
        chrono_tz::UTC,
    );
    assert_eq!(summarizer.summarize(&acme()).await.unwrap(), None);
    assert_eq!(
        summarizer
            .summarize(&ChannelRef::new("C-empty", "quiet"))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn summarizer_propagates_history_failure() {
    let server = MockServer::start().await;
    let identity = Arc::new(MockIdentityResolver::new());
    identity.fail_lookup("C1").await;

    let summarizer = OpenAiSummarizer::new(
        client(&server),
        "gpt-4o",
        identity.clone(),
        identity.clone(),
        directory(),
        chrono_tz::UTC,
    );
    let err = summarizer.summarize(&acme()).await.unwrap_err();
    assert!(matches!(err, VigilError::Gateway { .. }));
}
