//! Integration tests for the digest HTTP API.
//!
//! Each test spins up an Axum server on a random port, backed by a fixture
//! mail source and a stub LLM, and exercises the real REST contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use inbox_digest::api::{AppState, digest_routes};
use inbox_digest::digest::{CategorizerConfig, DigestService, LlmCategorizer};
use inbox_digest::error::{LlmError, MailError};
use inbox_digest::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use inbox_digest::mail::{FixtureMailSource, MailSource, RawEmail};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Stub LLM provider for integration tests (no real API calls).
struct StubLlm {
    reply: Option<Value>,
}

#[async_trait]
impl LlmProvider for StubLlm {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        match &self.reply {
            Some(reply) => Ok(CompletionResponse {
                content: reply.to_string(),
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: FinishReason::Stop,
                response_id: None,
            }),
            None => Err(LlmError::RequestFailed {
                provider: "stub".into(),
                reason: "upstream unavailable".into(),
            }),
        }
    }
}

struct BrokenMailbox;

#[async_trait]
impl MailSource for BrokenMailbox {
    fn name(&self) -> &str {
        "broken"
    }

    async fn fetch(&self, _n: usize) -> Result<Vec<RawEmail>, MailError> {
        Err(MailError::AuthFailed {
            username: "digest@example.com".into(),
        })
    }
}

/// A summary that passes the default validation policy.
fn rich_summary(title: &str) -> String {
    let mut lines = vec![format!("# 📬 {title}")];
    for section in ["Overview", "Highlights", "⚠️ Important", "Next steps"] {
        lines.push(format!("## {section}"));
        lines.push(format!("The first email in {title} sets the context."));
        lines.push("- The second email follows up.".to_string());
        lines.push("- The last email closes the thread.".to_string());
        lines.push("**⚠️ Important:** read the third email in detail.".to_string());
    }
    lines.join("\n")
}

fn reply(entries: &[(&str, Vec<i64>)]) -> Value {
    let summaries: Vec<Value> = entries
        .iter()
        .map(|(category, ids)| {
            json!({"category": category, "ids": ids, "summary": rich_summary(category)})
        })
        .collect();
    json!({ "summaries": summaries })
}

/// Start an Axum server on a random port, return the port.
async fn start_server(source: Arc<dyn MailSource>, llm_reply: Option<Value>) -> u16 {
    let llm: Arc<dyn LlmProvider> = Arc::new(StubLlm { reply: llm_reply });
    let categorizer = Arc::new(LlmCategorizer::new(llm, CategorizerConfig::default()));
    let app = digest_routes(AppState {
        service: Arc::new(DigestService::new(source, categorizer)),
        default_limit: 20,
        max_limit: 100,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    port
}

async fn start_fixture_server(llm_reply: Option<Value>) -> u16 {
    start_server(Arc::new(FixtureMailSource::sample()), llm_reply).await
}

#[tokio::test]
async fn health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let port = start_fixture_server(None).await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "inbox-digest");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn fetch_emails_returns_ingested_batch() {
    timeout(TEST_TIMEOUT, async {
        let port = start_fixture_server(None).await;

        let resp = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}/emails?limit=3"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        let emails = body["emails"].as_array().unwrap();
        assert_eq!(emails.len(), 3);
        assert_eq!(emails[0]["id"], 0);
        assert_eq!(emails[2]["id"], 2);
        assert_eq!(emails[0]["subject"], "Meeting follow-up");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn fetch_emails_uses_default_limit() {
    timeout(TEST_TIMEOUT, async {
        let port = start_fixture_server(None).await;

        let resp = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}/emails"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["emails"].as_array().unwrap().len(), 20);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn analyse_returns_resolved_categories() {
    timeout(TEST_TIMEOUT, async {
        let llm_reply = reply(&[
            ("Support", vec![4, 2, 99, -1]),
            ("Social", vec![0, 1, 3]),
            ("Everything", vec![0, 1, 2, 3, 4]),
        ]);
        let port = start_fixture_server(Some(llm_reply)).await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/analyse?limit=5"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        // Categories come back in response order.
        let text = resp.text().await.unwrap();
        let support_at = text.find("\"Support\":{").unwrap();
        let social_at = text.find("\"Social\":{").unwrap();
        let everything_at = text.find("\"Everything\":{").unwrap();
        assert!(support_at < social_at && social_at < everything_at);

        let body: Value = serde_json::from_str(&text).unwrap();
        let analysis = body["analysis"].as_object().unwrap();
        assert_eq!(analysis.len(), 3);

        let support = &analysis["Support"];
        assert_eq!(support["email_count"], 2);
        assert_eq!(support["emails"][0]["id"], 2);
        assert_eq!(support["emails"][1]["id"], 4);
        assert!(support["global_summary"].as_str().unwrap().starts_with("# 📬 Support"));

        assert_eq!(analysis["Everything"]["email_count"], 5);

        let warnings = body["warnings"].as_array().unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w["kind"] == "dangling_id"));
        assert_eq!(warnings[0]["id"], -1);
        assert_eq!(warnings[1]["id"], 99);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn analyse_rejects_too_few_categories() {
    timeout(TEST_TIMEOUT, async {
        let llm_reply = reply(&[("Support", vec![2, 4]), ("Social", vec![0, 1, 3])]);
        let port = start_fixture_server(Some(llm_reply)).await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/analyse?limit=5"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 502);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "schema_violation");
        assert_eq!(body["retryable"], false);
        assert!(body.get("analysis").is_none());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn analyse_reports_retryable_generation_failure() {
    timeout(TEST_TIMEOUT, async {
        let port = start_fixture_server(None).await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/analyse?limit=5"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 503);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "generation_failure");
        assert_eq!(body["retryable"], true);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn analyse_empty_inbox() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server(Arc::new(FixtureMailSource::new(Vec::new())), None).await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/analyse"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "empty_batch");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn mail_failure_is_ingestion_failure() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server(Arc::new(BrokenMailbox), None).await;

        let resp = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}/emails"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 502);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "ingestion_failure");
        assert_eq!(body["retryable"], false);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn invalid_limit_is_bad_request() {
    timeout(TEST_TIMEOUT, async {
        let port = start_fixture_server(None).await;

        for query in ["limit=0", "limit=101", "limit=lots"] {
            let resp = reqwest::get(format!("http://127.0.0.1:{port}/analyse?{query}"))
                .await
                .unwrap();
            assert_eq!(resp.status(), 400, "{query}");

            let body: Value = resp.json().await.unwrap();
            assert_eq!(body["error"], "bad_request");
        }
    })
    .await
    .expect("test timed out");
}
