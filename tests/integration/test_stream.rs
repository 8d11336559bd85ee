//! Integration tests for job submission and progress streaming over HTTP.
//!
//! These tests start the real router on a local port, drive it with a
//! scripted generation client and read the Server-Sent Events stream with
//! `reqwest`.

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use forge_pipeline::{
    create_router, AppState, Config, GenerationClient, GenerationError, JobService,
};
use serde_json::{json, Value};

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Client that answers well-formed items and reports quota exhaustion on a
/// chosen call.
struct ScriptedClient {
    calls: AtomicUsize,
    quota_on_call: Option<usize>,
}

impl ScriptedClient {
    fn new(quota_on_call: Option<usize>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            quota_on_call,
        }
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.quota_on_call == Some(call) {
            return Err(GenerationError::QuotaExceeded {
                message: "429 RESOURCE_EXHAUSTED: quota exceeded".to_string(),
            });
        }
        let question = if prompt.contains("THEORETICAL") {
            format!("What principle underpins effective delegation (case {call})?")
        } else {
            format!("Your team missed a deadline in sprint {call}. How do you respond?")
        };
        Ok(format!(
            "Q: {question}\nA: Clarify ownership, agree on next steps with the team and follow up in writing"
        ))
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.generation.retry_backoff_ms = 0;
    config.generation.pacing_delay_ms = 0;
    config
}

/// Spawns the test server and returns its base URL.
async fn spawn_test_server(client: ScriptedClient) -> (String, JobService) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let service = JobService::start(Arc::new(client), &test_config());
    let router = create_router(AppState::new(service.clone()));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{addr}"), service)
}

async fn submit(http: &reqwest::Client, base: &str, body: &Value) -> String {
    let response = http
        .post(format!("{base}/api/jobs"))
        .json(body)
        .send()
        .await
        .expect("Submit request failed");
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    let body: Value = response.json().await.expect("Invalid submit body");
    body["jobId"]
        .as_str()
        .expect("jobId missing from response")
        .to_string()
}

/// Reads the whole stream and returns `(event name, data)` pairs, skipping
/// keep-alives.
async fn read_stream(http: &reqwest::Client, base: &str, job_id: &str) -> Vec<(String, Value)> {
    let response = tokio::time::timeout(
        Duration::from_secs(10),
        http.get(format!("{base}/api/jobs/{job_id}/stream")).send(),
    )
    .await
    .expect("Timeout opening stream")
    .expect("Stream request failed");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/event-stream")));

    let body = tokio::time::timeout(Duration::from_secs(10), response.text())
        .await
        .expect("Timeout reading stream")
        .expect("Failed to read stream body");

    parse_sse(&body)
}

fn parse_sse(body: &str) -> Vec<(String, Value)> {
    let mut frames = Vec::new();
    let mut name = String::new();
    for line in body.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            name = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            if name != "ping" {
                let data: Value = serde_json::from_str(value.trim()).expect("Invalid event data");
                frames.push((name.clone(), data));
            }
        }
    }
    frames
}

fn names(frames: &[(String, Value)]) -> Vec<&str> {
    frames.iter().map(|(name, _)| name.as_str()).collect()
}

/// Tests the full happy path: every item is produced and announced in order.
#[tokio::test]
async fn test_stream_delivers_full_job() {
    let (base, _service) = spawn_test_server(ScriptedClient::new(None)).await;
    let http = reqwest::Client::new();

    let job_id = submit(
        &http,
        &base,
        &json!({
            "topic": "Team Leadership",
            "totalItems": 4,
            "difficultyLevels": ["Beginner", "Advanced"],
            "categoryBalance": 0.5
        }),
    )
    .await;

    let frames = read_stream(&http, &base, &job_id).await;
    assert_eq!(
        names(&frames),
        vec![
            "started",
            "level_started",
            "item_generating",
            "item_complete",
            "item_generating",
            "item_complete",
            "level_complete",
            "level_started",
            "item_generating",
            "item_complete",
            "item_generating",
            "item_complete",
            "level_complete",
            "completed",
        ]
    );

    // Every data frame carries its own tag.
    for (name, data) in &frames {
        assert_eq!(data["event"], json!(name));
    }

    let (_, completed) = frames.last().expect("No frames");
    let result = &completed["payload"]["result"];
    assert_eq!(result["total"], json!(4));
    assert_eq!(result["quotaExhausted"], json!(false));
    assert_eq!(result["levels"]["Beginner"].as_array().map(Vec::len), Some(2));
    assert_eq!(result["levels"]["Advanced"].as_array().map(Vec::len), Some(2));
    assert_eq!(result["levels"]["Beginner"][0]["category"], json!("theory"));
    assert_eq!(result["levels"]["Beginner"][1]["category"], json!("practical"));

    let progress: Vec<u64> = frames
        .iter()
        .filter(|(name, _)| name == "item_complete")
        .filter_map(|(_, data)| data["payload"]["progress"].as_u64())
        .collect();
    assert_eq!(progress, vec![25, 50, 75, 100]);
}

/// Tests that a quota signal stops generation and still completes the job
/// with the partial result.
#[tokio::test]
async fn test_quota_stops_job_with_partial_result() {
    let (base, _service) = spawn_test_server(ScriptedClient::new(Some(4))).await;
    let http = reqwest::Client::new();

    let job_id = submit(
        &http,
        &base,
        &json!({
            "topic": "Negotiation",
            "totalItems": 6,
            "difficultyLevels": ["Beginner", "Advanced"],
        }),
    )
    .await;

    let frames = read_stream(&http, &base, &job_id).await;
    let names = names(&frames);
    assert_eq!(names.iter().filter(|n| **n == "item_complete").count(), 3);
    assert_eq!(names.iter().filter(|n| **n == "level_complete").count(), 1);
    assert_eq!(
        &names[names.len() - 3..],
        &["item_generating", "quota_exceeded", "completed"]
    );

    let (_, completed) = frames.last().expect("No frames");
    let result = &completed["payload"]["result"];
    assert_eq!(result["total"], json!(3));
    assert_eq!(result["quotaExhausted"], json!(true));
    assert_eq!(result["levels"]["Beginner"].as_array().map(Vec::len), Some(3));
    assert_eq!(result["levels"]["Advanced"], json!([]));
}

/// Tests that a job is retired once its terminal event has been streamed.
#[tokio::test]
async fn test_job_is_retired_after_stream_ends() {
    let (base, service) = spawn_test_server(ScriptedClient::new(None)).await;
    let http = reqwest::Client::new();

    let job_id = submit(
        &http,
        &base,
        &json!({ "topic": "Coaching", "totalItems": 1, "difficultyLevels": ["Beginner"] }),
    )
    .await;

    let frames = read_stream(&http, &base, &job_id).await;
    assert_eq!(frames.last().map(|(n, _)| n.as_str()), Some("completed"));

    // Give the server a moment to drop the finished stream
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(service.registry().is_empty());

    let again = http
        .get(format!("{base}/api/jobs/{job_id}/stream"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(again.status(), reqwest::StatusCode::NOT_FOUND);

    let status = http
        .get(format!("{base}/api/jobs/{job_id}"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(status.status(), reqwest::StatusCode::NOT_FOUND);
}

/// Tests that an unknown job id cannot be streamed.
#[tokio::test]
async fn test_unknown_job_stream_returns_404() {
    let (base, _service) = spawn_test_server(ScriptedClient::new(None)).await;
    let http = reqwest::Client::new();

    let response = http
        .get(format!(
            "{base}/api/jobs/3f0e8a52-8a77-4c1e-9d3c-0b4b3f1c2d10/stream"
        ))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    let body: Value = response.json().await.expect("Invalid error body");
    assert!(body["error"].as_str().is_some());
}
