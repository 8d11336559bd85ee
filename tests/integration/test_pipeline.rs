//! End-to-end tests for the generation pipeline without the network layer.
//!
//! These tests validate the workflow from request submission through the
//! progress stream to the rendered question document.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use forge_document::{DocumentFormat, DocumentRenderer};
use forge_pipeline::{
    create_router, AppState, Config, ForgeError, GenerationClient, GenerationError, ItemCategory,
    JobRequest, JobResult, JobService, JobState, ProgressEvent, StreamFrame,
};

/// Client whose first attempt of every item is unusable, so each item
/// needs a retry.
struct FlakyClient {
    calls: AtomicUsize,
}

#[async_trait]
impl GenerationClient for FlakyClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call % 2 == 0 {
            return Ok("Sorry, I cannot help with that.".to_string());
        }
        let question = if prompt.contains("THEORETICAL") {
            "Which factors make a feedback conversation effective?"
        } else {
            "A senior engineer ignores review comments. How would you approach them?"
        };
        Ok(format!(
            "Q: {question}\nA: Prepare specific examples, listen first and agree on a follow-up date"
        ))
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.generation.retry_backoff_ms = 0;
    config.generation.pacing_delay_ms = 0;
    config.generation.max_attempts = 3;
    config
}

fn start_service() -> JobService {
    let client = FlakyClient {
        calls: AtomicUsize::new(0),
    };
    JobService::start(Arc::new(client), &test_config())
}

/// Submits a request and drains its stream, returning every event.
async fn run_to_completion(service: &JobService, request: JobRequest) -> Vec<ProgressEvent> {
    let job_id = service.submit(request).expect("Failed to submit job");
    let mut subscription = service.subscribe(job_id).expect("Failed to subscribe");

    let mut events = Vec::new();
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(10), subscription.next())
            .await
            .expect("Timeout waiting for progress");
        match frame {
            Some(StreamFrame::Event(event)) => events.push(event),
            Some(StreamFrame::KeepAlive) => {}
            None => break,
        }
    }
    events
}

fn completed_result(events: &[ProgressEvent]) -> JobResult {
    match events.last() {
        Some(ProgressEvent::Completed { result }) => result.clone(),
        other => panic!("Expected a completed event, got {other:?}"),
    }
}

/// Tests that retries recover unusable responses and every slot is filled.
#[tokio::test]
async fn test_retries_fill_every_slot() {
    let service = start_service();

    let events = run_to_completion(
        &service,
        JobRequest {
            topic: "Feedback Culture".to_string(),
            total_items: Some(5),
            difficulty_levels: Some(vec!["Beginner".to_string(), "Advanced".to_string()]),
            category_balance: Some(0.5),
        },
    )
    .await;

    let result = completed_result(&events);
    assert_eq!(result.total, 5);
    assert!(!result.quota_exhausted);
    assert_eq!(result.items("Beginner").len(), 3);
    assert_eq!(result.items("Advanced").len(), 2);

    let beginner: Vec<ItemCategory> = result.items("Beginner").iter().map(|i| i.category).collect();
    assert_eq!(
        beginner,
        vec![
            ItemCategory::Theory,
            ItemCategory::Practical,
            ItemCategory::Practical
        ]
    );
    assert!(result
        .items("Advanced")
        .iter()
        .all(|item| item.difficulty == "Advanced"));
    assert!(service.registry().is_empty());
}

/// Tests that request defaults come from configuration.
#[tokio::test]
async fn test_omitted_fields_use_configured_defaults() {
    let service = start_service();

    let events = run_to_completion(
        &service,
        JobRequest {
            topic: "  Hiring  ".to_string(),
            total_items: Some(3),
            ..JobRequest::default()
        },
    )
    .await;

    let result = completed_result(&events);
    assert_eq!(
        result.difficulty_levels,
        vec!["Beginner", "Intermediate", "Advanced"]
    );
    assert_eq!(result.total, 3);
    for level in &result.difficulty_levels {
        assert_eq!(result.items(level).len(), 1);
    }
}

/// Tests that invalid requests are rejected before a job is created.
#[tokio::test]
async fn test_invalid_request_is_rejected() {
    let service = start_service();

    let err = service
        .submit(JobRequest {
            topic: "Budgeting".to_string(),
            total_items: Some(1_000),
            ..JobRequest::default()
        })
        .unwrap_err();
    assert!(matches!(err, ForgeError::InvalidJobSpec { .. }));
    assert!(service.registry().is_empty());
}

/// Tests that a job keeps running while nobody is subscribed and its
/// progress is waiting for the first subscriber.
#[tokio::test]
async fn test_late_subscriber_receives_buffered_progress() {
    let service = start_service();
    let job_id = service
        .submit(JobRequest {
            topic: "Delegation".to_string(),
            total_items: Some(2),
            difficulty_levels: Some(vec!["Beginner".to_string()]),
            category_balance: None,
        })
        .expect("Failed to submit job");

    let mut state = JobState::Pending;
    for _ in 0..100 {
        state = service.status(job_id).expect("Job vanished").state;
        if state == JobState::Done {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(state, JobState::Done);

    let mut subscription = service.subscribe(job_id).expect("Failed to subscribe");
    assert_eq!(
        subscription.next().await,
        Some(StreamFrame::Event(ProgressEvent::Started))
    );
    while let Some(frame) = subscription.next().await {
        if let StreamFrame::Event(event) = frame {
            if event.is_terminal() {
                assert!(matches!(event, ProgressEvent::Completed { .. }));
            }
        }
    }
    assert!(subscription.is_finished());
}

/// Tests that a generated result renders into a question document.
#[tokio::test]
async fn test_result_renders_markdown_document() {
    let service = start_service();
    let events = run_to_completion(
        &service,
        JobRequest {
            topic: "Conflict Resolution".to_string(),
            total_items: Some(2),
            difficulty_levels: Some(vec!["Intermediate".to_string()]),
            category_balance: Some(0.5),
        },
    )
    .await;
    let result = completed_result(&events);

    let input = result.document_input("Conflict Resolution", Utc::now());
    assert_eq!(input.entry_count(), 2);

    let document = DocumentFormat::Markdown
        .renderer()
        .render(&input)
        .expect("Failed to render");
    assert!(document.filename.starts_with("Conflict_Resolution_"));
    assert!(document.filename.ends_with(".md"));
    assert!(document.body.contains("Conflict Resolution"));
    assert!(document.body.contains("## Intermediate Level"));
    assert!(document
        .body
        .contains("Which factors make a feedback conversation effective?"));
}

/// Tests the document endpoint with a result produced by the pipeline.
#[tokio::test]
async fn test_document_endpoint_accepts_job_result() {
    let service = start_service();
    let events = run_to_completion(
        &service,
        JobRequest {
            topic: "Change Management".to_string(),
            total_items: Some(2),
            difficulty_levels: Some(vec!["Beginner".to_string(), "Advanced".to_string()]),
            category_balance: Some(1.0),
        },
    )
    .await;
    let result = completed_result(&events);

    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("Failed to find a free port");
    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");
    let router = create_router(AppState::new(service.clone()));
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/document"))
        .json(&serde_json::json!({
            "topic": "Change Management",
            "questions": result.levels,
            "difficultyLevels": result.difficulty_levels,
            "format": "json",
        }))
        .send()
        .await
        .expect("Request failed");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let disposition = response
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
        .expect("Missing content-disposition");
    assert!(disposition.starts_with("attachment; filename=\"Change_Management_"));
    assert!(disposition.ends_with(".json\""));

    let body: serde_json::Value = response.json().await.expect("Invalid JSON document");
    let text = body.to_string();
    assert!(text.contains("Which factors make a feedback conversation effective?"));
    assert!(!text.contains("A senior engineer ignores review comments"));
}
