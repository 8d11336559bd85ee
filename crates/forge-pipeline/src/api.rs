//! HTTP API for the Interview Forge service.
//!
//! # Endpoints
//!
//! - `POST /api/jobs` - Accept a generation job, returns `202 {jobId}`
//! - `GET /api/jobs/{id}` - Snapshot of a job
//! - `GET /api/jobs/{id}/stream` - Server-Sent Events progress stream
//! - `POST /api/document` - Render a question set as a downloadable document
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use forge_pipeline::{create_router, AppState, Config, GeminiClient, JobService};
//!
//! # async fn example() {
//! let config = Config::default();
//! let client = GeminiClient::new(&config.provider, "api-key").unwrap();
//! let service = JobService::start(Arc::new(client), &config);
//!
//! let router = create_router(AppState::new(service));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:10000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use forge_document::DocumentFormat;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::error::ForgeError;
use crate::job::{document_input, GeneratedItem, JobId, JobRequest};
use crate::registry::JobStatus;
use crate::service::JobService;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response body for an accepted job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    /// Identifier to subscribe with.
    pub job_id: JobId,
}

/// Request body for the document endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRequest {
    /// Topic shown in the title and filename.
    pub topic: String,
    /// Items per difficulty level.
    #[serde(default)]
    pub questions: IndexMap<String, Vec<GeneratedItem>>,
    /// Display order of the levels. Defaults to the order of `questions`.
    #[serde(default)]
    pub difficulty_levels: Vec<String>,
    /// Output format.
    #[serde(default)]
    pub format: DocumentFormat,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The job service behind every endpoint.
    pub service: JobService,
}

impl AppState {
    /// Creates a new `AppState` around a running service.
    #[must_use]
    pub const fn new(service: JobService) -> Self {
        Self { service }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Maps service errors onto HTTP responses.
#[derive(Debug)]
struct ApiError(ForgeError);

impl From<ForgeError> for ApiError {
    fn from(error: ForgeError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ForgeError::InvalidJobSpec { .. } | ForgeError::Document(_) => StatusCode::BAD_REQUEST,
            ForgeError::InvalidJob { .. } => StatusCode::NOT_FOUND,
            ForgeError::SubscriberAttached { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if !self.0.is_client_error() {
            warn!(error = %self.0, "Request failed");
        }

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// All routes live under `/api`, with permissive CORS so a browser front end
/// served from another origin can subscribe, and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/jobs", post(handle_submit))
        .route("/jobs/:id", get(handle_status))
        .route("/jobs/:id/stream", get(handle_stream))
        .route("/document", post(handle_document));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `POST /api/jobs`.
async fn handle_submit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JobRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let job_id = state.service.submit(request)?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id })))
}

/// Handler for `GET /api/jobs/{id}`.
async fn handle_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobStatus>, ApiError> {
    let job_id: JobId = id.parse()?;
    Ok(Json(state.service.status(job_id)?))
}

/// Handler for `GET /api/jobs/{id}/stream`.
async fn handle_stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let job_id: JobId = id.parse()?;
    let subscription = state.service.subscribe(job_id)?;
    info!(%job_id, "Progress stream opened");
    Ok(subscription.into_sse().into_response())
}

/// Handler for `POST /api/document`.
async fn handle_document(Json(request): Json<DocumentRequest>) -> Result<Response, ApiError> {
    let levels = if request.difficulty_levels.is_empty() {
        request.questions.keys().cloned().collect()
    } else {
        request.difficulty_levels
    };

    let input = document_input(&request.topic, &levels, &request.questions, Utc::now());
    let document = request
        .format
        .renderer()
        .render(&input)
        .map_err(ForgeError::from)?;

    info!(
        topic = %request.topic,
        entries = input.entry_count(),
        filename = %document.filename,
        "Rendered document"
    );

    Ok((
        [
            (header::CONTENT_TYPE, document.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", document.filename),
            ),
        ],
        document.body,
    )
        .into_response())
}
