//! Interview Forge generation pipeline
//!
//! Runs question/answer generation jobs in the background, streams their
//! progress over Server-Sent Events and exposes the HTTP API.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod generator;
pub mod job;
pub mod orchestrator;
pub mod registry;
pub mod service;
pub mod stream;

pub use api::{create_router, AppState, DocumentRequest, ErrorResponse, SubmitResponse};
pub use client::{GeminiClient, GenerationClient, GenerationError};
pub use config::{
    Config, GenerationConfig, GenerationSettings, ProviderConfig, ServerConfig, StreamConfig,
    MAX_ITEMS_LIMIT,
};
pub use error::{ForgeError, Result};
pub use events::{progress_bus, ProgressEvent, ProgressPublisher, ProgressReceiver, ProgressSink};
pub use generator::{ItemGenerator, ItemOutcome, Rejection};
pub use job::{
    GeneratedItem, ItemCategory, JobId, JobRequest, JobResult, JobSpec, JobState,
};
pub use orchestrator::{plan_distribution, JobOrchestrator, LevelPlan};
pub use registry::{JobRegistry, JobStatus};
pub use service::JobService;
pub use stream::{StreamFrame, Subscription};
