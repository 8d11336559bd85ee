//! Error types for the Interview Forge pipeline.
//!
//! This module defines the error hierarchy for service-level operations:
//! configuration loading, job submission, subscription and document export.
//! Failures at the generation provider boundary have their own type,
//! [`GenerationError`](crate::client::GenerationError), because they are
//! absorbed inside the pipeline rather than surfaced to callers.

use std::path::PathBuf;

/// A specialized `Result` type for pipeline operations.
pub type Result<T> = std::result::Result<T, ForgeError>;

/// Errors that can occur while running the Interview Forge service.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help users resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your forge.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Job Errors
    // ========================================================================
    /// A generation request was rejected before a job was created.
    #[error("Invalid job request: {message}")]
    InvalidJobSpec {
        /// Description of the rejected field.
        message: String,
    },

    /// No job is registered under the given identifier.
    ///
    /// Returned for identifiers that never existed and for jobs whose
    /// terminal event has already been delivered.
    #[error("Invalid job: '{job_id}' is unknown or already finished\n\nSuggestion: Submit a new generation request")]
    InvalidJob {
        /// The identifier that was looked up.
        job_id: String,
    },

    /// Another subscriber is already draining this job's progress.
    #[error("Job '{job_id}' already has an active subscriber\n\nSuggestion: Close the other progress stream first")]
    SubscriberAttached {
        /// The identifier of the contested job.
        job_id: String,
    },

    /// An unexpected failure outside the per-item retry logic stopped a job.
    #[error("Job failed: {message}")]
    JobFatal {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Document Errors
    // ========================================================================
    /// The document renderer rejected its input.
    #[error("Document rendering failed: {0}")]
    Document(#[from] forge_document::DocumentError),

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ForgeError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `InvalidJobSpec` error.
    #[must_use]
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidJobSpec {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidJob` error.
    #[must_use]
    pub fn invalid_job(job_id: impl std::fmt::Display) -> Self {
        Self::InvalidJob {
            job_id: job_id.to_string(),
        }
    }

    /// Creates a new `SubscriberAttached` error.
    #[must_use]
    pub fn subscriber_attached(job_id: impl std::fmt::Display) -> Self {
        Self::SubscriberAttached {
            job_id: job_id.to_string(),
        }
    }

    /// Creates a new `JobFatal` error.
    #[must_use]
    pub fn job_fatal(message: impl Into<String>) -> Self {
        Self::JobFatal {
            message: message.into(),
        }
    }

    /// Returns `true` if the error was caused by the caller's input rather
    /// than by the service.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidJobSpec { .. }
                | Self::InvalidJob { .. }
                | Self::SubscriberAttached { .. }
                | Self::Document(_)
        )
    }
}
