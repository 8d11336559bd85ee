//! Text-generation client boundary.
//!
//! The pipeline only needs one capability from the remote model:
//! `generate(prompt) -> text`. [`GenerationClient`] captures that so the
//! orchestrator can be driven by the real [`GeminiClient`] in production and
//! by scripted clients in tests.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;

/// Provider messages that indicate a rate limit or exhausted usage allotment.
#[allow(clippy::expect_used)]
static QUOTA_SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)429|quota|exceeded").expect("QUOTA_SIGNATURE is a compile-time constant")
});

// ============================================================================
// Errors
// ============================================================================

/// Failures reported by a [`GenerationClient`].
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The provider signalled a rate limit or exhausted quota.
    #[error("provider quota exceeded: {message}")]
    QuotaExceeded {
        /// Message reported by the provider.
        message: String,
    },

    /// Any other error reported by the provider.
    #[error("provider error (status {status:?}): {message}")]
    Provider {
        /// HTTP status, when the failure came with one.
        status: Option<u16>,
        /// Message reported by the provider.
        message: String,
    },

    /// The request never produced a response. The URL is stripped before
    /// wrapping.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider answered, but without usable text.
    #[error("malformed provider response: {message}")]
    MalformedResponse {
        /// What was wrong with the response.
        message: String,
    },
}

impl GenerationError {
    /// Classifies a provider failure.
    ///
    /// Status 429, or a message mentioning `429`, `quota` or `exceeded` in
    /// any case, is a quota signal. Everything else is a generic provider
    /// error.
    ///
    /// ```
    /// use forge_pipeline::GenerationError;
    ///
    /// assert!(GenerationError::classify(Some(429), "slow down").is_quota());
    /// assert!(GenerationError::classify(None, "Resource has been EXHAUSTED: Quota").is_quota());
    /// assert!(!GenerationError::classify(Some(500), "internal").is_quota());
    /// ```
    #[must_use]
    pub fn classify(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == Some(429) || QUOTA_SIGNATURE.is_match(&message) {
            Self::QuotaExceeded { message }
        } else {
            Self::Provider { status, message }
        }
    }

    /// Creates a `MalformedResponse` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Returns `true` if this error should stop the whole job.
    #[must_use]
    pub const fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

// ============================================================================
// Trait
// ============================================================================

/// Remote text-generation capability.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Sends a prompt and returns the generated text.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "generation-client"
    }
}

// ============================================================================
// Gemini
// ============================================================================

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Header carrying the API key. Keeps the key out of request URLs, which
/// reqwest includes in its error messages.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// [`GenerationClient`] backed by the Gemini `generateContent` API.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    /// Creates a client from provider settings.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Network` if the HTTP client cannot be built.
    pub fn new(config: &ProviderConfig, api_key: impl Into<String>) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = GenerateContentRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => match envelope.error.status {
                    Some(code) => format!("{code}: {}", envelope.error.message),
                    None => envelope.error.message,
                },
                Err(_) if body.is_empty() => status.to_string(),
                Err(_) => body,
            };
            tracing::debug!(status = status.as_u16(), %message, "Provider returned an error");
            return Err(GenerationError::classify(Some(status.as_u16()), message));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::malformed(e.without_url().to_string()))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationError::malformed("response contained no text"));
        }

        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
