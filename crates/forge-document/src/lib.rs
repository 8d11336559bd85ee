//! Interview Forge document rendering.
//!
//! Turns a finished set of generated question/answer items into a
//! downloadable document. The pipeline hands this crate a stable, ordered
//! list of difficulty sections; everything about layout lives here.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use forge_document::{
//!     DocumentEntry, DocumentFormat, DocumentInput, EntryCategory,
//! };
//!
//! let mut input = DocumentInput::new("Change Management", Utc::now());
//! input.push_section(
//!     "Beginner",
//!     vec![DocumentEntry {
//!         category: EntryCategory::Theory,
//!         question: "What is change management?".to_string(),
//!         answer: "A structured approach to transitions.".to_string(),
//!     }],
//! );
//!
//! let document = DocumentFormat::Markdown.renderer().render(&input).unwrap();
//! assert!(document.body.contains("## Beginner Level"));
//! assert!(document.filename.ends_with(".md"));
//! ```

pub mod json;
pub mod markdown;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use json::JsonRenderer;
pub use markdown::MarkdownRenderer;

/// Maximum number of characters of the topic kept in a document filename.
pub const MAX_FILENAME_TOPIC_CHARS: usize = 50;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during document rendering.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Failed to serialize the document to JSON.
    #[error("failed to serialize document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The input cannot be rendered.
    #[error("invalid document data: {0}")]
    InvalidData(String),
}

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;

// ============================================================================
// Input Model (local copy to avoid cross-crate dependency)
// ============================================================================

/// Category label of a rendered entry.
///
/// This mirrors the pipeline's item category so the renderer does not need
/// to depend on the pipeline crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCategory {
    /// Conceptual question about definitions, frameworks or principles.
    Theory,
    /// Scenario question requiring a decision in a business situation.
    Practical,
}

impl EntryCategory {
    /// Returns the human-readable label used in rendered documents.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Theory => "Theory",
            Self::Practical => "Practical",
        }
    }
}

/// One question/answer pair in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    /// Category label of the entry.
    pub category: EntryCategory,
    /// The question text.
    pub question: String,
    /// The answer text.
    pub answer: String,
}

/// All entries for one difficulty level, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSection {
    /// Difficulty level name (e.g. "Beginner").
    pub difficulty: String,
    /// Entries for this level.
    pub entries: Vec<DocumentEntry>,
}

/// Everything a renderer needs to produce a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInput {
    /// The topic the questions were generated for.
    pub topic: String,
    /// When the document was generated.
    pub generated_at: DateTime<Utc>,
    /// Sections in display order. Empty sections are never stored.
    pub sections: Vec<DocumentSection>,
}

impl DocumentInput {
    /// Creates an empty document input for a topic.
    #[must_use]
    pub fn new(topic: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            topic: topic.into(),
            generated_at,
            sections: Vec::new(),
        }
    }

    /// Appends a section. Sections with no entries are skipped.
    pub fn push_section(&mut self, difficulty: impl Into<String>, entries: Vec<DocumentEntry>) {
        if entries.is_empty() {
            return;
        }
        self.sections.push(DocumentSection {
            difficulty: difficulty.into(),
            entries,
        });
    }

    /// Checks that the input can be rendered.
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(DocumentError::InvalidData(
                "topic must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the total number of entries across all sections.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.sections.iter().map(|s| s.entries.len()).sum()
    }
}

// ============================================================================
// Rendered Output
// ============================================================================

/// A rendered document ready to be sent to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Suggested download filename.
    pub filename: String,
    /// MIME type of the body.
    pub content_type: &'static str,
    /// Document body.
    pub body: String,
}

/// Renders a [`DocumentInput`] into a concrete document format.
pub trait DocumentRenderer: Send + Sync {
    /// Renders the document.
    fn render(&self, input: &DocumentInput) -> Result<RenderedDocument>;
}

/// Output formats supported by the built-in renderers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Markdown document (default).
    #[default]
    Markdown,
    /// Pretty-printed JSON document.
    Json,
}

impl DocumentFormat {
    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }

    /// Returns the built-in renderer for this format.
    #[must_use]
    pub fn renderer(&self) -> Box<dyn DocumentRenderer> {
        match self {
            Self::Markdown => Box::new(MarkdownRenderer),
            Self::Json => Box::new(JsonRenderer),
        }
    }
}

/// Builds the download filename for a document.
///
/// Spaces and any character that is unsafe in a `Content-Disposition`
/// header become `_`; the topic part is cut to
/// [`MAX_FILENAME_TOPIC_CHARS`] characters.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use forge_document::document_filename;
///
/// let at = Utc.with_ymd_and_hms(2026, 3, 4, 9, 7, 0).unwrap();
/// assert_eq!(
///     document_filename("Crisis Leadership", at, "md"),
///     "Crisis_Leadership_20260304_0907.md"
/// );
/// ```
#[must_use]
pub fn document_filename(topic: &str, generated_at: DateTime<Utc>, extension: &str) -> String {
    let stem: String = topic
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .take(MAX_FILENAME_TOPIC_CHARS)
        .collect();
    let stem = if stem.is_empty() {
        "interview".to_string()
    } else {
        stem
    };

    format!(
        "{stem}_{}.{extension}",
        generated_at.format("%Y%m%d_%H%M")
    )
}
