//! Job data model for the generation pipeline.
//!
//! This module defines the values that flow through a job: the validated
//! [`JobSpec`] a job is started with, the [`GeneratedItem`]s it produces,
//! and the [`JobResult`] handed out in the terminal event.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use forge_document::{DocumentEntry, DocumentInput, EntryCategory};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::GenerationConfig;
use crate::error::{ForgeError, Result};

// ============================================================================
// JobId
// ============================================================================

/// Opaque identifier of an accepted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Creates a new random job identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ForgeError::invalid_job(s))
    }
}

// ============================================================================
// JobState
// ============================================================================

/// Lifecycle state of a job.
///
/// `Pending` -> `Running` -> `Done`. A job reaches `Done` once its terminal
/// event has been published, whether or not anyone has read it yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted, orchestrator not yet started.
    #[default]
    Pending,
    /// Orchestrator is generating items.
    Running,
    /// Terminal event published.
    Done,
}

// ============================================================================
// Items
// ============================================================================

/// Kind of question requested for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    /// Conceptual question about definitions, frameworks or principles.
    Theory,
    /// Scenario question requiring a decision in a business situation.
    Practical,
}

impl ItemCategory {
    /// Returns the lowercase name used in logs and events.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Theory => "theory",
            Self::Practical => "practical",
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ItemCategory> for EntryCategory {
    fn from(category: ItemCategory) -> Self {
        match category {
            ItemCategory::Theory => Self::Theory,
            ItemCategory::Practical => Self::Practical,
        }
    }
}

/// One validated question/answer pair.
///
/// Items are never mutated after the generator hands them out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedItem {
    /// The question text.
    pub text_prompt: String,
    /// The answer text, always ending in `.`, `!` or `?`.
    pub text_answer: String,
    /// Whether the question is conceptual or scenario-based.
    pub category: ItemCategory,
    /// Difficulty level the item was generated for.
    pub difficulty: String,
}

impl From<&GeneratedItem> for DocumentEntry {
    fn from(item: &GeneratedItem) -> Self {
        Self {
            category: item.category.into(),
            question: item.text_prompt.clone(),
            answer: item.text_answer.clone(),
        }
    }
}

// ============================================================================
// JobSpec / JobRequest
// ============================================================================

/// Validated parameters of a generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    /// Subject the questions are about.
    pub topic: String,
    /// Number of items to produce across all levels.
    pub total_items: usize,
    /// Difficulty levels in generation order.
    pub difficulty_levels: Vec<String>,
    /// Fraction of each level's items that are theory questions.
    pub category_balance: f64,
}

impl JobSpec {
    /// Creates a spec with an even theory/practical balance.
    #[must_use]
    pub fn new<S: Into<String>>(
        topic: impl Into<String>,
        total_items: usize,
        difficulty_levels: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            topic: topic.into(),
            total_items,
            difficulty_levels: difficulty_levels.into_iter().map(Into::into).collect(),
            category_balance: 0.5,
        }
    }

    /// Sets the category balance.
    #[must_use]
    pub fn with_balance(mut self, category_balance: f64) -> Self {
        self.category_balance = category_balance;
        self
    }

    /// Checks the job spec against the configured item limit.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::InvalidJobSpec` naming the first offending field.
    pub fn validate(&self, max_items: usize) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(ForgeError::invalid_spec("topic is required"));
        }

        if self.total_items == 0 || self.total_items > max_items {
            return Err(ForgeError::invalid_spec(format!(
                "totalItems must be between 1 and {max_items}, got {}",
                self.total_items
            )));
        }

        if self.difficulty_levels.is_empty() {
            return Err(ForgeError::invalid_spec(
                "difficultyLevels must contain at least one level",
            ));
        }

        let mut seen = HashSet::new();
        for level in &self.difficulty_levels {
            if level.trim().is_empty() {
                return Err(ForgeError::invalid_spec(
                    "difficultyLevels must not contain blank names",
                ));
            }
            if !seen.insert(level.as_str()) {
                return Err(ForgeError::invalid_spec(format!(
                    "difficultyLevels contains '{level}' more than once"
                )));
            }
        }

        if !self.category_balance.is_finite() || !(0.0..=1.0).contains(&self.category_balance) {
            return Err(ForgeError::invalid_spec(
                "categoryBalance must be a number between 0 and 1",
            ));
        }

        Ok(())
    }
}

/// A generation request as received from a client.
///
/// Omitted fields take the configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    /// Subject the questions are about.
    #[serde(default)]
    pub topic: String,
    /// Number of items to produce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<usize>,
    /// Difficulty levels in generation order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_levels: Option<Vec<String>>,
    /// Fraction of theory questions per level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_balance: Option<f64>,
}

impl JobRequest {
    /// Fills omitted fields from the configured defaults.
    ///
    /// The returned spec is not validated.
    #[must_use]
    pub fn into_spec(self, defaults: &GenerationConfig) -> JobSpec {
        JobSpec {
            topic: self.topic.trim().to_string(),
            total_items: self.total_items.unwrap_or(defaults.default_total_items),
            difficulty_levels: self
                .difficulty_levels
                .unwrap_or_else(|| defaults.default_difficulty_levels.clone()),
            category_balance: self
                .category_balance
                .unwrap_or(defaults.default_category_balance),
        }
    }
}

// ============================================================================
// JobResult
// ============================================================================

/// Aggregate output of a finished job.
///
/// `levels` holds one entry per requested difficulty, in request order,
/// including levels that ended up with no items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    /// Items per difficulty level, in generation order.
    pub levels: IndexMap<String, Vec<GeneratedItem>>,
    /// Number of items produced.
    pub total: usize,
    /// Wall-clock duration of the job in seconds.
    pub elapsed_seconds: f64,
    /// Whether generation stopped early on a quota signal.
    pub quota_exhausted: bool,
    /// Display ordering of the levels.
    pub difficulty_levels: Vec<String>,
}

impl JobResult {
    /// Creates an empty result with a slot for every level.
    #[must_use]
    pub fn new(difficulty_levels: &[String]) -> Self {
        Self {
            levels: difficulty_levels
                .iter()
                .map(|level| (level.clone(), Vec::new()))
                .collect(),
            total: 0,
            elapsed_seconds: 0.0,
            quota_exhausted: false,
            difficulty_levels: difficulty_levels.to_vec(),
        }
    }

    /// Appends an item to its difficulty level.
    pub fn push(&mut self, item: GeneratedItem) {
        self.levels
            .entry(item.difficulty.clone())
            .or_default()
            .push(item);
        self.total += 1;
    }

    /// Returns the items produced for a level.
    #[must_use]
    pub fn items(&self, difficulty: &str) -> &[GeneratedItem] {
        self.levels.get(difficulty).map_or(&[], Vec::as_slice)
    }

    /// Builds the renderer input for this result.
    #[must_use]
    pub fn document_input(&self, topic: &str, generated_at: DateTime<Utc>) -> DocumentInput {
        document_input(topic, &self.difficulty_levels, &self.levels, generated_at)
    }
}

/// Builds renderer input from per-level items in display order.
///
/// Levels missing from `questions` are skipped, as are empty ones.
#[must_use]
pub fn document_input(
    topic: &str,
    difficulty_levels: &[String],
    questions: &IndexMap<String, Vec<GeneratedItem>>,
    generated_at: DateTime<Utc>,
) -> DocumentInput {
    let mut input = DocumentInput::new(topic, generated_at);
    for level in difficulty_levels {
        if let Some(items) = questions.get(level) {
            input.push_section(level.clone(), items.iter().map(DocumentEntry::from).collect());
        }
    }
    input
}
