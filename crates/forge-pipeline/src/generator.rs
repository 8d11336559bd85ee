//! Single-item generation with parsing, validation and retry.
//!
//! [`ItemGenerator::generate_item`] turns one `(topic, difficulty, category)`
//! slot into at most one [`GeneratedItem`]. Malformed or off-category
//! responses and generic provider errors are retried locally; a quota
//! signal stops immediately and is reported to the caller.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::{GenerationClient, GenerationError};
use crate::config::GenerationSettings;
use crate::job::{GeneratedItem, ItemCategory};

/// Minimum question length in characters.
pub const MIN_QUESTION_CHARS: usize = 20;

/// Minimum answer length in characters.
pub const MIN_ANSWER_CHARS: usize = 50;

/// Cues that mark a question as scenario-based.
///
/// This is a lexical heuristic, not a semantic check: a theory question
/// containing one of these is rejected.
const THEORY_FORBIDDEN_CUES: [&str; 3] = ["your", "you are", "how would"];

/// A practical question must contain at least one of these.
const PRACTICAL_REQUIRED_CUES: [&str; 4] = ["your", "company", "you", "scenario"];

/// Result of one [`ItemGenerator::generate_item`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A validated item.
    Item(GeneratedItem),
    /// The provider reported quota exhaustion. The job must stop.
    QuotaExceeded,
    /// Every attempt was used up without a valid item.
    Failed,
}

/// Why a parsed response was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// The question is shorter than [`MIN_QUESTION_CHARS`].
    #[error("question shorter than {MIN_QUESTION_CHARS} characters")]
    QuestionTooShort,
    /// The answer is shorter than [`MIN_ANSWER_CHARS`].
    #[error("answer shorter than {MIN_ANSWER_CHARS} characters")]
    AnswerTooShort,
    /// A theory question reads like a scenario.
    #[error("theory question contains scenario cues")]
    ScenarioCuesInTheory,
    /// A practical question has no scenario cues.
    #[error("practical question lacks scenario cues")]
    MissingScenarioCues,
}

/// Produces validated items by prompting a [`GenerationClient`].
#[derive(Clone)]
pub struct ItemGenerator {
    client: Arc<dyn GenerationClient>,
    settings: GenerationSettings,
}

impl std::fmt::Debug for ItemGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemGenerator")
            .field("client", &self.client.name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ItemGenerator {
    /// Creates a generator over the given client.
    #[must_use]
    pub fn new(client: Arc<dyn GenerationClient>, settings: GenerationSettings) -> Self {
        Self { client, settings }
    }

    /// Returns the retry and pacing settings.
    #[must_use]
    pub const fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Generates one item for a slot.
    ///
    /// Makes up to `max_attempts` provider calls, sleeping `retry_backoff`
    /// between them. Returns as soon as the provider reports a quota error.
    pub async fn generate_item(
        &self,
        topic: &str,
        difficulty: &str,
        category: ItemCategory,
    ) -> ItemOutcome {
        let prompt = build_prompt(topic, difficulty, category);
        let max_attempts = self.settings.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            debug!(difficulty, %category, attempt, "Requesting item");

            let failure = match self.client.generate(&prompt).await {
                Ok(text) => {
                    let (question, answer) = parse_response(&text);
                    match validate_item(&question, &answer, category) {
                        Ok(()) => {
                            info!(difficulty, %category, attempt, "Generated item");
                            return ItemOutcome::Item(GeneratedItem {
                                text_prompt: question,
                                text_answer: finish_sentence(answer),
                                category,
                                difficulty: difficulty.to_string(),
                            });
                        }
                        Err(rejection) => rejection.to_string(),
                    }
                }
                Err(GenerationError::QuotaExceeded { message }) => {
                    warn!(difficulty, %category, %message, "Provider quota exceeded");
                    return ItemOutcome::QuotaExceeded;
                }
                Err(e) => e.to_string(),
            };

            debug!(difficulty, %category, attempt, reason = %failure, "Attempt rejected");
            if attempt < max_attempts {
                tokio::time::sleep(self.settings.retry_backoff).await;
            }
        }

        warn!(difficulty, %category, max_attempts, "Giving up on item slot");
        ItemOutcome::Failed
    }
}

/// Builds the category-specific prompt for one slot.
#[must_use]
pub fn build_prompt(topic: &str, difficulty: &str, category: ItemCategory) -> String {
    let focus = match category {
        ItemCategory::Theory => format!(
            "Generate ONE THEORETICAL question about {topic}.\n\n\
             THEORY = Concepts, definitions, frameworks, principles, best practices.\n\n\
             Example: \"What are the key elements of transformational leadership theory?\"\n\n\
             Generate now:"
        ),
        ItemCategory::Practical => format!(
            "Generate ONE PRACTICAL scenario question about {topic}.\n\n\
             PRACTICAL = Real business situation requiring strategic decisions.\n\n\
             Example: \"Your company's digital transformation faces resistance from senior staff. How would you proceed?\"\n\n\
             Generate now:"
        ),
    };

    format!(
        "{focus}\n\nDifficulty: {difficulty}\n\
         Question: 15-40 words. Answer: 120-150 words.\n\
         Format:\nQ: [question]\nA: [answer]"
    )
}

/// Extracts the question and answer from a response.
///
/// Lines starting with `Q:` or `A:` open a field; following lines are
/// appended to the open field until the other label appears. Whitespace
/// runs collapse to single spaces. Missing fields come back empty.
#[must_use]
pub fn parse_response(text: &str) -> (String, String) {
    enum Field {
        None,
        Question,
        Answer,
    }

    let mut question = String::new();
    let mut answer = String::new();
    let mut open = Field::None;

    for line in text.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Q:") {
            open = Field::Question;
            question = rest.to_string();
        } else if let Some(rest) = line.strip_prefix("A:") {
            open = Field::Answer;
            answer = rest.to_string();
        } else if !line.is_empty() {
            let target = match open {
                Field::Question => &mut question,
                Field::Answer => &mut answer,
                Field::None => continue,
            };
            target.push(' ');
            target.push_str(line);
        }
    }

    (collapse_whitespace(&question), collapse_whitespace(&answer))
}

/// Checks a parsed pair against length and category heuristics.
pub fn validate_item(
    question: &str,
    answer: &str,
    category: ItemCategory,
) -> Result<(), Rejection> {
    if question.chars().count() < MIN_QUESTION_CHARS {
        return Err(Rejection::QuestionTooShort);
    }
    if answer.chars().count() < MIN_ANSWER_CHARS {
        return Err(Rejection::AnswerTooShort);
    }

    let lowered = question.to_lowercase();
    match category {
        ItemCategory::Theory if THEORY_FORBIDDEN_CUES.iter().any(|cue| lowered.contains(cue)) => {
            Err(Rejection::ScenarioCuesInTheory)
        }
        ItemCategory::Practical
            if !PRACTICAL_REQUIRED_CUES.iter().any(|cue| lowered.contains(cue)) =>
        {
            Err(Rejection::MissingScenarioCues)
        }
        _ => Ok(()),
    }
}

/// Appends `.` unless the text already ends in sentence punctuation.
#[must_use]
pub fn finish_sentence(mut text: String) -> String {
    if !text.ends_with(['.', '!', '?']) {
        text.push('.');
    }
    text
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
