//! Job orchestration: distribution of items across levels and the main
//! generation loop.

use std::time::Instant;

use tracing::{info, warn};

use crate::config::MAX_ITEMS_LIMIT;
use crate::error::Result;
use crate::events::{ProgressEvent, ProgressSink};
use crate::generator::{ItemGenerator, ItemOutcome};
use crate::job::{ItemCategory, JobResult, JobSpec};

/// Number of theory and practical slots for one difficulty level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelPlan {
    /// The level name.
    pub difficulty: String,
    /// Theory slots, generated first.
    pub theory: usize,
    /// Practical slots, generated after the theory slots.
    pub practical: usize,
}

impl LevelPlan {
    /// Total slots in this level.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.theory + self.practical
    }

    /// Categories of the slots, in generation order.
    pub fn slots(&self) -> impl Iterator<Item = ItemCategory> {
        std::iter::repeat(ItemCategory::Theory)
            .take(self.theory)
            .chain(std::iter::repeat(ItemCategory::Practical).take(self.practical))
    }
}

/// Splits `total_items` across levels and categories.
///
/// Every level gets `total_items / levels.len()` slots and the first
/// `total_items % levels.len()` levels get one more, so the plan always adds
/// up to `total_items`. Within a level of `c` slots, `floor(c * balance)` are
/// theory and the rest practical.
///
/// ```
/// use forge_pipeline::plan_distribution;
///
/// let levels = vec!["Beginner".to_string(), "Advanced".to_string()];
/// let plan = plan_distribution(10, &levels, 0.5);
/// assert_eq!((plan[0].theory, plan[0].practical), (2, 3));
/// assert_eq!((plan[1].theory, plan[1].practical), (2, 3));
/// ```
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn plan_distribution(total_items: usize, levels: &[String], balance: f64) -> Vec<LevelPlan> {
    if levels.is_empty() {
        return Vec::new();
    }

    let base = total_items / levels.len();
    let remainder = total_items % levels.len();
    let balance = balance.clamp(0.0, 1.0);

    levels
        .iter()
        .enumerate()
        .map(|(index, difficulty)| {
            let count = base + usize::from(index < remainder);
            let theory = ((count as f64 * balance).floor() as usize).min(count);
            LevelPlan {
                difficulty: difficulty.clone(),
                theory,
                practical: count - theory,
            }
        })
        .collect()
}

/// Percentage of the target produced, rounded down.
#[allow(clippy::cast_possible_truncation)]
fn percent(produced: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (produced.saturating_mul(100) / total).min(100) as u8
}

/// Drives one job from its spec to a [`JobResult`].
#[derive(Debug, Clone)]
pub struct JobOrchestrator {
    generator: ItemGenerator,
}

impl JobOrchestrator {
    /// Creates an orchestrator over an item generator.
    #[must_use]
    pub const fn new(generator: ItemGenerator) -> Self {
        Self { generator }
    }

    /// Runs a job to completion, narrating progress to `sink`.
    ///
    /// Emits exactly one terminal event. A quota signal stops generation and
    /// still ends in `Completed`, with `quota_exhausted` set and whatever
    /// items were produced before it.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::InvalidJobSpec` if the job spec cannot be planned;
    /// a `Failed` event has been emitted in that case.
    pub async fn run(&self, spec: &JobSpec, sink: &dyn ProgressSink) -> Result<JobResult> {
        let started = Instant::now();
        sink.emit(ProgressEvent::Started);

        if let Err(e) = spec.validate(MAX_ITEMS_LIMIT) {
            warn!(error = %e, "Rejecting job spec");
            sink.emit(ProgressEvent::failed(e.to_string()));
            return Err(e);
        }

        info!(
            topic = %spec.topic,
            total_items = spec.total_items,
            levels = spec.difficulty_levels.len(),
            "Starting generation"
        );

        let plan = plan_distribution(
            spec.total_items,
            &spec.difficulty_levels,
            spec.category_balance,
        );
        let pacing = self.generator.settings().pacing_delay;
        let mut result = JobResult::new(&spec.difficulty_levels);

        'levels: for level in &plan {
            sink.emit(ProgressEvent::LevelStarted {
                difficulty: level.difficulty.clone(),
                progress: percent(result.total, spec.total_items),
            });

            for (index, category) in level.slots().enumerate() {
                sink.emit(ProgressEvent::ItemGenerating {
                    difficulty: level.difficulty.clone(),
                    ordinal: index + 1,
                    category,
                    progress: percent(result.total, spec.total_items),
                });

                match self
                    .generator
                    .generate_item(&spec.topic, &level.difficulty, category)
                    .await
                {
                    ItemOutcome::Item(item) => {
                        result.push(item.clone());
                        sink.emit(ProgressEvent::ItemComplete {
                            difficulty: level.difficulty.clone(),
                            item,
                            progress: percent(result.total, spec.total_items),
                        });
                    }
                    ItemOutcome::QuotaExceeded => {
                        warn!(
                            difficulty = %level.difficulty,
                            produced = result.total,
                            "Quota exhausted, stopping generation"
                        );
                        result.quota_exhausted = true;
                        sink.emit(ProgressEvent::QuotaExceeded);
                        break 'levels;
                    }
                    ItemOutcome::Failed => {}
                }

                tokio::time::sleep(pacing).await;
            }

            sink.emit(ProgressEvent::LevelComplete {
                difficulty: level.difficulty.clone(),
            });
        }

        result.elapsed_seconds = started.elapsed().as_secs_f64();
        info!(
            produced = result.total,
            target = spec.total_items,
            quota_exhausted = result.quota_exhausted,
            elapsed_seconds = result.elapsed_seconds,
            "Generation finished"
        );

        sink.emit(ProgressEvent::Completed {
            result: result.clone(),
        });
        Ok(result)
    }
}
