//! Progress events and the per-job progress bus.
//!
//! Every job owns one unbounded FIFO channel. The orchestrator is the only
//! writer (through a [`ProgressPublisher`]); at most one subscriber drains the
//! other end. Events are delivered once and never replayed.
//!
//! # Event Types
//!
//! - `started` - The job began
//! - `level_started` - A difficulty level began
//! - `item_generating` - A provider call for one slot is about to be made
//! - `item_complete` - A validated item was produced
//! - `level_complete` - A difficulty level finished
//! - `quota_exceeded` - The provider quota ran out; no further calls follow
//! - `completed` - Terminal: the job finished, possibly with a partial result
//! - `failed` - Terminal: the job stopped on an unexpected error

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::job::{GeneratedItem, ItemCategory, JobId, JobResult};

// ============================================================================
// Event Enum
// ============================================================================

/// One step in the narration of a job.
///
/// Serialized as a JSON object with `event` and (for variants with data)
/// `payload` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The job began.
    Started,
    /// A difficulty level began.
    LevelStarted {
        /// The level name.
        difficulty: String,
        /// Percentage of the target produced so far.
        progress: u8,
    },
    /// A provider call for one slot is about to be made.
    ItemGenerating {
        /// The level name.
        difficulty: String,
        /// 1-based position of the slot within its level.
        ordinal: usize,
        /// Category requested for the slot.
        category: ItemCategory,
        /// Percentage of the target produced so far.
        progress: u8,
    },
    /// A validated item was produced.
    ItemComplete {
        /// The level name.
        difficulty: String,
        /// The produced item.
        item: GeneratedItem,
        /// Percentage of the target produced so far, including this item.
        progress: u8,
    },
    /// A difficulty level finished.
    LevelComplete {
        /// The level name.
        difficulty: String,
    },
    /// The provider quota ran out. No `ItemGenerating` follows.
    QuotaExceeded,
    /// Terminal event carrying the (possibly partial) result.
    Completed {
        /// The job result.
        result: JobResult,
    },
    /// Terminal event for an unexpected failure.
    Failed {
        /// Human-readable error message.
        message: String,
    },
}

impl ProgressEvent {
    /// Creates a `Failed` event.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Returns `true` for `Completed` and `Failed`.
    ///
    /// # Examples
    ///
    /// ```
    /// use forge_pipeline::ProgressEvent;
    ///
    /// assert!(ProgressEvent::failed("boom").is_terminal());
    /// assert!(!ProgressEvent::Started.is_terminal());
    /// ```
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::LevelStarted { .. } => "level_started",
            Self::ItemGenerating { .. } => "item_generating",
            Self::ItemComplete { .. } => "item_complete",
            Self::LevelComplete { .. } => "level_complete",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

// ============================================================================
// Sink
// ============================================================================

/// Receives progress events from the orchestrator.
pub trait ProgressSink: Send + Sync {
    /// Publishes one event.
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event);
    }
}

// ============================================================================
// Progress Bus
// ============================================================================

/// Reading end of a job's progress bus.
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

/// Creates the progress bus for a job.
#[must_use]
pub fn progress_bus(job_id: JobId) -> (ProgressPublisher, ProgressReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        ProgressPublisher {
            job_id,
            sender,
            terminated: Arc::new(AtomicBool::new(false)),
        },
        receiver,
    )
}

/// Writing end of a job's progress bus.
///
/// Once a terminal event has gone through, later events are dropped, so a
/// job can never publish two terminal events.
#[derive(Debug, Clone)]
pub struct ProgressPublisher {
    job_id: JobId,
    sender: mpsc::UnboundedSender<ProgressEvent>,
    terminated: Arc<AtomicBool>,
}

impl ProgressPublisher {
    /// Returns the job this publisher belongs to.
    #[must_use]
    pub const fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Returns `true` once a terminal event has been published.
    #[must_use]
    pub fn has_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Publishes an event. Never blocks.
    ///
    /// A missing reader is not an error: the job keeps running and the event
    /// is discarded.
    pub fn publish(&self, event: ProgressEvent) {
        if self.has_terminated() {
            debug!(job_id = %self.job_id, event = event.event_name(), "Dropping event after terminal event");
            return;
        }
        if event.is_terminal() && self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }

        let name = event.event_name();
        if self.sender.send(event).is_err() {
            debug!(job_id = %self.job_id, event = name, "No reader for progress event");
        }
    }
}

impl ProgressSink for ProgressPublisher {
    fn emit(&self, event: ProgressEvent) {
        self.publish(event);
    }
}
