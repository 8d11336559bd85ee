//! Process-wide table of live jobs.
//!
//! The registry maps job identifiers to the reading end of their progress
//! bus. All operations take one map-wide lock for a short, constant-time
//! critical section.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ForgeError, Result};
use crate::events::{progress_bus, ProgressPublisher, ProgressReceiver};
use crate::job::{JobId, JobState};

#[derive(Debug)]
struct JobEntry {
    state: JobState,
    created_at: Instant,
    /// `None` while a subscriber holds the reader.
    receiver: Option<ProgressReceiver>,
}

impl JobEntry {
    const fn subscribed(&self) -> bool {
        self.receiver.is_none()
    }
}

/// Snapshot of a job's registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// The job identifier.
    pub job_id: JobId,
    /// Lifecycle state.
    pub state: JobState,
    /// Whether a subscriber is currently attached.
    pub subscribed: bool,
    /// Seconds since the job was accepted.
    pub age_seconds: u64,
}

/// Concurrency-safe map of job identifiers to their progress bus.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, JobEntry>>,
}

impl JobRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, JobEntry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new job and returns its identifier and publisher.
    pub fn create(&self) -> (JobId, ProgressPublisher) {
        let job_id = JobId::new();
        let (publisher, receiver) = progress_bus(job_id);
        self.lock().insert(
            job_id,
            JobEntry {
                state: JobState::Pending,
                created_at: Instant::now(),
                receiver: Some(receiver),
            },
        );
        debug!(%job_id, "Registered job");
        (job_id, publisher)
    }

    /// Takes the job's reader for a subscriber.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::InvalidJob` if no entry exists and
    /// `ForgeError::SubscriberAttached` if another subscriber holds the reader.
    pub fn attach(&self, job_id: JobId) -> Result<ProgressReceiver> {
        let mut jobs = self.lock();
        let entry = jobs
            .get_mut(&job_id)
            .ok_or_else(|| ForgeError::invalid_job(job_id))?;
        entry
            .receiver
            .take()
            .ok_or_else(|| ForgeError::subscriber_attached(job_id))
    }

    /// Returns a reader taken with [`attach`](Self::attach).
    ///
    /// If the entry has been removed in the meantime the reader is dropped.
    pub fn release(&self, job_id: JobId, receiver: ProgressReceiver) {
        if let Some(entry) = self.lock().get_mut(&job_id) {
            entry.receiver = Some(receiver);
            debug!(%job_id, "Subscriber detached, reader returned");
        }
    }

    /// Removes a job. Returns `true` if it was present.
    pub fn remove(&self, job_id: JobId) -> bool {
        let removed = self.lock().remove(&job_id).is_some();
        if removed {
            debug!(%job_id, "Removed job");
        }
        removed
    }

    /// Updates a job's lifecycle state. Unknown ids are ignored.
    pub fn set_state(&self, job_id: JobId, state: JobState) {
        if let Some(entry) = self.lock().get_mut(&job_id) {
            entry.state = state;
        }
    }

    /// Returns a snapshot of a job's entry.
    pub fn status(&self, job_id: JobId) -> Result<JobStatus> {
        let jobs = self.lock();
        let entry = jobs
            .get(&job_id)
            .ok_or_else(|| ForgeError::invalid_job(job_id))?;
        Ok(JobStatus {
            job_id,
            state: entry.state,
            subscribed: entry.subscribed(),
            age_seconds: entry.created_at.elapsed().as_secs(),
        })
    }

    /// Drops entries older than `ttl` that have no attached subscriber.
    ///
    /// Returns the number of entries removed. A swept job that is still
    /// running keeps running; its further events are discarded.
    pub fn sweep(&self, ttl: Duration) -> usize {
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|job_id, entry| {
            let keep = entry.subscribed() || entry.created_at.elapsed() < ttl;
            if !keep {
                debug!(%job_id, state = ?entry.state, "Sweeping idle job");
            }
            keep
        });
        before - jobs.len()
    }

    /// Number of registered jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no jobs are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
