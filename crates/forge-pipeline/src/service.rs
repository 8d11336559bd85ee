//! Process-scoped owner of the job registry, generation client and sweeper.
//!
//! [`JobService`] is the entry point for everything job-related: accepting
//! requests, spawning one task per job, handing progress to subscribers and
//! cleaning up jobs nobody ever subscribed to.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::client::GenerationClient;
use crate::config::{Config, GenerationConfig};
use crate::error::{ForgeError, Result};
use crate::events::{ProgressEvent, ProgressPublisher};
use crate::generator::ItemGenerator;
use crate::job::{JobId, JobRequest, JobSpec, JobState};
use crate::orchestrator::JobOrchestrator;
use crate::registry::{JobRegistry, JobStatus};
use crate::stream::Subscription;

/// Accepts jobs, runs them in the background and serves their progress.
///
/// Cloning is cheap; all clones share the same registry.
#[derive(Debug, Clone)]
pub struct JobService {
    registry: Arc<JobRegistry>,
    orchestrator: Arc<JobOrchestrator>,
    generation: GenerationConfig,
    keep_alive: Duration,
    shutdown: CancellationToken,
}

impl JobService {
    /// Creates the service and starts the idle-job sweeper.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(client: Arc<dyn GenerationClient>, config: &Config) -> Self {
        let generator = ItemGenerator::new(client, config.generation.settings());
        let service = Self {
            registry: Arc::new(JobRegistry::new()),
            orchestrator: Arc::new(JobOrchestrator::new(generator)),
            generation: config.generation.clone(),
            keep_alive: config.stream.keep_alive(),
            shutdown: CancellationToken::new(),
        };

        match config.stream.job_ttl() {
            Some(ttl) => spawn_sweeper(
                Arc::clone(&service.registry),
                ttl,
                config.stream.sweep_interval(),
                service.shutdown.clone(),
            ),
            None => info!("Job TTL disabled, unsubscribed jobs are kept until shutdown"),
        }

        service
    }

    /// Returns the shared job registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Accepts a request, filling omitted fields from the configured
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::InvalidJobSpec` if the request is out of bounds.
    pub fn submit(&self, request: JobRequest) -> Result<JobId> {
        self.submit_spec(request.into_spec(&self.generation))
    }

    /// Accepts a fully specified job.
    ///
    /// Registers the job, spawns its task and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::InvalidJobSpec` if the job spec is out of bounds.
    pub fn submit_spec(&self, spec: JobSpec) -> Result<JobId> {
        spec.validate(self.generation.max_items)?;

        let (job_id, publisher) = self.registry.create();
        info!(
            %job_id,
            topic = %spec.topic,
            total_items = spec.total_items,
            "Accepted generation job"
        );

        let task = run_job(
            spec,
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.registry),
            publisher,
        );
        tokio::spawn(task.instrument(info_span!("job", %job_id)));

        Ok(job_id)
    }

    /// Attaches a subscriber to a job's progress.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::InvalidJob` for unknown or already drained jobs
    /// and `ForgeError::SubscriberAttached` if someone else is reading.
    pub fn subscribe(&self, job_id: JobId) -> Result<Subscription> {
        let receiver = self.registry.attach(job_id)?;
        debug!(%job_id, "Subscriber attached");
        Ok(Subscription::new(
            job_id,
            receiver,
            Arc::clone(&self.registry),
            self.keep_alive,
        ))
    }

    /// Returns a snapshot of a job.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::InvalidJob` for unknown or already drained jobs.
    pub fn status(&self, job_id: JobId) -> Result<JobStatus> {
        self.registry.status(job_id)
    }

    /// Stops the sweeper. Running jobs are not cancelled.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!(pending = self.registry.len(), "Shutting down job service");
            self.shutdown.cancel();
        }
    }
}

/// Publishes `Failed` if the job ends without a terminal event and marks it
/// done, whichever way the task exits.
struct JobGuard {
    registry: Arc<JobRegistry>,
    publisher: ProgressPublisher,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if !self.publisher.has_terminated() {
            self.publisher.publish(ProgressEvent::failed(
                ForgeError::job_fatal("job stopped unexpectedly").to_string(),
            ));
        }
        self.registry.set_state(self.publisher.job_id(), JobState::Done);
    }
}

async fn run_job(
    spec: JobSpec,
    orchestrator: Arc<JobOrchestrator>,
    registry: Arc<JobRegistry>,
    publisher: ProgressPublisher,
) {
    let guard = JobGuard {
        registry: Arc::clone(&registry),
        publisher: publisher.clone(),
    };
    registry.set_state(publisher.job_id(), JobState::Running);

    let outcome = AssertUnwindSafe(orchestrator.run(&spec, &publisher))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(result)) => debug!(
            produced = result.total,
            quota_exhausted = result.quota_exhausted,
            "Job task finished"
        ),
        Ok(Err(e)) => warn!(error = %e, "Job ended with an error"),
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(%message, "Job panicked");
            let fatal = ForgeError::job_fatal(format!("internal error: {message}"));
            publisher.publish(ProgressEvent::failed(fatal.to_string()));
        }
    }

    drop(guard);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn spawn_sweeper(
    registry: Arc<JobRegistry>,
    ttl: Duration,
    interval: Duration,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = registry.sweep(ttl);
                    if removed > 0 {
                        info!(removed, ttl_seconds = ttl.as_secs(), "Swept idle jobs");
                    }
                }
            }
        }
        debug!("Job sweeper stopped");
    });
}
