//! Streaming a job's progress to one subscriber.
//!
//! A [`Subscription`] owns the reading end of a job's progress bus for as
//! long as the subscriber is connected. It yields events in order, inserts
//! keep-alives during idle periods and retires the job once the terminal
//! event has been handed out. Dropping a subscription early returns the
//! reader to the registry so a later subscriber can pick up where this one
//! stopped.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, Sse};
use futures::Stream;
use tracing::{debug, warn};

use crate::events::{ProgressEvent, ProgressReceiver};
use crate::job::JobId;
use crate::registry::JobRegistry;

/// Data sent with every keep-alive frame.
const KEEP_ALIVE_DATA: &str = r#"{"event":"ping"}"#;

/// One frame of a progress stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// A progress event from the job.
    Event(ProgressEvent),
    /// Nothing happened within the keep-alive window.
    KeepAlive,
}

impl StreamFrame {
    /// Converts the frame into a Server-Sent Event.
    ///
    /// Events use their tag as the SSE event name and their JSON form as
    /// data; keep-alives are sent as `ping` events.
    #[must_use]
    pub fn to_sse_event(&self) -> Event {
        match self {
            Self::KeepAlive => Event::default().event("ping").data(KEEP_ALIVE_DATA),
            Self::Event(event) => match serde_json::to_string(event) {
                Ok(json) => Event::default().event(event.event_name()).data(json),
                Err(e) => {
                    warn!("Failed to serialize progress event: {}", e);
                    Event::default()
                        .event(event.event_name())
                        .data(format!(r#"{{"event":"{}"}}"#, event.event_name()))
                }
            },
        }
    }
}

/// A subscriber's claim on one job's progress.
#[derive(Debug)]
pub struct Subscription {
    job_id: JobId,
    receiver: Option<ProgressReceiver>,
    registry: Arc<JobRegistry>,
    keep_alive: Duration,
    finished: bool,
}

impl Subscription {
    pub(crate) const fn new(
        job_id: JobId,
        receiver: ProgressReceiver,
        registry: Arc<JobRegistry>,
        keep_alive: Duration,
    ) -> Self {
        Self {
            job_id,
            receiver: Some(receiver),
            registry,
            keep_alive,
            finished: false,
        }
    }

    /// The job this subscription reads.
    #[must_use]
    pub const fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Returns `true` once the terminal event has been handed out.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Waits for the next frame.
    ///
    /// Returns `None` after the terminal event has been yielded. If no event
    /// arrives within the keep-alive window a [`StreamFrame::KeepAlive`] is
    /// returned instead.
    pub async fn next(&mut self) -> Option<StreamFrame> {
        if self.finished {
            return None;
        }
        let receiver = self.receiver.as_mut()?;
        let received = tokio::time::timeout(self.keep_alive, receiver.recv()).await;

        match received {
            Err(_) => Some(StreamFrame::KeepAlive),
            Ok(Some(event)) => {
                if event.is_terminal() {
                    self.finish();
                }
                Some(StreamFrame::Event(event))
            }
            Ok(None) => {
                warn!(job_id = %self.job_id, "Progress bus closed without a terminal event");
                self.finish();
                None
            }
        }
    }

    /// Turns the subscription into a Server-Sent Events response.
    pub fn into_sse(self) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        let stream = futures::stream::unfold(self, |mut subscription| async move {
            let frame = subscription.next().await?;
            Some((Ok(frame.to_sse_event()), subscription))
        });
        Sse::new(stream)
    }

    fn finish(&mut self) {
        self.finished = true;
        self.receiver = None;
        self.registry.remove(self.job_id);
        debug!(job_id = %self.job_id, "Terminal event delivered, job retired");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(receiver) = self.receiver.take() {
            self.registry.release(self.job_id, receiver);
        }
    }
}
