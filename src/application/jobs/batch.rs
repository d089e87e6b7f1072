use std::time::Duration;

use futures::future::join_all;
use tokio::time::{Instant, sleep};

use crate::domain::{entities::JobView, request::ConversionRequest, types::JobStatus};

use super::queue::{ConversionQueue, QueueError};

pub const DEFAULT_WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Final state of one job driven by [`BatchConverter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed {
        job: JobView,
        data: bytes::Bytes,
        content_type: String,
    },
    Failed {
        job: JobView,
        message: String,
    },
    TimedOut {
        job_id: String,
        last_status: Option<JobStatus>,
    },
}

impl BatchOutcome {
    pub fn job_id(&self) -> &str {
        match self {
            BatchOutcome::Completed { job, .. } | BatchOutcome::Failed { job, .. } => &job.id,
            BatchOutcome::TimedOut { job_id, .. } => job_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Completed { .. })
    }
}

/// Submits a set of requests and polls each job until it settles.
pub struct BatchConverter<'a> {
    queue: &'a ConversionQueue,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl<'a> BatchConverter<'a> {
    pub fn new(queue: &'a ConversionQueue, wait_timeout: Duration) -> Self {
        Self {
            queue,
            poll_interval: DEFAULT_WAIT_POLL_INTERVAL,
            wait_timeout,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Outcomes come back in request order.
    pub async fn run(&self, requests: Vec<ConversionRequest>) -> Vec<BatchOutcome> {
        let submissions = requests
            .into_iter()
            .map(|request| self.queue.submit(request));
        let ids = join_all(submissions).await;

        join_all(ids.iter().map(|id| self.wait_for(id))).await
    }

    /// Polls `id` until it is terminal or the wait timeout elapses. A timeout
    /// too large to represent as an instant means waiting without a deadline.
    pub async fn wait_for(&self, id: &str) -> BatchOutcome {
        let deadline = Instant::now().checked_add(self.wait_timeout);

        loop {
            match self.queue.status(id) {
                Some(job) if job.status.is_terminal() => return self.settle(job),
                last if deadline.is_some_and(|deadline| Instant::now() >= deadline) => {
                    return BatchOutcome::TimedOut {
                        job_id: id.to_string(),
                        last_status: last.map(|job| job.status),
                    };
                }
                _ => {}
            }

            sleep(self.poll_interval).await;
        }
    }

    fn settle(&self, job: JobView) -> BatchOutcome {
        match self.queue.result(&job.id) {
            Ok(output) => BatchOutcome::Completed {
                job,
                data: output.data,
                content_type: output.content_type,
            },
            Err(QueueError::JobFailed { message, .. }) => BatchOutcome::Failed { job, message },
            Err(err) => BatchOutcome::Failed {
                message: err.to_string(),
                job,
            },
        }
    }
}
