use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use metrics::{counter, gauge};
use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::mpsc::{self, error::SendTimeoutError},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    application::render::DocumentRenderer,
    config::QueueSettings,
    domain::{
        entities::{JobInput, JobOutput, JobView},
        error::JobFailure,
        request::ConversionRequest,
        types::JobStatus,
    },
};

use super::{
    clock::{Clock, SystemClock},
    ids::{IdGenerator, UuidV7Ids},
    lock::mutex_lock,
    retention::{self, METRIC_JOBS_RESIDENT},
    table::JobTable,
    worker::{self, WorkerContext},
};

const TARGET: &str = "application::jobs::queue";
const METRIC_JOBS_SUBMITTED: &str = "docflux_jobs_submitted_total";
const METRIC_JOBS_REJECTED: &str = "docflux_jobs_rejected_total";

pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_CAPACITY: usize = 100;
pub const DEFAULT_ADMISSION_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub workers: usize,
    pub capacity: usize,
    /// Longest a submission waits for room in the admission channel.
    pub admission_timeout: Duration,
    /// Deadline for a single rendering call.
    pub render_timeout: Duration,
    /// How long terminal jobs stay resident.
    pub retention: Duration,
    pub cleanup_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            capacity: DEFAULT_CAPACITY,
            admission_timeout: DEFAULT_ADMISSION_TIMEOUT,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            retention: DEFAULT_RETENTION,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl From<&QueueSettings> for QueueConfig {
    fn from(settings: &QueueSettings) -> Self {
        Self {
            workers: settings.workers.get() as usize,
            capacity: settings.capacity.get() as usize,
            admission_timeout: settings.admission_timeout,
            render_timeout: settings.render_timeout,
            retention: settings.retention,
            cleanup_interval: settings.cleanup_interval,
        }
    }
}

/// Point-in-time distribution of resident jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub workers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("job `{id}` not found")]
    NotFound { id: String },
    #[error("job `{id}` is not ready (status: {status})")]
    NotReady { id: String, status: JobStatus },
    #[error("job `{id}` failed: {message}")]
    JobFailed { id: String, message: String },
}

pub struct QueueBuilder {
    config: QueueConfig,
    renderer: Arc<dyn DocumentRenderer>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl QueueBuilder {
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Spawns the worker pool and the retention ticker. Must run inside a Tokio runtime.
    pub fn start(self) -> ConversionQueue {
        let QueueBuilder {
            config,
            renderer,
            clock,
            ids,
        } = self;

        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let table = Arc::new(JobTable::new());
        let shutdown = CancellationToken::new();

        let context = Arc::new(WorkerContext {
            table: Arc::clone(&table),
            renderer,
            clock: Arc::clone(&clock),
            receiver: tokio::sync::Mutex::new(receiver),
            shutdown: shutdown.clone(),
            render_timeout: config.render_timeout,
        });
        let mut tasks = worker::spawn_workers(config.workers, context);
        tasks.push(retention::spawn_ticker(
            Arc::clone(&table),
            Arc::clone(&clock),
            config.retention,
            config.cleanup_interval,
            shutdown.clone(),
        ));

        info!(
            target = TARGET,
            op = "queue::start",
            workers = config.workers,
            capacity = config.capacity,
            admission_timeout_ms = config.admission_timeout.as_millis() as u64,
            render_timeout_ms = config.render_timeout.as_millis() as u64,
            "Conversion queue started"
        );

        ConversionQueue {
            inner: Arc::new(QueueInner {
                config,
                table,
                clock,
                ids,
                sender: Mutex::new(Some(sender)),
                shutdown,
                tasks: Mutex::new(tasks),
            }),
        }
    }
}

/// Handle to the conversion queue. Clones share the same jobs and workers.
#[derive(Clone)]
pub struct ConversionQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    config: QueueConfig,
    table: Arc<JobTable>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    sender: Mutex<Option<mpsc::Sender<String>>>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl ConversionQueue {
    pub fn builder(renderer: Arc<dyn DocumentRenderer>) -> QueueBuilder {
        QueueBuilder {
            config: QueueConfig::default(),
            renderer,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidV7Ids),
        }
    }

    pub fn start(config: QueueConfig, renderer: Arc<dyn DocumentRenderer>) -> Self {
        Self::builder(renderer).config(config).start()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Records the job and waits up to the admission timeout for channel space.
    ///
    /// Always returns the new job id. Saturation and shutdown are recorded on
    /// the job as a failure instead of being returned here.
    pub async fn submit(&self, request: ConversionRequest) -> String {
        let inner = &self.inner;
        let ConversionRequest {
            kind,
            content,
            title,
            owner_id,
        } = request;
        let kind_label = kind.clone();

        let id = inner.table.insert_new(
            inner.ids.as_ref(),
            JobInput {
                kind,
                content,
                title,
            },
            &owner_id,
            inner.clock.now(),
        );
        counter!(METRIC_JOBS_SUBMITTED, "kind" => kind_label.clone()).increment(1);
        gauge!(METRIC_JOBS_RESIDENT).set(inner.table.len() as f64);

        let sender = mutex_lock(&inner.sender, TARGET, "submit").clone();
        let admitted = match sender {
            None => Err(JobFailure::QueueClosed),
            Some(sender) => match sender
                .send_timeout(id.clone(), inner.config.admission_timeout)
                .await
            {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Timeout(_)) => Err(JobFailure::QueueSaturated {
                    waited: inner.config.admission_timeout,
                }),
                Err(SendTimeoutError::Closed(_)) => Err(JobFailure::QueueClosed),
            },
        };

        match admitted {
            Ok(()) => debug!(
                target = TARGET,
                op = "queue::submit",
                job_id = %id,
                kind = %kind_label,
                result = "admitted",
                "Conversion job admitted"
            ),
            Err(failure) => self.reject(&id, &kind_label, failure),
        }
        id
    }

    fn reject(&self, id: &str, kind: &str, failure: JobFailure) {
        let reason = failure.reason();
        let message = failure.to_string();
        match self.inner.table.fail(id, failure, self.inner.clock.now()) {
            Ok(_) => {
                counter!(METRIC_JOBS_REJECTED, "reason" => reason).increment(1);
                warn!(
                    target = TARGET,
                    op = "queue::submit",
                    job_id = id,
                    kind,
                    result = "rejected",
                    reason,
                    error = %message,
                    "Conversion job rejected at admission"
                );
            }
            Err(err) => warn!(
                target = TARGET,
                op = "queue::submit",
                job_id = id,
                error = %err,
                "Failed to record admission failure"
            ),
        }
    }

    /// Status snapshot without any result payload.
    pub fn status(&self, id: &str) -> Option<JobView> {
        self.inner.table.view(id)
    }

    /// Result bytes of a completed job. Repeated calls return the same payload.
    pub fn result(&self, id: &str) -> Result<JobOutput, QueueError> {
        self.inner
            .table
            .read(id, |job| match (job.status(), job.output()) {
                (JobStatus::Completed, Some(output)) => Ok(output.clone()),
                (JobStatus::Failed, _) => Err(QueueError::JobFailed {
                    id: id.to_string(),
                    message: job
                        .failure()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                }),
                (status, _) => Err(QueueError::NotReady {
                    id: id.to_string(),
                    status,
                }),
            })
            .unwrap_or_else(|| {
                Err(QueueError::NotFound {
                    id: id.to_string(),
                })
            })
    }

    pub fn stats(&self) -> QueueStats {
        let counts = self.inner.table.counts();
        QueueStats {
            total: counts.total,
            pending: counts.pending,
            processing: counts.processing,
            completed: counts.completed,
            failed: counts.failed,
            workers: self.inner.config.workers,
        }
    }

    /// Runs one retention pass now instead of waiting for the ticker.
    pub fn cleanup_expired(&self) -> usize {
        let inner = &self.inner;
        retention::sweep(&inner.table, inner.clock.as_ref(), inner.config.retention)
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Stops the workers and the retention ticker. In-flight renders finish
    /// first; jobs still queued stay `pending`. Safe to call more than once.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        if !inner.shutdown.is_cancelled() {
            info!(
                target = TARGET,
                op = "queue::shutdown",
                "Shutting down conversion queue"
            );
        }
        inner.shutdown.cancel();
        mutex_lock(&inner.sender, TARGET, "shutdown").take();

        let tasks = std::mem::take(&mut *mutex_lock(&inner.tasks, TARGET, "shutdown"));
        for task in tasks {
            if let Err(err) = task.await {
                warn!(
                    target = TARGET,
                    op = "queue::shutdown",
                    error = %err,
                    "Queue task ended abnormally"
                );
            }
        }

        let stats = self.stats();
        info!(
            target = TARGET,
            op = "queue::shutdown",
            result = "stopped",
            pending = stats.pending,
            total = stats.total,
            "Conversion queue stopped"
        );
    }
}
