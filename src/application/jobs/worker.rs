use std::{
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

use metrics::{counter, histogram};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    application::render::{DocumentRenderer, RenderRequest, RenderedDocument},
    domain::{
        entities::{JobInput, JobOutput},
        error::JobFailure,
        types::JobKind,
    },
};

use super::{clock::Clock, table::JobTable};

const TARGET: &str = "application::jobs::worker";
pub(crate) const METRIC_JOBS_COMPLETED: &str = "docflux_jobs_completed_total";
pub(crate) const METRIC_JOBS_FAILED: &str = "docflux_jobs_failed_total";
pub(crate) const METRIC_RENDER_MS: &str = "docflux_render_ms";

/// State shared by every worker in the pool.
pub(crate) struct WorkerContext {
    pub table: Arc<JobTable>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub clock: Arc<dyn Clock>,
    pub receiver: Mutex<mpsc::Receiver<String>>,
    pub shutdown: CancellationToken,
    pub render_timeout: Duration,
}

pub(crate) fn spawn_workers(count: usize, context: Arc<WorkerContext>) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker_id| tokio::spawn(run_worker(worker_id, Arc::clone(&context))))
        .collect()
}

async fn run_worker(worker_id: usize, context: Arc<WorkerContext>) {
    debug!(target = TARGET, op = "worker::start", worker_id, "Worker started");

    loop {
        let next = tokio::select! {
            biased;
            _ = context.shutdown.cancelled() => None,
            job_id = next_job(&context.receiver) => job_id,
        };
        let Some(job_id) = next else {
            break;
        };
        // A job received in the same instant as shutdown stays pending.
        if context.shutdown.is_cancelled() {
            debug!(
                target = TARGET,
                op = "worker::dequeue",
                worker_id,
                job_id = %job_id,
                result = "abandoned",
                "Shutdown observed before claim"
            );
            break;
        }
        process_job(worker_id, &context, &job_id).await;
    }

    debug!(target = TARGET, op = "worker::stop", worker_id, "Worker stopped");
}

async fn next_job(receiver: &Mutex<mpsc::Receiver<String>>) -> Option<String> {
    receiver.lock().await.recv().await
}

async fn process_job(worker_id: usize, context: &WorkerContext, job_id: &str) {
    let job = match context.table.claim(job_id) {
        Ok(job) => job,
        Err(err) => {
            warn!(
                target = TARGET,
                op = "worker::claim",
                worker_id,
                job_id,
                result = "skipped",
                error = %err,
                "Dequeued job could not be claimed"
            );
            return;
        }
    };

    let kind = job.kind().to_string();
    let started_at = Instant::now();
    let outcome = render_job(context, job.input()).await;
    let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
    let finished_at = context.clock.now();

    match outcome {
        Ok(document) => {
            let bytes = document.bytes.len();
            let output = JobOutput {
                data: document.bytes,
                content_type: document.content_type,
            };
            if let Err(err) = context.table.complete(job_id, output, finished_at) {
                warn!(
                    target = TARGET,
                    op = "worker::complete",
                    worker_id,
                    job_id,
                    error = %err,
                    "Failed to record completed job"
                );
                return;
            }
            counter!(METRIC_JOBS_COMPLETED, "kind" => kind.clone()).increment(1);
            histogram!(METRIC_RENDER_MS, "kind" => kind.clone()).record(elapsed_ms);
            info!(
                target = TARGET,
                op = "worker::process",
                worker_id,
                job_id,
                kind = %kind,
                result = "completed",
                elapsed_ms = elapsed_ms as u64,
                bytes,
                "Conversion job completed"
            );
        }
        Err(failure) => {
            let reason = failure.reason();
            let message = failure.to_string();
            if let Err(err) = context.table.fail(job_id, failure, finished_at) {
                warn!(
                    target = TARGET,
                    op = "worker::fail",
                    worker_id,
                    job_id,
                    error = %err,
                    "Failed to record failed job"
                );
                return;
            }
            counter!(METRIC_JOBS_FAILED, "kind" => kind.clone(), "reason" => reason).increment(1);
            warn!(
                target = TARGET,
                op = "worker::process",
                worker_id,
                job_id,
                kind = %kind,
                result = "failed",
                reason,
                elapsed_ms = elapsed_ms as u64,
                error = %message,
                "Conversion job failed"
            );
        }
    }
}

/// Runs the renderer on its own task so a panic or a stuck call cannot take the worker down.
async fn render_job(
    context: &WorkerContext,
    input: &JobInput,
) -> Result<RenderedDocument, JobFailure> {
    let kind = JobKind::from_str(&input.kind)
        .map_err(|unknown| JobFailure::UnsupportedKind { kind: unknown.0 })?;
    let request = RenderRequest::new(kind, input.content.clone(), input.title.clone());
    let renderer = Arc::clone(&context.renderer);
    let mut task = tokio::spawn(async move { renderer.render(&request).await });

    match tokio::time::timeout(context.render_timeout, &mut task).await {
        Ok(Ok(Ok(document))) => Ok(document),
        Ok(Ok(Err(err))) => Err(JobFailure::Render {
            message: err.to_string(),
        }),
        Ok(Err(join_err)) if join_err.is_panic() => Err(JobFailure::RenderPanicked),
        Ok(Err(join_err)) => Err(JobFailure::Render {
            message: join_err.to_string(),
        }),
        Err(_) => {
            task.abort();
            Err(JobFailure::RenderTimeout {
                limit: context.render_timeout,
            })
        }
    }
}
