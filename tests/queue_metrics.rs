use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use docflux::{
    application::{
        jobs::{ConversionQueue, ManualClock, QueueConfig},
        render::{DocumentRenderer, RenderError, RenderRequest, RenderedDocument},
    },
    domain::{request::ConversionRequest, types::JobStatus},
};
use metrics_util::debugging::DebuggingRecorder;
use time::macros::datetime;

struct EchoRenderer;

#[async_trait]
impl DocumentRenderer for EchoRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedDocument, RenderError> {
        if request.content.contains("FAIL") {
            return Err(RenderError::markdown("echo failure"));
        }
        Ok(RenderedDocument::new(
            request.content.clone().into_bytes(),
            request.kind,
        ))
    }
}

async fn wait_terminal(queue: &ConversionQueue, id: &str) {
    let poll = async {
        loop {
            match queue.status(id) {
                Some(job) if job.status.is_terminal() => return job.status,
                _ => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        }
    };
    let status: JobStatus = tokio::time::timeout(Duration::from_secs(10), poll)
        .await
        .expect("job should settle");
    assert!(status.is_terminal());
}

#[tokio::test]
async fn queue_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let clock = Arc::new(ManualClock::new(datetime!(2026-05-01 08:00 UTC)));
    let queue = ConversionQueue::builder(Arc::new(EchoRenderer))
        .config(QueueConfig {
            workers: 1,
            capacity: 4,
            ..QueueConfig::default()
        })
        .clock(clock.clone())
        .start();

    // completed + render latency
    let ok = queue.submit(ConversionRequest::new("html", "# ok")).await;
    wait_terminal(&queue, &ok).await;

    // failed render
    let failed = queue.submit(ConversionRequest::new("html", "FAIL")).await;
    wait_terminal(&queue, &failed).await;

    // eviction + resident gauge
    clock.advance(time::Duration::hours(48));
    assert_eq!(queue.cleanup_expired(), 2);

    // admission rejection
    queue.shutdown().await;
    let closed = queue.submit(ConversionRequest::new("html", "# late")).await;
    wait_terminal(&queue, &closed).await;

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for expected in [
        "docflux_jobs_submitted_total",
        "docflux_jobs_rejected_total",
        "docflux_jobs_completed_total",
        "docflux_jobs_failed_total",
        "docflux_render_ms",
        "docflux_jobs_evicted_total",
        "docflux_jobs_resident",
    ] {
        assert!(names.contains(expected), "missing metric `{expected}`");
    }
}
