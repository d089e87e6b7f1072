use std::{sync::Arc, time::Duration};

use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{clock::Clock, table::JobTable};

const TARGET: &str = "application::jobs::retention";
pub(crate) const METRIC_JOBS_EVICTED: &str = "docflux_jobs_evicted_total";
pub(crate) const METRIC_JOBS_RESIDENT: &str = "docflux_jobs_resident";

/// Evicts terminal jobs that finished more than `window` ago. Returns how many were dropped.
pub(crate) fn sweep(table: &JobTable, clock: &dyn Clock, window: Duration) -> usize {
    let now = clock.now();
    // A window reaching past the representable range means nothing is old enough yet.
    let cutoff = time::Duration::try_from(window)
        .ok()
        .and_then(|window| now.checked_sub(window));
    let evicted = match cutoff {
        Some(cutoff) => table.evict_finished_before(cutoff),
        None => 0,
    };
    let resident = table.len();

    counter!(METRIC_JOBS_EVICTED).increment(evicted as u64);
    gauge!(METRIC_JOBS_RESIDENT).set(resident as f64);
    info!(
        target = TARGET,
        op = "retention::sweep",
        evicted,
        resident,
        window_secs = window.as_secs(),
        "Retention sweep finished"
    );
    evicted
}

/// Runs [`sweep`] every `interval` until `shutdown` fires.
pub(crate) fn spawn_ticker(
    table: Arc<JobTable>,
    clock: Arc<dyn Clock>,
    window: Duration,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // Skip the first immediate tick
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    sweep(&table, clock.as_ref(), window);
                }
            }
        }
    })
}
