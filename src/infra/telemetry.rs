use std::{io, sync::Once};

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber writing to stderr and register metric descriptions.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    // stdout carries the command's JSON output, so logs go to stderr.
    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "docflux_jobs_submitted_total",
            Unit::Count,
            "Total number of conversion jobs accepted into the job table."
        );
        describe_counter!(
            "docflux_jobs_rejected_total",
            Unit::Count,
            "Total number of jobs failed at admission (saturated or closed queue)."
        );
        describe_counter!(
            "docflux_jobs_completed_total",
            Unit::Count,
            "Total number of jobs whose render succeeded."
        );
        describe_counter!(
            "docflux_jobs_failed_total",
            Unit::Count,
            "Total number of jobs whose render failed."
        );
        describe_histogram!(
            "docflux_render_ms",
            Unit::Milliseconds,
            "Render latency in milliseconds, measured by the worker."
        );
        describe_counter!(
            "docflux_jobs_evicted_total",
            Unit::Count,
            "Total number of finished jobs removed by retention cleanup."
        );
        describe_gauge!(
            "docflux_jobs_resident",
            Unit::Count,
            "Current number of jobs held in the job table."
        );
    });
}
