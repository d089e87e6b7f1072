use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    process,
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use docflux::{
    application::{
        error::AppError,
        jobs::{BatchConverter, BatchOutcome, ConversionQueue, QueueConfig, QueueStats},
        render::{ConversionEngine, EngineConfig},
    },
    config::{self, ConvertArgs},
    domain::{
        request::{ConversionRequest, output_filename, supported_formats},
        types::JobKind,
    },
    infra::{error::InfraError, telemetry},
    util::bytes::format_bytes,
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let messages = error.messages();
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?messages, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Convert(args) => run_convert(settings, args).await,
        config::Command::Formats => print_json(&supported_formats()),
    }
}

/// Convert report printed on stdout.
#[derive(Debug, Serialize)]
struct ConvertReport {
    jobs: Vec<ConvertSummary>,
    stats: QueueStats,
}

#[derive(Debug, Serialize)]
struct ConvertSummary {
    source: PathBuf,
    job_id: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn run_convert(settings: config::Settings, args: ConvertArgs) -> Result<(), AppError> {
    let kind = JobKind::from_str(&args.kind).map_err(|err| AppError::validation(err.to_string()))?;

    let mut requests = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(InfraError::from)?;
        let title = args.title.clone().unwrap_or_else(|| file_stem(path));
        let request = ConversionRequest::new(kind.as_str(), content)
            .with_title(title)
            .with_owner(args.owner.clone());
        request
            .validate()
            .map_err(|err| AppError::validation(format!("{}: {err}", path.display())))?;
        requests.push(request);
    }

    tokio::fs::create_dir_all(&args.output_dir)
        .await
        .map_err(InfraError::from)?;

    let engine = ConversionEngine::new(&EngineConfig::from(&settings.render))?;
    let queue = ConversionQueue::start(QueueConfig::from(&settings.queue), Arc::new(engine));

    info!(
        target = "docflux::convert",
        op = "convert",
        kind = %kind,
        files = requests.len(),
        workers = settings.queue.workers.get(),
        "Submitting conversion batch"
    );

    let outcomes = BatchConverter::new(&queue, Duration::from_secs(args.wait_seconds))
        .run(requests)
        .await;

    let mut summaries = Vec::with_capacity(outcomes.len());
    let mut used_names = HashSet::new();
    let mut write_error = None;
    for (source, outcome) in args.files.iter().zip(outcomes) {
        let summary = match outcome {
            BatchOutcome::Completed { job, data, .. } => {
                let output = args
                    .output_dir
                    .join(unique_filename(&mut used_names, &job.kind, &job.title));
                if let Err(err) = tokio::fs::write(&output, &data).await {
                    write_error.get_or_insert(err);
                    ConvertSummary {
                        source: source.clone(),
                        job_id: job.id,
                        status: "write_failed",
                        output: Some(output),
                        size: None,
                        error: Some("failed to write output file".to_string()),
                    }
                } else {
                    ConvertSummary {
                        source: source.clone(),
                        job_id: job.id,
                        status: job.status.as_str(),
                        output: Some(output),
                        size: Some(format_bytes(data.len() as u64)),
                        error: None,
                    }
                }
            }
            BatchOutcome::Failed { job, message } => ConvertSummary {
                source: source.clone(),
                job_id: job.id,
                status: job.status.as_str(),
                output: None,
                size: None,
                error: Some(message),
            },
            BatchOutcome::TimedOut {
                job_id,
                last_status,
            } => ConvertSummary {
                source: source.clone(),
                job_id,
                status: "timed_out",
                output: None,
                size: None,
                error: Some(format!(
                    "still {} after {}s",
                    last_status.map(|status| status.as_str()).unwrap_or("unknown"),
                    args.wait_seconds
                )),
            },
        };
        summaries.push(summary);
    }

    queue.shutdown().await;
    let stats = queue.stats();
    info!(
        target = "docflux::convert",
        op = "convert",
        completed = stats.completed,
        failed = stats.failed,
        pending = stats.pending,
        processing = stats.processing,
        "Conversion batch finished"
    );

    let failed = summaries
        .iter()
        .filter(|summary| summary.error.is_some())
        .count();
    let total = summaries.len();
    print_json(&ConvertReport {
        jobs: summaries,
        stats,
    })?;

    if let Some(err) = write_error {
        return Err(InfraError::from(err).into());
    }
    if failed > 0 {
        return Err(AppError::JobsFailed { failed, total });
    }
    Ok(())
}

/// `output_filename`, suffixed with `-2`, `-3`, ... when a batch reuses a title.
fn unique_filename(used: &mut HashSet<String>, kind: &str, title: &str) -> String {
    let mut name = output_filename(kind, title);
    let mut attempt = 1;
    while !used.insert(name.clone()) {
        attempt += 1;
        name = output_filename(kind, &format!("{title}-{attempt}"));
    }
    name
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(InfraError::from)?;
    println!("{rendered}");
    Ok(())
}
