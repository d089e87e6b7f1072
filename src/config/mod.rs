//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "docflux";
const ENV_PREFIX: &str = "DOCFLUX";
const DEFAULT_QUEUE_WORKERS: u64 = 3;
const DEFAULT_QUEUE_CAPACITY: u64 = 100;
const DEFAULT_ADMISSION_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RETENTION_HOURS: u64 = 24;
const MAX_RETENTION_HOURS: u64 = 24 * 365 * 10;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 3_600;
const DEFAULT_GOTENBERG_URL: &str = "http://gotenberg:3000";
const DEFAULT_PANDOC_PATH: &str = "pandoc";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
const DEFAULT_WAIT_SECS: u64 = 300;

/// Command-line arguments for the docflux binary.
#[derive(Debug, Parser)]
#[command(name = "docflux", version, about = "Markdown conversion queue")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "DOCFLUX_CONFIG_FILE", value_name = "PATH", global = true)]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: SettingsOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Convert markdown files through the job queue.
    Convert(ConvertArgs),
    /// List the supported conversion formats.
    Formats,
}

#[derive(Debug, Args, Clone)]
pub struct ConvertArgs {
    /// Target format (pdf, html, docx or latex).
    #[arg(long, value_name = "KIND")]
    pub kind: String,

    /// Document title; defaults to each file's stem.
    #[arg(long, value_name = "TITLE")]
    pub title: Option<String>,

    /// Owner recorded on the submitted jobs.
    #[arg(long, value_name = "OWNER", default_value = "")]
    pub owner: String,

    /// Directory the converted documents are written to.
    #[arg(long = "output-dir", value_name = "DIR", default_value = ".", value_hint = ValueHint::DirPath)]
    pub output_dir: PathBuf,

    /// Give up waiting for a job after this many seconds.
    #[arg(long = "wait-seconds", value_name = "SECONDS", default_value_t = DEFAULT_WAIT_SECS)]
    pub wait_seconds: u64,

    /// Markdown files to convert.
    #[arg(value_name = "FILE", required = true, value_hint = ValueHint::FilePath)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SettingsOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the number of conversion workers.
    #[arg(long = "queue-workers", value_name = "COUNT", global = true)]
    pub queue_workers: Option<u64>,

    /// Override the admission channel capacity.
    #[arg(long = "queue-capacity", value_name = "COUNT", global = true)]
    pub queue_capacity: Option<u64>,

    /// Override the Gotenberg base URL used for PDF output.
    #[arg(long = "gotenberg-url", value_name = "URL", global = true)]
    pub gotenberg_url: Option<String>,

    /// Override the pandoc executable used for DOCX output.
    #[arg(long = "pandoc-path", value_name = "PATH", global = true)]
    pub pandoc_path: Option<PathBuf>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub queue: QueueSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub workers: NonZeroU32,
    pub capacity: NonZeroU32,
    pub admission_timeout: Duration,
    pub render_timeout: Duration,
    pub retention: Duration,
    pub cleanup_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub gotenberg_url: Url,
    pub pandoc_path: PathBuf,
    pub http_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    queue: RawQueueSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &SettingsOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(workers) = overrides.queue_workers {
            self.queue.workers = Some(workers);
        }
        if let Some(capacity) = overrides.queue_capacity {
            self.queue.capacity = Some(capacity);
        }
        if let Some(url) = overrides.gotenberg_url.as_ref() {
            self.render.gotenberg_url = Some(url.clone());
        }
        if let Some(path) = overrides.pandoc_path.as_ref() {
            self.render.pandoc_path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            queue,
            render,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            queue: build_queue_settings(queue)?,
            render: build_render_settings(render)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_queue_settings(queue: RawQueueSettings) -> Result<QueueSettings, LoadError> {
    let workers = non_zero_u32(
        queue.workers.unwrap_or(DEFAULT_QUEUE_WORKERS),
        "queue.workers",
    )?;
    let capacity = non_zero_u32(
        queue.capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
        "queue.capacity",
    )?;

    let admission_timeout = Duration::from_millis(positive(
        queue
            .admission_timeout_ms
            .unwrap_or(DEFAULT_ADMISSION_TIMEOUT_MS),
        "queue.admission_timeout_ms",
    )?);
    let render_timeout = Duration::from_secs(positive(
        queue
            .render_timeout_seconds
            .unwrap_or(DEFAULT_RENDER_TIMEOUT_SECS),
        "queue.render_timeout_seconds",
    )?);
    let retention_hours = positive(
        queue.retention_hours.unwrap_or(DEFAULT_RETENTION_HOURS),
        "queue.retention_hours",
    )?;
    if retention_hours > MAX_RETENTION_HOURS {
        return Err(LoadError::invalid(
            "queue.retention_hours",
            format!("must not exceed {MAX_RETENTION_HOURS}"),
        ));
    }
    let retention_secs = retention_hours * 3_600;
    let cleanup_interval = Duration::from_secs(positive(
        queue
            .cleanup_interval_seconds
            .unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS),
        "queue.cleanup_interval_seconds",
    )?);

    Ok(QueueSettings {
        workers,
        capacity,
        admission_timeout,
        render_timeout,
        retention: Duration::from_secs(retention_secs),
        cleanup_interval,
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let raw_url = render
        .gotenberg_url
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_GOTENBERG_URL.to_string());
    let gotenberg_url = Url::parse(&raw_url)
        .map_err(|err| LoadError::invalid("render.gotenberg_url", format!("`{raw_url}`: {err}")))?;
    if !matches!(gotenberg_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "render.gotenberg_url",
            "scheme must be http or https",
        ));
    }

    let pandoc_path = render
        .pandoc_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PANDOC_PATH));
    if pandoc_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "render.pandoc_path",
            "path must not be empty",
        ));
    }

    let http_timeout = Duration::from_secs(positive(
        render
            .http_timeout_seconds
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        "render.http_timeout_seconds",
    )?);

    Ok(RenderSettings {
        gotenberg_url,
        pandoc_path,
        http_timeout,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawQueueSettings {
    workers: Option<u64>,
    capacity: Option<u64>,
    admission_timeout_ms: Option<u64>,
    render_timeout_seconds: Option<u64>,
    retention_hours: Option<u64>,
    cleanup_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    gotenberg_url: Option<String>,
    pandoc_path: Option<PathBuf>,
    http_timeout_seconds: Option<u64>,
}

fn positive(value: u64, key: &'static str) -> Result<u64, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(value)
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value_u32: u32 = positive(value, key)?
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn defaults_match_queue_design_values() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.queue.workers.get(), 3);
        assert_eq!(settings.queue.capacity.get(), 100);
        assert_eq!(settings.queue.admission_timeout, Duration::from_secs(5));
        assert_eq!(settings.queue.retention, Duration::from_secs(24 * 3_600));
        assert_eq!(settings.queue.cleanup_interval, Duration::from_secs(3_600));
        assert_eq!(
            settings.render.gotenberg_url.as_str(),
            "http://gotenberg:3000/"
        );
        assert_eq!(settings.render.pandoc_path, PathBuf::from("pandoc"));
        assert!(matches!(settings.logging.format, LogFormat::Compact));
    }

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.queue.workers = Some(8);
        raw.logging.level = Some("info".to_string());

        let overrides = SettingsOverrides {
            queue_workers: Some(2),
            log_level: Some("debug".to_string()),
            log_json: Some(true),
            ..Default::default()
        };
        raw.apply_overrides(&overrides);

        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.queue.workers.get(), 2);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn zero_workers_are_rejected() {
        let mut raw = RawSettings::default();
        raw.queue.workers = Some(0);

        let err = Settings::from_raw(raw).expect_err("zero workers");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "queue.workers",
                ..
            }
        ));
    }

    #[test]
    fn retention_hours_are_capped() {
        let mut raw = RawSettings::default();
        raw.queue.retention_hours = Some(1_000_000_000);
        let err = Settings::from_raw(raw).expect_err("retention too large");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "queue.retention_hours",
                ..
            }
        ));

        let mut raw = RawSettings::default();
        raw.queue.retention_hours = Some(MAX_RETENTION_HOURS);
        let settings = Settings::from_raw(raw).expect("ten years is accepted");
        assert_eq!(
            settings.queue.retention,
            Duration::from_secs(MAX_RETENTION_HOURS * 3_600)
        );
    }

    #[test]
    fn gotenberg_url_must_be_http() {
        let mut raw = RawSettings::default();
        raw.render.gotenberg_url = Some("ftp://gotenberg".to_string());
        assert!(Settings::from_raw(raw).is_err());

        let mut raw = RawSettings::default();
        raw.render.gotenberg_url = Some("not a url".to_string());
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn parse_convert_arguments() {
        let args = CliArgs::parse_from([
            "docflux",
            "convert",
            "--kind",
            "pdf",
            "--title",
            "Report",
            "--output-dir",
            "/tmp/out",
            "--queue-workers",
            "4",
            "a.md",
            "b.md",
        ]);

        assert_eq!(args.overrides.queue_workers, Some(4));
        match args.command {
            Command::Convert(convert) => {
                assert_eq!(convert.kind, "pdf");
                assert_eq!(convert.title.as_deref(), Some("Report"));
                assert_eq!(convert.output_dir, PathBuf::from("/tmp/out"));
                assert_eq!(convert.wait_seconds, DEFAULT_WAIT_SECS);
                assert_eq!(
                    convert.files,
                    vec![PathBuf::from("a.md"), PathBuf::from("b.md")]
                );
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_formats_command() {
        let args = CliArgs::parse_from(["docflux", "--log-json", "true", "formats"]);
        assert!(matches!(args.command, Command::Formats));
        assert_eq!(args.overrides.log_json, Some(true));
    }

    #[test]
    #[serial]
    fn environment_overrides_defaults_but_not_cli() {
        // SAFETY: serialised with every other test that touches the environment.
        unsafe {
            std::env::set_var("DOCFLUX__QUEUE__WORKERS", "7");
            std::env::set_var("DOCFLUX__QUEUE__CAPACITY", "12");
        }

        let args = CliArgs::parse_from(["docflux", "--queue-capacity", "9", "formats"]);
        let loaded = load(&args);

        unsafe {
            std::env::remove_var("DOCFLUX__QUEUE__WORKERS");
            std::env::remove_var("DOCFLUX__QUEUE__CAPACITY");
        }

        let settings = loaded.expect("settings load");
        assert_eq!(settings.queue.workers.get(), 7);
        assert_eq!(settings.queue.capacity.get(), 9);
    }
}
