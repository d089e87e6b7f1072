use std::{
    io::{self, ErrorKind, Write},
    path::PathBuf,
    process::Stdio,
    time::Instant,
};

use bytes::Bytes;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PandocError {
    #[error("failed to prepare temporary file: {0}")]
    Io(io::Error),
    #[error("pandoc invocation failed (exit {exit_code:?}): {stderr}")]
    Cli {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("pandoc unavailable: {0}")]
    NotFound(io::Error),
    #[error("failed to read pandoc output: {0}")]
    Read(io::Error),
}

/// Markdown to DOCX through an external `pandoc` executable.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    cli_path: PathBuf,
}

impl PandocConverter {
    pub fn new(cli_path: PathBuf) -> Self {
        Self { cli_path }
    }

    pub async fn markdown_to_docx(&self, markdown: &str, title: &str) -> Result<Bytes, PandocError> {
        let started_at = Instant::now();

        let mut input_file = tempfile::Builder::new()
            .suffix(".md")
            .tempfile()
            .map_err(PandocError::Io)?;
        input_file
            .write_all(markdown.as_bytes())
            .map_err(PandocError::Io)?;
        input_file.flush().map_err(PandocError::Io)?;

        let output_file: NamedTempFile = tempfile::Builder::new()
            .suffix(".docx")
            .tempfile()
            .map_err(PandocError::Io)?;

        let mut command = Command::new(&self.cli_path);
        command
            .arg("--from")
            .arg("markdown")
            .arg("--to")
            .arg("docx")
            .arg("--output")
            .arg(output_file.path());
        let title = title.trim();
        if !title.is_empty() {
            command.arg("--metadata").arg(format!("title={title}"));
        }
        command
            .arg(input_file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = command.output().await.map_err(|err| {
            warn!(
                target = "application::render::pandoc",
                op = "pandoc::markdown_to_docx",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error_code = "spawn_cli",
                error = %err,
                "Failed to spawn pandoc"
            );
            if err.kind() == ErrorKind::NotFound {
                PandocError::NotFound(err)
            } else {
                PandocError::Io(err)
            }
        })?;

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(
                target = "application::render::pandoc",
                op = "pandoc::markdown_to_docx",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "pandoc_cli",
                stderr = %stderr,
                "pandoc invocation failed"
            );
            return Err(PandocError::Cli { exit_code, stderr });
        }

        let docx = tokio::fs::read(output_file.path())
            .await
            .map_err(PandocError::Read)?;

        info!(
            target = "application::render::pandoc",
            op = "pandoc::markdown_to_docx",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            docx_bytes = docx.len(),
            "pandoc produced DOCX"
        );
        Ok(Bytes::from(docx))
    }
}
