//! Conversion request validation, output naming and the supported format catalogue.

use std::str::FromStr;

use serde::Serialize;

use crate::{
    domain::{error::DomainError, types::JobKind},
    util::bytes::format_bytes,
};

pub const MAX_CONTENT_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_TITLE_CHARS: usize = 255;
const FILENAME_FORBIDDEN: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];
const MARKDOWN_HINT_THRESHOLD: usize = 1000;
const DEFAULT_FILE_STEM: &str = "document";

/// A caller's request before it is handed to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub kind: String,
    pub content: String,
    pub title: String,
    pub owner_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: &'static str,
    pub message: String,
}

impl ValidationIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl ConversionRequest {
    pub fn new(kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
            title: String::new(),
            owner_id: String::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into().trim().to_string();
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = owner_id.into();
        self
    }

    /// Collects every problem with the request rather than stopping at the first.
    pub fn issues(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if JobKind::from_str(&self.kind).is_err() {
            issues.push(ValidationIssue::new(
                "kind",
                format!("unsupported conversion kind `{}`", self.kind),
            ));
        }

        if self.content.trim().is_empty() {
            issues.push(ValidationIssue::new(
                "content",
                "content is required and must not be blank",
            ));
        }
        if self.content.len() > MAX_CONTENT_BYTES {
            issues.push(ValidationIssue::new(
                "content",
                format!(
                    "content is {} bytes, over the {} limit",
                    self.content.len(),
                    format_bytes(MAX_CONTENT_BYTES as u64)
                ),
            ));
        }
        if self.content.len() > MARKDOWN_HINT_THRESHOLD && !looks_like_markdown(&self.content) {
            issues.push(ValidationIssue::new(
                "content",
                "content does not appear to contain markdown formatting",
            ));
        }

        let title = self.title.trim();
        if title.chars().count() > MAX_TITLE_CHARS {
            issues.push(ValidationIssue::new(
                "title",
                format!("title must not exceed {MAX_TITLE_CHARS} characters"),
            ));
        }
        if title.contains(FILENAME_FORBIDDEN) {
            issues.push(ValidationIssue::new(
                "title",
                "title contains characters that are invalid in file names",
            ));
        }

        issues
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let issues = self.issues();
        if issues.is_empty() {
            return Ok(());
        }
        let message = issues
            .iter()
            .map(|issue| format!("{}: {}", issue.field, issue.message))
            .collect::<Vec<_>>()
            .join("; ");
        Err(DomainError::validation(message))
    }
}

fn looks_like_markdown(content: &str) -> bool {
    content.contains('#')
        || content.contains("- ")
        || content.contains("+ ")
        || content.contains('*')
        || content.contains('`')
        || (content.contains('[') && content.contains(']'))
}

/// File name for a downloaded result, e.g. `Report.pdf` or `document.tex`.
pub fn output_filename(kind: &str, title: &str) -> String {
    let extension = JobKind::from_str(kind)
        .map(JobKind::extension)
        .unwrap_or(".txt");
    let title = title.trim();
    let stem = if title.is_empty() {
        DEFAULT_FILE_STEM
    } else {
        title
    };
    format!("{stem}{extension}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportedFormat {
    pub id: String,
    pub name: String,
    pub description: String,
    pub input_type: &'static str,
    pub output_type: &'static str,
}

pub fn supported_formats() -> Vec<SupportedFormat> {
    JobKind::ALL
        .into_iter()
        .map(|kind| {
            let label = match kind {
                JobKind::Pdf => "PDF",
                JobKind::Html => "HTML",
                JobKind::Docx => "Microsoft Word (DOCX)",
                JobKind::Latex => "LaTeX",
            };
            SupportedFormat {
                id: format!("markdown-to-{}", kind.as_str()),
                name: format!("Markdown to {label}"),
                description: format!("Converts markdown documents to {label}"),
                input_type: "text/markdown",
                output_type: kind.content_type(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_plain_request() {
        let request = ConversionRequest::new("pdf", "# Hello").with_title("  Greeting  ");
        assert_eq!(request.title, "Greeting");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn reports_every_issue() {
        let request = ConversionRequest::new("bogus", "   ").with_title("a/b");
        let fields: Vec<_> = request.issues().into_iter().map(|i| i.field).collect();
        assert_eq!(fields, vec!["kind", "content", "title"]);

        let err = request.validate().expect_err("invalid request");
        assert!(err.to_string().contains("unsupported conversion kind"));
    }

    #[test]
    fn rejects_oversized_content_and_long_titles() {
        let content = "#".repeat(MAX_CONTENT_BYTES + 1);
        let request = ConversionRequest::new("html", content).with_title("t".repeat(256));
        let issues = request.issues();
        assert!(issues.iter().any(|i| i.message.contains("10 MiB")));
        assert!(issues.iter().any(|i| i.message.contains("255")));
    }

    #[test]
    fn long_plain_text_is_flagged() {
        let request = ConversionRequest::new("html", "plain words ".repeat(100));
        let issues = request.issues();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("markdown"));
    }

    #[test]
    fn output_filename_falls_back_to_document() {
        assert_eq!(output_filename("pdf", "Report"), "Report.pdf");
        assert_eq!(output_filename("latex", ""), "document.tex");
        assert_eq!(output_filename("bogus", "x"), "x.txt");
    }

    #[test]
    fn catalogue_lists_four_formats() {
        let formats = supported_formats();
        let ids: Vec<_> = formats.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "markdown-to-pdf",
                "markdown-to-html",
                "markdown-to-docx",
                "markdown-to-latex"
            ]
        );
        assert_eq!(formats[0].output_type, "application/pdf");
    }
}
