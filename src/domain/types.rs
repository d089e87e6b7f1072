//! Shared domain enumerations for conversion jobs.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Output formats the conversion engine knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Pdf,
    Html,
    Docx,
    Latex,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [JobKind::Pdf, JobKind::Html, JobKind::Docx, JobKind::Latex];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Pdf => "pdf",
            JobKind::Html => "html",
            JobKind::Docx => "docx",
            JobKind::Latex => "latex",
        }
    }

    /// MIME type stored as `resultType` on completed jobs.
    pub fn content_type(self) -> &'static str {
        match self {
            JobKind::Pdf => "application/pdf",
            JobKind::Html => "text/html",
            JobKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            JobKind::Latex => "application/x-tex",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            JobKind::Pdf => ".pdf",
            JobKind::Html => ".html",
            JobKind::Docx => ".docx",
            JobKind::Latex => ".tex",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownJobKind(pub String);

impl fmt::Display for UnknownJobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported conversion kind `{}`", self.0)
    }
}

impl std::error::Error for UnknownJobKind {}

impl FromStr for JobKind {
    type Err = UnknownJobKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(JobKind::Pdf),
            "html" => Ok(JobKind::Html),
            "docx" => Ok(JobKind::Docx),
            "latex" | "tex" => Ok(JobKind::Latex),
            _ => Err(UnknownJobKind(value.to_string())),
        }
    }
}

/// Lifecycle of a conversion job. Ordering follows the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_case_insensitively() {
        assert_eq!("PDF".parse::<JobKind>(), Ok(JobKind::Pdf));
        assert_eq!(" html ".parse::<JobKind>(), Ok(JobKind::Html));
        assert_eq!("tex".parse::<JobKind>(), Ok(JobKind::Latex));
    }

    #[test]
    fn unknown_kind_names_the_input() {
        let err = "bogus".parse::<JobKind>().expect_err("bogus is not a kind");
        assert_eq!(err.to_string(), "unsupported conversion kind `bogus`");
    }

    #[test]
    fn docx_uses_office_open_xml_type() {
        assert_eq!(
            JobKind::Docx.content_type(),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(JobKind::Latex.extension(), ".tex");
    }

    #[test]
    fn status_order_follows_lifecycle() {
        assert!(JobStatus::Pending < JobStatus::Processing);
        assert!(JobStatus::Processing < JobStatus::Completed);
        assert!(JobStatus::Completed.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }
}
