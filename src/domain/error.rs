use std::time::Duration;

use thiserror::Error;

use super::types::JobStatus;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("domain invariant violated: {message}")]
    Invariant { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    pub(crate) fn illegal_transition(from: JobStatus, to: JobStatus) -> Self {
        Self::invariant(format!("job cannot move from `{from}` to `{to}`"))
    }
}

/// Why a job ended up `failed`. The display text is what callers see as `errorMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobFailure {
    #[error("processing queue saturated after {}s, try again later", waited.as_secs_f32())]
    QueueSaturated { waited: Duration },
    #[error("processing queue is shut down")]
    QueueClosed,
    #[error("unsupported conversion kind `{kind}`")]
    UnsupportedKind { kind: String },
    #[error("rendering failed: {message}")]
    Render { message: String },
    #[error("rendering exceeded the {}s deadline", limit.as_secs_f32())]
    RenderTimeout { limit: Duration },
    #[error("rendering task panicked")]
    RenderPanicked,
}

impl JobFailure {
    /// Stable label used for metrics and structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            JobFailure::QueueSaturated { .. } => "queue_saturated",
            JobFailure::QueueClosed => "queue_closed",
            JobFailure::UnsupportedKind { .. } => "unsupported_kind",
            JobFailure::Render { .. } => "render_error",
            JobFailure::RenderTimeout { .. } => "render_timeout",
            JobFailure::RenderPanicked => "render_panicked",
        }
    }

    /// Admission failures never reach a worker.
    pub fn is_admission(&self) -> bool {
        matches!(
            self,
            JobFailure::QueueSaturated { .. } | JobFailure::QueueClosed
        )
    }
}
