//! Conversion job record and its sanitized status projection.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::{
    error::{DomainError, JobFailure},
    types::JobStatus,
};

/// Owner recorded when the caller does not identify itself.
pub const ANONYMOUS_OWNER: &str = "anonymous";

/// Immutable input captured at submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInput {
    pub kind: String,
    pub content: String,
    pub title: String,
}

/// Payload stored on a completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutput {
    pub data: Bytes,
    pub content_type: String,
}

/// One conversion request and its outcome. Only the job table mutates it,
/// and only through the transition methods below.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    id: String,
    input: Arc<JobInput>,
    owner_id: String,
    status: JobStatus,
    created_at: OffsetDateTime,
    completed_at: Option<OffsetDateTime>,
    output: Option<JobOutput>,
    failure: Option<JobFailure>,
}

impl ConversionJob {
    pub fn new(
        id: String,
        input: JobInput,
        owner_id: impl Into<String>,
        created_at: OffsetDateTime,
    ) -> Self {
        let owner_id = owner_id.into();
        let owner_id = if owner_id.trim().is_empty() {
            ANONYMOUS_OWNER.to_string()
        } else {
            owner_id
        };

        Self {
            id,
            input: Arc::new(input),
            owner_id,
            status: JobStatus::Pending,
            created_at,
            completed_at: None,
            output: None,
            failure: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn input(&self) -> &Arc<JobInput> {
        &self.input
    }

    pub fn kind(&self) -> &str {
        &self.input.kind
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<OffsetDateTime> {
        self.completed_at
    }

    pub fn output(&self) -> Option<&JobOutput> {
        self.output.as_ref()
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        self.failure.as_ref()
    }

    /// `pending → processing`, performed by the worker that claims the job.
    pub(crate) fn mark_processing(&mut self) -> Result<(), DomainError> {
        if self.status != JobStatus::Pending {
            return Err(DomainError::illegal_transition(
                self.status,
                JobStatus::Processing,
            ));
        }
        self.status = JobStatus::Processing;
        Ok(())
    }

    /// `processing → completed`.
    pub(crate) fn mark_completed(
        &mut self,
        output: JobOutput,
        at: OffsetDateTime,
    ) -> Result<(), DomainError> {
        if self.status != JobStatus::Processing {
            return Err(DomainError::illegal_transition(
                self.status,
                JobStatus::Completed,
            ));
        }
        self.status = JobStatus::Completed;
        self.output = Some(output);
        self.completed_at = Some(at);
        Ok(())
    }

    /// `processing → failed`, or `pending → failed` for admission failures only.
    pub(crate) fn mark_failed(
        &mut self,
        failure: JobFailure,
        at: OffsetDateTime,
    ) -> Result<(), DomainError> {
        let allowed = match self.status {
            JobStatus::Processing => !failure.is_admission(),
            JobStatus::Pending => failure.is_admission(),
            JobStatus::Completed | JobStatus::Failed => false,
        };
        if !allowed {
            return Err(DomainError::illegal_transition(
                self.status,
                JobStatus::Failed,
            ));
        }
        self.status = JobStatus::Failed;
        self.failure = Some(failure);
        self.completed_at = Some(at);
        Ok(())
    }

    /// Terminal and finished strictly before `cutoff`.
    pub fn expired_before(&self, cutoff: OffsetDateTime) -> bool {
        self.status.is_terminal() && self.completed_at.is_some_and(|at| at < cutoff)
    }

    pub fn view(&self) -> JobView {
        JobView {
            id: self.id.clone(),
            kind: self.input.kind.clone(),
            title: self.input.title.clone(),
            owner_id: self.owner_id.clone(),
            status: self.status,
            created_at: self.created_at,
            completed_at: self.completed_at,
            result_type: self.output.as_ref().map(|out| out.content_type.clone()),
            result_bytes: self.output.as_ref().map(|out| out.data.len()),
            error_message: self.failure.as_ref().map(ToString::to_string),
        }
    }
}

/// Lightweight status snapshot. Never carries input content or result bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobView {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub owner_id: String,
    pub status: JobStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::macros::datetime;

    use super::*;

    fn job() -> ConversionJob {
        ConversionJob::new(
            "job-1".to_string(),
            JobInput {
                kind: "pdf".to_string(),
                content: "# Hello".to_string(),
                title: "Greeting".to_string(),
            },
            "",
            datetime!(2026-01-01 00:00 UTC),
        )
    }

    fn output() -> JobOutput {
        JobOutput {
            data: Bytes::from_static(b"%PDF-1.7"),
            content_type: "application/pdf".to_string(),
        }
    }

    #[test]
    fn empty_owner_becomes_anonymous() {
        assert_eq!(job().owner_id(), ANONYMOUS_OWNER);
    }

    #[test]
    fn completion_sets_payload_and_timestamp() {
        let mut job = job();
        let done_at = datetime!(2026-01-01 00:01 UTC);
        job.mark_processing().expect("claim");
        job.mark_completed(output(), done_at).expect("complete");

        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.completed_at(), Some(done_at));
        assert!(job.failure().is_none());

        let view = job.view();
        assert_eq!(view.result_type.as_deref(), Some("application/pdf"));
        assert_eq!(view.result_bytes, Some(8));
        assert!(view.error_message.is_none());
    }

    #[test]
    fn terminal_jobs_never_move_again() {
        let mut job = job();
        job.mark_processing().expect("claim");
        job.mark_completed(output(), datetime!(2026-01-01 00:01 UTC))
            .expect("complete");

        assert!(job.mark_processing().is_err());
        assert!(
            job.mark_failed(
                JobFailure::Render {
                    message: "late".to_string()
                },
                datetime!(2026-01-01 00:02 UTC)
            )
            .is_err()
        );
        assert_eq!(job.status(), JobStatus::Completed);
    }

    #[test]
    fn pending_jobs_fail_only_through_admission() {
        let mut job = job();
        let render_failure = JobFailure::Render {
            message: "boom".to_string(),
        };
        assert!(
            job.mark_failed(render_failure, datetime!(2026-01-01 00:01 UTC))
                .is_err()
        );

        job.mark_failed(
            JobFailure::QueueSaturated {
                waited: Duration::from_secs(5),
            },
            datetime!(2026-01-01 00:00:05 UTC),
        )
        .expect("admission failure");
        assert_eq!(job.status(), JobStatus::Failed);
        assert!(job.output().is_none());
        assert!(
            job.view()
                .error_message
                .is_some_and(|message| message.contains("saturated"))
        );
    }

    #[test]
    fn completion_requires_a_claim() {
        let mut job = job();
        assert!(
            job.mark_completed(output(), datetime!(2026-01-01 00:01 UTC))
                .is_err()
        );
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(job.completed_at().is_none());
    }

    #[test]
    fn expiry_is_strict_and_terminal_only() {
        let mut job = job();
        let cutoff = datetime!(2026-01-02 00:00 UTC);
        assert!(!job.expired_before(cutoff));

        job.mark_processing().expect("claim");
        job.mark_completed(output(), cutoff).expect("complete");
        assert!(!job.expired_before(cutoff));
        assert!(job.expired_before(cutoff + time::Duration::seconds(1)));
    }
}
