use std::{collections::HashMap, sync::RwLock};

use serde::Serialize;
use time::OffsetDateTime;
use tracing::warn;

use crate::domain::{
    entities::{ConversionJob, JobInput, JobOutput, JobView},
    error::{DomainError, JobFailure},
    types::JobStatus,
};

use super::{
    ids::{IdGenerator, UuidV7Ids},
    lock::{rw_read, rw_write},
};

const TARGET: &str = "application::jobs::table";
const MAX_ID_ATTEMPTS: usize = 8;

/// Per-status job counts taken under a single read lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// System of record for resident jobs. Every mutation happens under the write lock.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: RwLock<HashMap<String, ConversionJob>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pending job under an id that no resident job uses.
    pub(crate) fn insert_new(
        &self,
        ids: &dyn IdGenerator,
        input: JobInput,
        owner_id: &str,
        now: OffsetDateTime,
    ) -> String {
        let mut jobs = rw_write(&self.jobs, TARGET, "insert_new");

        let mut attempts = 0;
        let id = loop {
            attempts += 1;
            let candidate = if attempts <= MAX_ID_ATTEMPTS {
                ids.next_id()
            } else {
                UuidV7Ids.next_id()
            };
            if !jobs.contains_key(&candidate) {
                break candidate;
            }
            warn!(
                target = TARGET,
                op = "insert_new",
                result = "id_collision",
                attempts,
                job_id = %candidate,
                "Generated job id already resident; retrying"
            );
        };

        jobs.insert(
            id.clone(),
            ConversionJob::new(id.clone(), input, owner_id, now),
        );
        id
    }

    pub fn view(&self, id: &str) -> Option<JobView> {
        rw_read(&self.jobs, TARGET, "view")
            .get(id)
            .map(ConversionJob::view)
    }

    pub(crate) fn read<R>(&self, id: &str, f: impl FnOnce(&ConversionJob) -> R) -> Option<R> {
        rw_read(&self.jobs, TARGET, "read").get(id).map(f)
    }

    /// `pending → processing`. Returns a snapshot carrying the input to render.
    pub(crate) fn claim(&self, id: &str) -> Result<ConversionJob, DomainError> {
        self.transition(id, "claim", |job| job.mark_processing())
    }

    pub(crate) fn complete(
        &self,
        id: &str,
        output: JobOutput,
        at: OffsetDateTime,
    ) -> Result<ConversionJob, DomainError> {
        self.transition(id, "complete", |job| job.mark_completed(output, at))
    }

    pub(crate) fn fail(
        &self,
        id: &str,
        failure: JobFailure,
        at: OffsetDateTime,
    ) -> Result<ConversionJob, DomainError> {
        self.transition(id, "fail", |job| job.mark_failed(failure, at))
    }

    fn transition(
        &self,
        id: &str,
        op: &'static str,
        apply: impl FnOnce(&mut ConversionJob) -> Result<(), DomainError>,
    ) -> Result<ConversionJob, DomainError> {
        let mut jobs = rw_write(&self.jobs, TARGET, op);
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| DomainError::invariant(format!("job `{id}` is not resident")))?;
        apply(job)?;
        Ok(job.clone())
    }

    pub fn counts(&self) -> StatusCounts {
        let jobs = rw_read(&self.jobs, TARGET, "counts");
        let mut counts = StatusCounts {
            total: jobs.len(),
            ..StatusCounts::default()
        };
        for job in jobs.values() {
            match job.status() {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Drops terminal jobs that finished strictly before `cutoff`.
    pub(crate) fn evict_finished_before(&self, cutoff: OffsetDateTime) -> usize {
        let mut jobs = rw_write(&self.jobs, TARGET, "evict");
        let before = jobs.len();
        jobs.retain(|_, job| !job.expired_before(cutoff));
        before - jobs.len()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.jobs, TARGET, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
