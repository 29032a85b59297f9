use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use uuid::Uuid;

use crate::scheduler::job::{Job, JobState};

const DEFAULT_MAX_JOBS: usize = 10_000;

/// The scheduler's job table.
///
/// Owned exclusively by the scheduler core; every transition below is a
/// plain method call on that single owner.
#[derive(Debug)]
pub struct JobQueue {
    jobs: HashMap<Uuid, Job>,
    max_jobs: usize,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_JOBS)
    }

    pub fn with_capacity(max_jobs: usize) -> Self {
        Self {
            jobs: HashMap::new(),
            max_jobs,
        }
    }

    /// Enqueue a job in `Submitted` state. Returns false when the table
    /// is at capacity.
    pub fn submit(&mut self, job: Job) -> bool {
        if self.jobs.len() >= self.max_jobs {
            return false;
        }
        self.jobs.insert(job.id, job);
        true
    }

    pub fn get(&self, id: &Uuid) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// Submitted jobs in FIFO order by submission time.
    pub fn submitted_fifo(&self) -> Vec<&Job> {
        let mut jobs: Vec<&Job> = self
            .jobs
            .values()
            .filter(|j| j.state == JobState::Submitted)
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Mark a `Submitted` job as `Assigned` to a worker. Refuses any job
    /// that is not currently `Submitted`, so a job can never be
    /// dispatched to two workers at once.
    pub fn assign(&mut self, job_id: &Uuid, worker_id: &str) -> bool {
        match self.jobs.get_mut(job_id) {
            Some(job) if job.state == JobState::Submitted => {
                job.state = JobState::Assigned;
                job.assigned_worker = Some(worker_id.to_string());
                job.attempts += 1;
                true
            }
            _ => false,
        }
    }

    /// Mark an `Assigned` job as `Running` once the worker acknowledged
    /// the dispatch. Only the current assignee's acknowledgement counts.
    pub fn mark_running(&mut self, job_id: &Uuid, worker_id: &str) -> bool {
        match self.jobs.get_mut(job_id) {
            Some(job)
                if job.state == JobState::Assigned
                    && job.assigned_worker.as_deref() == Some(worker_id) =>
            {
                job.state = JobState::Running;
                true
            }
            _ => false,
        }
    }

    /// Return an in-flight job to the `Submitted` queue (dispatch failed
    /// or the owning worker was lost). Refused unless `worker_id` is the
    /// job's current assignee: a stale outcome from a worker that
    /// already lost the job must not unseat its replacement.
    pub fn revert_to_submitted(&mut self, job_id: &Uuid, worker_id: &str) -> bool {
        match self.jobs.get_mut(job_id) {
            Some(job)
                if job.state.is_in_flight()
                    && job.assigned_worker.as_deref() == Some(worker_id) =>
            {
                job.state = JobState::Submitted;
                job.assigned_worker = None;
                true
            }
            _ => false,
        }
    }

    /// Record a terminal result reported by the executing worker. Only
    /// the job's current assignee may complete it; results from workers
    /// the job was already taken away from are ignored.
    pub fn complete(
        &mut self,
        job_id: &Uuid,
        worker_id: &str,
        state: JobState,
        exit_code: Option<i32>,
        output: Option<String>,
        error: Option<String>,
    ) -> bool {
        debug_assert!(state.is_terminal());
        match self.jobs.get_mut(job_id) {
            Some(job)
                if !job.state.is_terminal()
                    && job.assigned_worker.as_deref() == Some(worker_id) =>
            {
                job.state = state;
                job.exit_code = exit_code;
                job.output = output;
                job.error = error;
                job.completed_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    /// All jobs sorted chronologically by submission time.
    pub fn all_jobs(&self) -> Vec<&Job> {
        let mut jobs: Vec<&Job> = self.jobs.values().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Retire terminal jobs whose completion is older than `retention`,
    /// removing them from the table. Returns the number retired.
    pub fn retire_older_than(&mut self, retention: std::time::Duration, now: DateTime<Utc>) -> usize {
        let retention = ChronoDuration::from_std(retention).unwrap_or(ChronoDuration::MAX);
        let before = self.jobs.len();
        self.jobs.retain(|_, job| {
            !(job.state.is_terminal()
                && job
                    .completed_at
                    .is_some_and(|done| now.signed_duration_since(done) > retention))
        });
        before - self.jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.max_jobs
    }
}
