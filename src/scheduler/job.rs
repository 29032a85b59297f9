use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a job inside the scheduler.
///
/// `Submitted → Assigned → Running → (Completed | Failed)`, after which
/// a retirement sweep eventually drops the job from the table. Worker
/// loss moves `Assigned`/`Running` jobs back to `Submitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Submitted,
    Assigned,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// True while the job occupies a capacity slot on some worker.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobState::Assigned | JobState::Running)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Submitted => write!(f, "submitted"),
            JobState::Assigned => write!(f, "assigned"),
            JobState::Running => write!(f, "running"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub command: String,
    pub state: JobState,
    pub assigned_worker: Option<String>,
    /// How many times the job has been dispatched; >1 means it was
    /// rescheduled after a worker was lost.
    pub attempts: u32,
    pub exit_code: Option<i32>,
    pub output: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(command: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            command,
            state: JobState::Submitted,
            assigned_worker: None,
            attempts: 0,
            exit_code: None,
            output: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}
