use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Latest recorded progress for one job.
#[derive(Debug, Clone)]
pub struct ProgressEntry {
    pub worker_id: String,
    pub payload: String,
    pub updated_at: DateTime<Utc>,
}

/// Last-write-wins progress map. No history is retained: each record
/// for a job id overwrites the previous one.
#[derive(Debug, Default)]
pub struct ProgressStore {
    entries: HashMap<Uuid, ProgressEntry>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, job_id: Uuid, worker_id: String, payload: String) {
        self.entries.insert(
            job_id,
            ProgressEntry {
                worker_id,
                payload,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn query(&self, job_id: &Uuid) -> Option<&ProgressEntry> {
        self.entries.get(job_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
