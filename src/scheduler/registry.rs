use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Registration state the scheduler keeps per worker.
#[derive(Debug, Clone)]
pub struct WorkerEntry {
    pub id: String,
    pub capacity: u32,
    pub address: String,
    pub last_heartbeat: Instant,
    pub running_jobs: HashSet<Uuid>,
}

impl WorkerEntry {
    fn new(id: String, capacity: u32, address: String) -> Self {
        Self {
            id,
            capacity,
            address,
            last_heartbeat: Instant::now(),
            running_jobs: HashSet::new(),
        }
    }

    pub fn is_alive(&self, timeout: Duration) -> bool {
        self.last_heartbeat.elapsed() < timeout
    }

    pub fn spare_capacity(&self) -> u32 {
        self.capacity.saturating_sub(self.running_jobs.len() as u32)
    }
}

/// Worker registrations and their capacity accounting.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: HashMap<String, WorkerEntry>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or refresh a registration. Re-registering under the same id
    /// is idempotent: capacity and address are updated, in-flight job
    /// accounting survives. Returns true when the worker was new.
    pub fn register(&mut self, id: &str, capacity: u32, address: &str) -> bool {
        match self.workers.get_mut(id) {
            Some(entry) => {
                entry.capacity = capacity;
                entry.address = address.to_string();
                entry.last_heartbeat = Instant::now();
                false
            }
            None => {
                self.workers.insert(
                    id.to_string(),
                    WorkerEntry::new(id.to_string(), capacity, address.to_string()),
                );
                tracing::info!(worker_id = id, capacity, address, "Worker registered");
                true
            }
        }
    }

    /// Refresh a worker's heartbeat. Returns false for unknown workers,
    /// which tells the worker to re-register.
    pub fn heartbeat(&mut self, id: &str) -> bool {
        match self.workers.get_mut(id) {
            Some(entry) => {
                entry.last_heartbeat = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&WorkerEntry> {
        self.workers.get(id)
    }

    /// Pick the alive worker with the most spare capacity, favoring the
    /// least loaded. Returns its id and address.
    pub fn pick_worker(&self, timeout: Duration) -> Option<(String, String)> {
        self.workers
            .values()
            .filter(|w| w.is_alive(timeout) && w.spare_capacity() > 0)
            .min_by_key(|w| w.running_jobs.len())
            .map(|w| (w.id.clone(), w.address.clone()))
    }

    /// Charge a job against a worker's capacity. Refuses when the worker
    /// is unknown or already at capacity, so assignment can never exceed
    /// the advertised bound.
    pub fn charge(&mut self, id: &str, job_id: Uuid) -> bool {
        match self.workers.get_mut(id) {
            Some(entry) if entry.spare_capacity() > 0 => {
                entry.running_jobs.insert(job_id);
                true
            }
            _ => false,
        }
    }

    /// Release one capacity unit after the job left the worker.
    pub fn release(&mut self, id: &str, job_id: &Uuid) {
        if let Some(entry) = self.workers.get_mut(id) {
            entry.running_jobs.remove(job_id);
        }
    }

    /// Remove a worker (graceful disconnect), returning the jobs that
    /// were in flight on it.
    pub fn remove(&mut self, id: &str) -> Vec<Uuid> {
        self.workers
            .remove(id)
            .map(|entry| entry.running_jobs.into_iter().collect())
            .unwrap_or_default()
    }

    /// Drop workers whose last heartbeat is older than `timeout`.
    /// Returns each lost worker with the jobs it still held, so the
    /// caller can return them to the queue.
    pub fn expire_dead(&mut self, timeout: Duration) -> Vec<(String, Vec<Uuid>)> {
        let dead: Vec<String> = self
            .workers
            .values()
            .filter(|w| !w.is_alive(timeout))
            .map(|w| w.id.clone())
            .collect();

        dead.into_iter()
            .map(|id| {
                let jobs = self.remove(&id);
                tracing::warn!(
                    worker_id = %id,
                    rescheduled = jobs.len(),
                    "Worker heartbeat timed out, rescheduling its jobs"
                );
                (id, jobs)
            })
            .collect()
    }

    pub fn all_workers(&self) -> Vec<&WorkerEntry> {
        self.workers.values().collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
