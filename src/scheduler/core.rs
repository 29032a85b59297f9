use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::{LrtsError, Result};
use crate::proto::worker_service_client::WorkerServiceClient;
use crate::proto::StartJobRequest;
use crate::scheduler::job::{Job, JobState};
use crate::scheduler::queue::JobQueue;
use crate::scheduler::registry::WorkerRegistry;
use crate::transport;

/// Messages into the scheduler core event loop.
#[derive(Debug)]
pub enum SchedulerMessage {
    Submit {
        command: String,
        resp: oneshot::Sender<std::result::Result<(Uuid, DateTime<Utc>), String>>,
    },
    Register {
        worker_id: String,
        capacity: u32,
        address: String,
        resp: oneshot::Sender<bool>,
    },
    Deregister {
        worker_id: String,
        resp: oneshot::Sender<u32>,
    },
    Heartbeat {
        worker_id: String,
        resp: oneshot::Sender<bool>,
    },
    JobResult {
        job_id: Uuid,
        worker_id: String,
        state: JobState,
        exit_code: Option<i32>,
        output: Option<String>,
        error: Option<String>,
        resp: oneshot::Sender<bool>,
    },
    /// Outcome of a dispatch attempt, fed back by the dispatch task.
    DispatchOutcome {
        job_id: Uuid,
        worker_id: String,
        accepted: bool,
    },
    GetJob {
        job_id: Uuid,
        resp: oneshot::Sender<Option<Job>>,
    },
    ListJobs {
        resp: oneshot::Sender<Vec<Job>>,
    },
    ListWorkers {
        resp: oneshot::Sender<Vec<WorkerSummary>>,
    },
}

/// Point-in-time view of a registration, for the client surface.
#[derive(Debug, Clone)]
pub struct WorkerSummary {
    pub worker_id: String,
    pub capacity: u32,
    pub active_jobs: u32,
    pub address: String,
}

/// Cloneable handle for talking to the scheduler core.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerMessage>,
}

impl SchedulerHandle {
    async fn send<T>(&self, msg: SchedulerMessage, rx: oneshot::Receiver<T>) -> Result<T> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| LrtsError::Internal("scheduler core is gone".to_string()))?;
        rx.await
            .map_err(|_| LrtsError::Internal("scheduler core dropped the reply".to_string()))
    }

    pub async fn submit(
        &self,
        command: String,
    ) -> Result<std::result::Result<(Uuid, DateTime<Utc>), String>> {
        let (resp, rx) = oneshot::channel();
        self.send(SchedulerMessage::Submit { command, resp }, rx).await
    }

    pub async fn register(&self, worker_id: String, capacity: u32, address: String) -> Result<bool> {
        let (resp, rx) = oneshot::channel();
        self.send(
            SchedulerMessage::Register {
                worker_id,
                capacity,
                address,
                resp,
            },
            rx,
        )
        .await
    }

    pub async fn deregister(&self, worker_id: String) -> Result<u32> {
        let (resp, rx) = oneshot::channel();
        self.send(SchedulerMessage::Deregister { worker_id, resp }, rx)
            .await
    }

    pub async fn heartbeat(&self, worker_id: String) -> Result<bool> {
        let (resp, rx) = oneshot::channel();
        self.send(SchedulerMessage::Heartbeat { worker_id, resp }, rx)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn report_result(
        &self,
        job_id: Uuid,
        worker_id: String,
        state: JobState,
        exit_code: Option<i32>,
        output: Option<String>,
        error: Option<String>,
    ) -> Result<bool> {
        let (resp, rx) = oneshot::channel();
        self.send(
            SchedulerMessage::JobResult {
                job_id,
                worker_id,
                state,
                exit_code,
                output,
                error,
                resp,
            },
            rx,
        )
        .await
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>> {
        let (resp, rx) = oneshot::channel();
        self.send(SchedulerMessage::GetJob { job_id, resp }, rx).await
    }

    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        let (resp, rx) = oneshot::channel();
        self.send(SchedulerMessage::ListJobs { resp }, rx).await
    }

    pub async fn list_workers(&self) -> Result<Vec<WorkerSummary>> {
        let (resp, rx) = oneshot::channel();
        self.send(SchedulerMessage::ListWorkers { resp }, rx).await
    }
}

/// Owns the job table and worker registry; the only task that mutates
/// them. Everything else talks to it through [`SchedulerHandle`].
pub struct SchedulerCore {
    config: SchedulerConfig,
    queue: JobQueue,
    registry: WorkerRegistry,
    /// Cached channels to worker endpoints, keyed by worker id.
    worker_clients: HashMap<String, WorkerServiceClient<Channel>>,
    self_tx: mpsc::Sender<SchedulerMessage>,
}

impl SchedulerCore {
    pub fn new(config: SchedulerConfig) -> (Self, SchedulerHandle, mpsc::Receiver<SchedulerMessage>) {
        let (tx, rx) = mpsc::channel(256);
        let core = Self {
            config,
            queue: JobQueue::new(),
            registry: WorkerRegistry::new(),
            worker_clients: HashMap::new(),
            self_tx: tx.clone(),
        };
        (core, SchedulerHandle { tx }, rx)
    }

    /// Run the scheduler event loop until the token is cancelled.
    ///
    /// Multiplexes inbound messages with two timers: the assignment
    /// interval (match submitted jobs to spare capacity) and a sweep
    /// interval (expire dead workers, retire aged terminal jobs).
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<SchedulerMessage>,
        shutdown: CancellationToken,
    ) {
        let mut assign_interval = tokio::time::interval(self.config.assign_interval);
        let mut sweep_interval = tokio::time::interval(self.config.assign_interval.max(
            std::time::Duration::from_millis(250),
        ));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Scheduler core shutting down");
                    break;
                }

                Some(msg) = rx.recv() => {
                    self.handle_message(msg);
                }

                _ = assign_interval.tick() => {
                    self.assignment_pass();
                }

                _ = sweep_interval.tick() => {
                    self.liveness_sweep();
                    let retired = self.queue.retire_older_than(self.config.retention, Utc::now());
                    if retired > 0 {
                        tracing::debug!(retired, "Retired terminal jobs");
                    }
                }
            }
        }
    }

    fn handle_message(&mut self, msg: SchedulerMessage) {
        match msg {
            SchedulerMessage::Submit { command, resp } => {
                let job = Job::new(command);
                let reply = if self.queue.is_full() {
                    Err("job queue is at capacity".to_string())
                } else {
                    let id = job.id;
                    let created_at = job.created_at;
                    self.queue.submit(job);
                    tracing::info!(job_id = %id, "Job submitted");
                    Ok((id, created_at))
                };
                let _ = resp.send(reply);
                self.assignment_pass();
            }
            SchedulerMessage::Register {
                worker_id,
                capacity,
                address,
                resp,
            } => {
                // A changed address invalidates any cached channel.
                if self
                    .registry
                    .get(&worker_id)
                    .is_some_and(|w| w.address != address)
                {
                    self.worker_clients.remove(&worker_id);
                }
                self.registry.register(&worker_id, capacity, &address);
                let _ = resp.send(true);
                self.assignment_pass();
            }
            SchedulerMessage::Deregister { worker_id, resp } => {
                let jobs = self.registry.remove(&worker_id);
                self.worker_clients.remove(&worker_id);
                let mut rescheduled = 0u32;
                for job_id in jobs {
                    if self.queue.revert_to_submitted(&job_id, &worker_id) {
                        rescheduled += 1;
                    }
                }
                tracing::info!(worker_id = %worker_id, rescheduled, "Worker deregistered");
                let _ = resp.send(rescheduled);
                self.assignment_pass();
            }
            SchedulerMessage::Heartbeat { worker_id, resp } => {
                let known = self.registry.heartbeat(&worker_id);
                if !known {
                    tracing::warn!(
                        worker_id = %worker_id,
                        "Heartbeat from unknown worker, ordering re-registration"
                    );
                }
                let _ = resp.send(known);
            }
            SchedulerMessage::JobResult {
                job_id,
                worker_id,
                state,
                exit_code,
                output,
                error,
                resp,
            } => {
                let recorded = self
                    .queue
                    .complete(&job_id, &worker_id, state, exit_code, output, error);
                self.registry.release(&worker_id, &job_id);
                if recorded {
                    tracing::info!(job_id = %job_id, worker_id = %worker_id, state = %state, "Job finished");
                } else {
                    // A duplicate report, or a job that was already
                    // rescheduled elsewhere after this worker timed out.
                    tracing::debug!(job_id = %job_id, worker_id = %worker_id, "Ignoring stale job result");
                }
                let _ = resp.send(recorded);
                self.assignment_pass();
            }
            SchedulerMessage::DispatchOutcome {
                job_id,
                worker_id,
                accepted,
            } => {
                if accepted {
                    self.queue.mark_running(&job_id, &worker_id);
                } else {
                    tracing::warn!(
                        job_id = %job_id,
                        worker_id = %worker_id,
                        "Dispatch failed, returning job to the queue"
                    );
                    // Refused when the liveness sweep already took the
                    // job away from this worker and it runs elsewhere.
                    self.queue.revert_to_submitted(&job_id, &worker_id);
                    self.registry.release(&worker_id, &job_id);
                }
            }
            SchedulerMessage::GetJob { job_id, resp } => {
                let _ = resp.send(self.queue.get(&job_id).cloned());
            }
            SchedulerMessage::ListJobs { resp } => {
                let _ = resp.send(self.queue.all_jobs().into_iter().cloned().collect());
            }
            SchedulerMessage::ListWorkers { resp } => {
                let summaries = self
                    .registry
                    .all_workers()
                    .into_iter()
                    .map(|w| WorkerSummary {
                        worker_id: w.id.clone(),
                        capacity: w.capacity,
                        active_jobs: w.running_jobs.len() as u32,
                        address: w.address.clone(),
                    })
                    .collect();
                let _ = resp.send(summaries);
            }
        }
    }

    /// Match submitted jobs to alive workers with spare capacity, FIFO
    /// by submission time, least-loaded worker first.
    fn assignment_pass(&mut self) {
        loop {
            let Some((worker_id, address)) = self.registry.pick_worker(self.config.timeout) else {
                break;
            };
            let Some(job) = self.queue.submitted_fifo().first().map(|j| (j.id, j.command.clone()))
            else {
                break;
            };
            let (job_id, command) = job;

            if !self.queue.assign(&job_id, &worker_id) {
                break;
            }
            if !self.registry.charge(&worker_id, job_id) {
                self.queue.revert_to_submitted(&job_id, &worker_id);
                break;
            }

            tracing::info!(job_id = %job_id, worker_id = %worker_id, "Job assigned");
            self.dispatch(job_id, command, worker_id, address);
        }
    }

    /// Send the assignment to the worker off the core loop; the outcome
    /// comes back as a `DispatchOutcome` message.
    fn dispatch(&mut self, job_id: Uuid, command: String, worker_id: String, address: String) {
        let client = match self.worker_client(&worker_id, &address) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(worker_id = %worker_id, error = %e, "Cannot reach worker endpoint");
                self.queue.revert_to_submitted(&job_id, &worker_id);
                self.registry.release(&worker_id, &job_id);
                return;
            }
        };

        let timeout = self.config.timeout;
        let self_tx = self.self_tx.clone();
        tokio::spawn(async move {
            let mut client = client;
            let outcome = transport::request(
                &worker_id,
                timeout,
                client.start_job(StartJobRequest {
                    job_id: job_id.to_string(),
                    command,
                }),
            )
            .await;

            let accepted = match outcome {
                Ok(response) => response.accepted,
                Err(e) => {
                    tracing::warn!(job_id = %job_id, worker_id = %worker_id, error = %e, "StartJob failed");
                    false
                }
            };

            let _ = self_tx
                .send(SchedulerMessage::DispatchOutcome {
                    job_id,
                    worker_id,
                    accepted,
                })
                .await;
        });
    }

    fn worker_client(
        &mut self,
        worker_id: &str,
        address: &str,
    ) -> Result<WorkerServiceClient<Channel>> {
        if let Some(client) = self.worker_clients.get(worker_id) {
            return Ok(client.clone());
        }
        let addr = address
            .parse()
            .map_err(|_| LrtsError::Internal(format!("invalid worker address {}", address)))?;
        let channel = transport::connect(addr, self.config.timeout)?;
        let client = WorkerServiceClient::new(channel);
        self.worker_clients
            .insert(worker_id.to_string(), client.clone());
        Ok(client)
    }

    /// Drop workers that stopped heartbeating and return their in-flight
    /// jobs to the queue (at-least-once execution).
    fn liveness_sweep(&mut self) {
        let lost = self.registry.expire_dead(self.config.timeout);
        if lost.is_empty() {
            return;
        }
        for (worker_id, jobs) in lost {
            self.worker_clients.remove(&worker_id);
            for job_id in jobs {
                self.queue.revert_to_submitted(&job_id, &worker_id);
            }
        }
        self.assignment_pass();
    }
}
