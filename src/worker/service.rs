use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::proto::scheduler_service_client::SchedulerServiceClient;
use crate::proto::worker_service_server::WorkerService;
use crate::proto::{
    JobState as ProtoJobState, ReportJobResultRequest, StartJobRequest, StartJobResponse,
};
use crate::scheduler::JobState;
use crate::transport;
use crate::worker::executor::{ExecutionResult, JobExecutor};
use crate::worker::progress::ProgressReporter;

const RESULT_REPORT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// gRPC endpoint the scheduler dispatches jobs to.
///
/// The semaphore is sized to the worker's capacity and guards the
/// invariant locally: even a confused scheduler cannot push this worker
/// past its advertised bound, it just gets a refusal.
pub struct WorkerApi {
    worker_id: String,
    slots: Arc<Semaphore>,
    executor: JobExecutor,
    scheduler: SchedulerServiceClient<Channel>,
    progress: ProgressReporter,
    timeout: Duration,
    shutdown: CancellationToken,
}

impl WorkerApi {
    pub fn new(
        worker_id: String,
        capacity: u32,
        scheduler_channel: Channel,
        progress: ProgressReporter,
        timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            worker_id,
            slots: Arc::new(Semaphore::new(capacity as usize)),
            executor: JobExecutor::new(),
            scheduler: SchedulerServiceClient::new(scheduler_channel),
            progress,
            timeout,
            shutdown,
        }
    }
}

#[tonic::async_trait]
impl WorkerService for WorkerApi {
    async fn start_job(
        &self,
        request: Request<StartJobRequest>,
    ) -> Result<Response<StartJobResponse>, Status> {
        if self.shutdown.is_cancelled() {
            return Err(Status::unavailable("Worker is shutting down"));
        }

        let req = request.into_inner();
        let job_id = Uuid::parse_str(&req.job_id)
            .map_err(|_| Status::invalid_argument("Invalid job ID"))?;

        let permit = match self.slots.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(job_id = %job_id, "Refusing job, all capacity slots busy");
                return Err(Status::resource_exhausted("Worker at capacity"));
            }
        };

        let executor = self.executor.clone();
        let scheduler = self.scheduler.clone();
        let progress = self.progress.clone();
        let worker_id = self.worker_id.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            // Slot is held for the full execution, releasing on drop.
            let _permit = permit;

            let (progress_tx, progress_rx) = mpsc::channel(64);
            progress.spawn_forwarder(job_id, progress_rx);

            let result = executor
                .execute(job_id, &req.command, Some(progress_tx.clone()))
                .await;

            // Terminal status goes through the same per-job channel as
            // the stdout lines, so it is the last write the progress
            // server sees for this job. Best-effort like the rest.
            let _ = progress_tx.send(result.state.to_string()).await;
            drop(progress_tx);

            // Terminal status to the scheduler, retried; this channel is
            // authoritative for job state.
            report_result_with_retry(scheduler, &worker_id, &result, timeout).await;
        });

        Ok(Response::new(StartJobResponse { accepted: true }))
    }
}

/// Push the terminal result to the scheduler, retrying until the
/// communication timeout has been spent. An undeliverable report is
/// dropped and logged; the scheduler's liveness sweep will reschedule
/// the job if it never hears from us again.
async fn report_result_with_retry(
    mut scheduler: SchedulerServiceClient<Channel>,
    worker_id: &str,
    result: &ExecutionResult,
    timeout: Duration,
) {
    let state = match result.state {
        JobState::Completed => ProtoJobState::Completed,
        _ => ProtoJobState::Failed,
    };
    let request = ReportJobResultRequest {
        job_id: result.job_id.to_string(),
        worker_id: worker_id.to_string(),
        state: state as i32,
        exit_code: result.exit_code,
        output: result.output.clone().unwrap_or_default(),
        error: result.error.clone().unwrap_or_default(),
    };

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match transport::request(
            "scheduler",
            timeout,
            scheduler.report_job_result(request.clone()),
        )
        .await
        {
            Ok(_) => return,
            Err(e) => {
                if tokio::time::Instant::now() + RESULT_REPORT_RETRY_DELAY >= deadline {
                    tracing::error!(
                        job_id = %result.job_id,
                        error = %e,
                        "Dropping job result report, scheduler unreachable"
                    );
                    return;
                }
                tracing::warn!(job_id = %result.job_id, error = %e, "Result report failed, retrying");
                tokio::time::sleep(RESULT_REPORT_RETRY_DELAY).await;
            }
        }
    }
}
