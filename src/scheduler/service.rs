use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::proto::scheduler_service_server::SchedulerService;
use crate::proto::{
    DeregisterRequest, DeregisterResponse, GetJobStatusRequest, GetJobStatusResponse,
    HeartbeatRequest, HeartbeatResponse, JobInfo, JobState as ProtoJobState, ListJobsRequest,
    ListJobsResponse, ListWorkersRequest, ListWorkersResponse, RegisterWorkerRequest,
    RegisterWorkerResponse, ReportJobResultRequest, ReportJobResultResponse, SubmitJobRequest,
    SubmitJobResponse, WorkerInfo,
};
use crate::scheduler::core::SchedulerHandle;
use crate::scheduler::job::JobState;

/// gRPC surface of the scheduler. Stateless: every call becomes a
/// message into the scheduler core.
pub struct SchedulerApi {
    handle: SchedulerHandle,
}

impl SchedulerApi {
    pub fn new(handle: SchedulerHandle) -> Self {
        Self { handle }
    }
}

fn internal(e: crate::error::LrtsError) -> Status {
    Status::internal(e.to_string())
}

fn parse_job_id(raw: &str) -> Result<Uuid, Status> {
    Uuid::parse_str(raw).map_err(|_| Status::invalid_argument("Invalid job ID"))
}

#[tonic::async_trait]
impl SchedulerService for SchedulerApi {
    async fn register_worker(
        &self,
        request: Request<RegisterWorkerRequest>,
    ) -> Result<Response<RegisterWorkerResponse>, Status> {
        let req = request.into_inner();
        if req.worker_id.is_empty() {
            return Err(Status::invalid_argument("Worker ID cannot be empty"));
        }
        if req.capacity == 0 {
            return Err(Status::invalid_argument("Capacity must be at least 1"));
        }
        if req.address.parse::<std::net::SocketAddr>().is_err() {
            return Err(Status::invalid_argument("Invalid worker address"));
        }

        let accepted = self
            .handle
            .register(req.worker_id, req.capacity, req.address)
            .await
            .map_err(internal)?;
        Ok(Response::new(RegisterWorkerResponse { accepted }))
    }

    async fn deregister(
        &self,
        request: Request<DeregisterRequest>,
    ) -> Result<Response<DeregisterResponse>, Status> {
        let req = request.into_inner();
        let rescheduled_jobs = self
            .handle
            .deregister(req.worker_id)
            .await
            .map_err(internal)?;
        Ok(Response::new(DeregisterResponse { rescheduled_jobs }))
    }

    async fn heartbeat(
        &self,
        request: Request<HeartbeatRequest>,
    ) -> Result<Response<HeartbeatResponse>, Status> {
        let req = request.into_inner();
        let registered = self
            .handle
            .heartbeat(req.worker_id)
            .await
            .map_err(internal)?;
        Ok(Response::new(HeartbeatResponse { registered }))
    }

    async fn report_job_result(
        &self,
        request: Request<ReportJobResultRequest>,
    ) -> Result<Response<ReportJobResultResponse>, Status> {
        let req = request.into_inner();
        let job_id = parse_job_id(&req.job_id)?;
        let state = match ProtoJobState::try_from(req.state) {
            Ok(ProtoJobState::Completed) => JobState::Completed,
            Ok(ProtoJobState::Failed) => JobState::Failed,
            _ => return Err(Status::invalid_argument("Result state must be terminal")),
        };

        self.handle
            .report_result(
                job_id,
                req.worker_id,
                state,
                req.exit_code,
                if req.output.is_empty() {
                    None
                } else {
                    Some(req.output)
                },
                if req.error.is_empty() {
                    None
                } else {
                    Some(req.error)
                },
            )
            .await
            .map_err(internal)?;
        Ok(Response::new(ReportJobResultResponse {}))
    }

    async fn submit_job(
        &self,
        request: Request<SubmitJobRequest>,
    ) -> Result<Response<SubmitJobResponse>, Status> {
        let req = request.into_inner();

        // Malformed submissions are reported to the submitter, never enqueued.
        if req.command.trim().is_empty() {
            return Err(Status::invalid_argument("Command cannot be empty"));
        }

        match self.handle.submit(req.command).await.map_err(internal)? {
            Ok((job_id, created_at)) => Ok(Response::new(SubmitJobResponse {
                job_id: job_id.to_string(),
                created_at_ms: created_at.timestamp_millis(),
            })),
            Err(reason) => Err(Status::resource_exhausted(reason)),
        }
    }

    async fn get_job_status(
        &self,
        request: Request<GetJobStatusRequest>,
    ) -> Result<Response<GetJobStatusResponse>, Status> {
        let req = request.into_inner();
        let job_id = parse_job_id(&req.job_id)?;

        let job = self
            .handle
            .get_job(job_id)
            .await
            .map_err(internal)?
            .ok_or_else(|| Status::not_found("Job not found"))?;

        Ok(Response::new(GetJobStatusResponse {
            job_id: job.id.to_string(),
            state: state_to_proto(&job.state) as i32,
            command: job.command,
            assigned_worker: job.assigned_worker.unwrap_or_default(),
            exit_code: job.exit_code,
            output: job.output.unwrap_or_default(),
            error: job.error.unwrap_or_default(),
            created_at_ms: job.created_at.timestamp_millis(),
            completed_at_ms: job.completed_at.map(|dt| dt.timestamp_millis()),
        }))
    }

    async fn list_jobs(
        &self,
        _request: Request<ListJobsRequest>,
    ) -> Result<Response<ListJobsResponse>, Status> {
        let jobs = self
            .handle
            .list_jobs()
            .await
            .map_err(internal)?
            .into_iter()
            .map(|job| JobInfo {
                job_id: job.id.to_string(),
                state: state_to_proto(&job.state) as i32,
                command: job.command,
                assigned_worker: job.assigned_worker.unwrap_or_default(),
                created_at_ms: job.created_at.timestamp_millis(),
            })
            .collect();

        Ok(Response::new(ListJobsResponse { jobs }))
    }

    async fn list_workers(
        &self,
        _request: Request<ListWorkersRequest>,
    ) -> Result<Response<ListWorkersResponse>, Status> {
        let workers = self
            .handle
            .list_workers()
            .await
            .map_err(internal)?
            .into_iter()
            .map(|w| WorkerInfo {
                worker_id: w.worker_id,
                capacity: w.capacity,
                active_jobs: w.active_jobs,
                address: w.address,
            })
            .collect();

        Ok(Response::new(ListWorkersResponse { workers }))
    }
}

pub fn state_to_proto(state: &JobState) -> ProtoJobState {
    match state {
        JobState::Submitted => ProtoJobState::Submitted,
        JobState::Assigned => ProtoJobState::Assigned,
        JobState::Running => ProtoJobState::Running,
        JobState::Completed => ProtoJobState::Completed,
        JobState::Failed => ProtoJobState::Failed,
    }
}
