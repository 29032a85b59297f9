use std::sync::Arc;

use tokio::sync::RwLock;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::progress::store::ProgressStore;
use crate::proto::progress_service_server::ProgressService;
use crate::proto::{
    QueryProgressRequest, QueryProgressResponse, RecordProgressRequest, RecordProgressResponse,
};

/// gRPC surface of the progress server.
pub struct ProgressApi {
    store: Arc<RwLock<ProgressStore>>,
}

impl ProgressApi {
    pub fn new(store: Arc<RwLock<ProgressStore>>) -> Self {
        Self { store }
    }
}

#[tonic::async_trait]
impl ProgressService for ProgressApi {
    async fn record_progress(
        &self,
        request: Request<RecordProgressRequest>,
    ) -> Result<Response<RecordProgressResponse>, Status> {
        let req = request.into_inner();
        let job_id = Uuid::parse_str(&req.job_id)
            .map_err(|_| Status::invalid_argument("Invalid job ID"))?;

        self.store
            .write()
            .await
            .record(job_id, req.worker_id, req.payload);
        Ok(Response::new(RecordProgressResponse {}))
    }

    async fn query_progress(
        &self,
        request: Request<QueryProgressRequest>,
    ) -> Result<Response<QueryProgressResponse>, Status> {
        let req = request.into_inner();
        let job_id = Uuid::parse_str(&req.job_id)
            .map_err(|_| Status::invalid_argument("Invalid job ID"))?;

        let store = self.store.read().await;
        let entry = store
            .query(&job_id)
            .ok_or_else(|| Status::not_found("No progress recorded for job"))?;

        Ok(Response::new(QueryProgressResponse {
            job_id: req.job_id,
            worker_id: entry.worker_id.clone(),
            payload: entry.payload.clone(),
            updated_at_ms: entry.updated_at.timestamp_millis(),
        }))
    }
}
