use std::time::Duration;

use tokio::sync::mpsc;
use tonic::transport::Channel;
use uuid::Uuid;

use crate::proto::progress_service_client::ProgressServiceClient;
use crate::proto::RecordProgressRequest;
use crate::transport;

/// Best-effort client for the progress server.
///
/// Delivery is advisory: a send that fails or times out is logged and
/// dropped. Only the scheduler-bound terminal report is authoritative.
#[derive(Clone)]
pub struct ProgressReporter {
    client: ProgressServiceClient<Channel>,
    worker_id: String,
    timeout: Duration,
}

impl ProgressReporter {
    pub fn new(channel: Channel, worker_id: String, timeout: Duration) -> Self {
        Self {
            client: ProgressServiceClient::new(channel),
            worker_id,
            timeout,
        }
    }

    /// Record the latest progress payload for a job, best-effort.
    pub async fn report(&self, job_id: Uuid, payload: String) {
        let mut client = self.client.clone();
        let result = transport::request(
            "progress-server",
            self.timeout,
            client.record_progress(RecordProgressRequest {
                job_id: job_id.to_string(),
                worker_id: self.worker_id.clone(),
                payload,
            }),
        )
        .await;

        if let Err(e) = result {
            tracing::debug!(job_id = %job_id, error = %e, "Dropped progress report");
        }
    }

    /// Forward progress events for one job until the channel closes.
    ///
    /// Events for a single job are delivered in order: each report is
    /// flushed before the next one is taken off the channel.
    pub fn spawn_forwarder(&self, job_id: Uuid, mut rx: mpsc::Receiver<String>) {
        let reporter = self.clone();
        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                reporter.report(job_id, payload).await;
            }
        });
    }
}
