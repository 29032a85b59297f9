use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;

use crate::proto::scheduler_service_client::SchedulerServiceClient;
use crate::proto::{HeartbeatRequest, RegisterWorkerRequest};
use crate::transport;

/// What this worker registers as: identity, capacity, and the address
/// its dispatch endpoint is reachable at.
#[derive(Debug, Clone)]
pub struct WorkerIdentity {
    pub worker_id: String,
    pub capacity: u32,
    pub address: String,
}

/// Periodic heartbeat to the scheduler.
///
/// Keeps the registration fresh; when the scheduler answers that it no
/// longer knows this worker (it restarted, or it expired us), the loop
/// re-registers before the next beat.
pub struct HeartbeatLoop {
    client: SchedulerServiceClient<Channel>,
    identity: WorkerIdentity,
    interval: Duration,
    timeout: Duration,
}

impl HeartbeatLoop {
    pub fn new(
        channel: Channel,
        identity: WorkerIdentity,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            client: SchedulerServiceClient::new(channel),
            identity,
            interval,
            timeout,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        // The first tick fires immediately; registration already
        // happened, so skip it.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.beat().await;
                }
            }
        }
    }

    async fn beat(&mut self) {
        let result = transport::request(
            "scheduler",
            self.timeout,
            self.client.heartbeat(HeartbeatRequest {
                worker_id: self.identity.worker_id.clone(),
            }),
        )
        .await;

        match result {
            Ok(response) if !response.registered => {
                tracing::warn!("Scheduler does not know this worker, re-registering");
                let reg = transport::request(
                    "scheduler",
                    self.timeout,
                    self.client.register_worker(RegisterWorkerRequest {
                        worker_id: self.identity.worker_id.clone(),
                        capacity: self.identity.capacity,
                        address: self.identity.address.clone(),
                    }),
                )
                .await;
                if let Err(e) = reg {
                    tracing::warn!(error = %e, "Re-registration failed");
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Heartbeat failed");
            }
        }
    }
}
