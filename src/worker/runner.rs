use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Server};

use crate::capacity::{CoreCountProbe, SystemCoreCount};
use crate::config::WorkerConfig;
use crate::error::{LrtsError, Result};
use crate::proto::scheduler_service_client::SchedulerServiceClient;
use crate::proto::worker_service_server::WorkerServiceServer;
use crate::proto::{DeregisterRequest, RegisterWorkerRequest};
use crate::transport;
use crate::worker::heartbeat::{HeartbeatLoop, WorkerIdentity};
use crate::worker::progress::ProgressReporter;
use crate::worker::service::WorkerApi;

const REGISTER_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// The worker role: dispatch endpoint, registration, heartbeats.
pub struct WorkerRuntime {
    config: WorkerConfig,
    capacity: u32,
    incoming: TcpListenerStream,
    advertised_addr: SocketAddr,
}

impl WorkerRuntime {
    /// Bind the dispatch endpoint and resolve capacity.
    ///
    /// Binding happens before registration so the advertised address is
    /// the real one even when an ephemeral port was requested.
    pub async fn bind(config: WorkerConfig) -> Result<Self> {
        Self::bind_with_probe(config, &SystemCoreCount).await
    }

    pub async fn bind_with_probe(
        config: WorkerConfig,
        probe: &dyn CoreCountProbe,
    ) -> Result<Self> {
        let capacity = config.capacity_mode.resolve(probe);
        let (incoming, advertised_addr) = transport::bind(config.listen_addr).await?;

        tracing::info!(
            worker_id = %config.worker_id,
            capacity,
            addr = %advertised_addr,
            "Worker endpoint bound"
        );

        Ok(Self {
            config,
            capacity,
            incoming,
            advertised_addr,
        })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.advertised_addr
    }

    /// Register, start heartbeating, and serve assignments until
    /// shutdown; then deregister so in-flight jobs reschedule at once
    /// instead of waiting out the heartbeat timeout.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let scheduler_channel =
            transport::connect(self.config.scheduler_addr, self.config.timeout)?;
        let progress_channel = transport::connect(self.config.progress_addr, self.config.timeout)?;

        let identity = WorkerIdentity {
            worker_id: self.config.worker_id.clone(),
            capacity: self.capacity,
            address: self.advertised_addr.to_string(),
        };

        register_with_backoff(
            scheduler_channel.clone(),
            &identity,
            self.config.timeout,
            self.config.register_attempts,
        )
        .await?;

        let heartbeat = HeartbeatLoop::new(
            scheduler_channel.clone(),
            identity.clone(),
            self.config.heartbeat_interval,
            self.config.timeout,
        );
        let heartbeat_shutdown = shutdown.clone();
        tokio::spawn(async move {
            heartbeat.run(heartbeat_shutdown).await;
        });

        let progress = ProgressReporter::new(
            progress_channel,
            self.config.worker_id.clone(),
            self.config.timeout,
        );
        let api = WorkerApi::new(
            self.config.worker_id.clone(),
            self.capacity,
            scheduler_channel.clone(),
            progress,
            self.config.timeout,
            shutdown.clone(),
        );

        tracing::info!(worker_id = %self.config.worker_id, "Worker serving assignments");

        Server::builder()
            .add_service(WorkerServiceServer::new(api))
            .serve_with_incoming_shutdown(self.incoming, shutdown.cancelled())
            .await?;

        // Graceful disconnect: tell the scheduler we are gone so it can
        // reschedule anything still charged to us.
        let mut client = SchedulerServiceClient::new(scheduler_channel);
        match transport::request(
            "scheduler",
            self.config.timeout,
            client.deregister(DeregisterRequest {
                worker_id: self.config.worker_id.clone(),
            }),
        )
        .await
        {
            Ok(response) => {
                tracing::info!(
                    rescheduled = response.rescheduled_jobs,
                    "Deregistered from scheduler"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Deregistration failed, scheduler will time us out");
            }
        }

        tracing::info!("Worker stopped");
        Ok(())
    }
}

/// Register with the scheduler, retrying with exponential backoff and
/// jitter. Exhausting the attempts is fatal to the worker process.
async fn register_with_backoff(
    channel: Channel,
    identity: &WorkerIdentity,
    timeout: Duration,
    attempts: u32,
) -> Result<()> {
    let mut client = SchedulerServiceClient::new(channel);

    for attempt in 1..=attempts {
        let result = transport::request(
            "scheduler",
            timeout,
            client.register_worker(RegisterWorkerRequest {
                worker_id: identity.worker_id.clone(),
                capacity: identity.capacity,
                address: identity.address.clone(),
            }),
        )
        .await;

        match result {
            Ok(_) => {
                tracing::info!(
                    worker_id = %identity.worker_id,
                    capacity = identity.capacity,
                    "Registered with scheduler"
                );
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Registration attempt failed");
                if attempt < attempts {
                    let backoff = REGISTER_BACKOFF_BASE * 2u32.saturating_pow(attempt - 1);
                    let jitter = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 2);
                    tokio::time::sleep(backoff + Duration::from_millis(jitter)).await;
                }
            }
        }
    }

    Err(LrtsError::Registration { attempts })
}
