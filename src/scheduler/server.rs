use std::net::SocketAddr;

use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::proto::scheduler_service_server::SchedulerServiceServer;
use crate::scheduler::core::SchedulerCore;
use crate::scheduler::service::SchedulerApi;
use crate::transport;

/// The scheduler role: the core event loop plus its gRPC surface.
pub struct SchedulerServer {
    config: SchedulerConfig,
    incoming: TcpListenerStream,
    bound_addr: SocketAddr,
}

impl SchedulerServer {
    /// Bind the listening endpoint. Fails fast when the port is taken.
    pub async fn bind(config: SchedulerConfig) -> Result<Self> {
        let (incoming, bound_addr) = transport::bind(config.listen_addr).await?;
        Ok(Self {
            config,
            incoming,
            bound_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.bound_addr
    }

    /// Spawn the scheduler core and serve RPCs until shutdown.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let (core, handle, rx) = SchedulerCore::new(self.config);
        let core_shutdown = shutdown.clone();
        tokio::spawn(async move {
            core.run(rx, core_shutdown).await;
        });

        tracing::info!(addr = %self.bound_addr, "Scheduler listening");

        Server::builder()
            .add_service(SchedulerServiceServer::new(SchedulerApi::new(handle)))
            .serve_with_incoming_shutdown(self.incoming, shutdown.cancelled())
            .await?;

        tracing::info!("Scheduler stopped");
        Ok(())
    }
}
