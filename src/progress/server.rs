use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

use crate::config::ProgressConfig;
use crate::error::Result;
use crate::progress::service::ProgressApi;
use crate::progress::store::ProgressStore;
use crate::proto::progress_service_server::ProgressServiceServer;
use crate::transport;

/// The progress server role.
pub struct ProgressServer {
    incoming: TcpListenerStream,
    bound_addr: SocketAddr,
}

impl ProgressServer {
    pub async fn bind(config: ProgressConfig) -> Result<Self> {
        let (incoming, bound_addr) = transport::bind(config.listen_addr).await?;
        Ok(Self {
            incoming,
            bound_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.bound_addr
    }

    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let store = Arc::new(RwLock::new(ProgressStore::new()));

        tracing::info!(addr = %self.bound_addr, "Progress server listening");

        Server::builder()
            .add_service(ProgressServiceServer::new(ProgressApi::new(store)))
            .serve_with_incoming_shutdown(self.incoming, shutdown.cancelled())
            .await?;

        tracing::info!("Progress server stopped");
        Ok(())
    }
}
