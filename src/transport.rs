//! Message transport between roles.
//!
//! Every role binds one listening endpoint and talks to its peers over
//! gRPC channels. This module centralizes the three transport concerns
//! the roles share: binding (so a taken port surfaces as a startup
//! error rather than a late serve failure), connecting with a bounded
//! wait, and wrapping individual exchanges in the role's communication
//! timeout.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Endpoint};

use crate::error::{LrtsError, Result};

/// Bind a listening endpoint, returning the incoming-connection stream
/// and the actual bound address (relevant when port 0 was requested).
pub async fn bind(addr: SocketAddr) -> Result<(TcpListenerStream, SocketAddr)> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| LrtsError::Bind { addr, source })?;
    let bound = listener
        .local_addr()
        .map_err(|source| LrtsError::Bind { addr, source })?;
    Ok((TcpListenerStream::new(listener), bound))
}

/// Open a client channel to a remote endpoint.
///
/// The connection itself is lazy; the timeout bounds each connection
/// attempt made when the first request goes out.
pub fn connect(addr: SocketAddr, timeout: Duration) -> Result<Channel> {
    let endpoint = Endpoint::from_shared(format!("http://{}", addr))
        .map_err(LrtsError::Transport)?
        .connect_timeout(timeout)
        .timeout(timeout);
    Ok(endpoint.connect_lazy())
}

/// Bound a single request/reply exchange by the communication timeout.
///
/// Returns the reply, or `LrtsError::Timeout` naming the peer when the
/// deadline passes first.
pub async fn request<T, F>(peer: &str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<tonic::Response<T>, tonic::Status>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(response)) => Ok(response.into_inner()),
        Ok(Err(status)) => Err(LrtsError::Grpc(status)),
        Err(_) => Err(LrtsError::Timeout {
            peer: peer.to_string(),
            timeout_secs: timeout.as_secs(),
        }),
    }
}
