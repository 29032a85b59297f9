use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LrtsError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Exchange with {peer} exceeded the {timeout_secs}s communication timeout")]
    Timeout { peer: String, timeout_secs: u64 },

    #[error("Worker registration failed after {attempts} attempts")]
    Registration { attempts: u32 },

    #[error("Job execution failed: {0}")]
    JobExecution(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Worker not found: {0}")]
    WorkerNotFound(String),

    #[error("Invalid capacity flag: {0}")]
    InvalidCapacity(i64),

    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LrtsError>;
