//! Worker role: capacity-bounded parallel job execution.
//!
//! A worker derives its capacity once at startup, registers it with the
//! scheduler, and then accepts assignments over its own gRPC endpoint.
//! Each job runs as a shell command; stdout lines stream to the
//! progress server best-effort, while the terminal result goes to the
//! scheduler with retries (the scheduler channel is authoritative).

pub mod executor;
pub mod heartbeat;
pub mod progress;
pub mod runner;
pub mod service;

pub use executor::{ExecutionResult, JobExecutor};
pub use runner::WorkerRuntime;
