//! lrts: a task distribution service built from three cooperating roles.
//!
//! - **Scheduler** accepts job submissions and assigns them to registered
//!   workers within their advertised capacity.
//! - **Worker** executes assigned jobs in parallel (bounded by its
//!   capacity) and streams progress to the progress server.
//! - **Progress server** keeps the latest progress payload per job for
//!   querying.
//!
//! Execution is at-least-once: when a worker stops heartbeating, its
//! in-flight jobs are returned to the queue and may run again if the
//! worker later resurfaces. Job bodies that need exactly-once effects
//! must be idempotent. The scheduler's job table is the authoritative
//! job-state source; progress is advisory and ephemeral.

pub mod capacity;
pub mod config;
pub mod error;
pub mod progress;
pub mod scheduler;
pub mod shutdown;
pub mod transport;
pub mod worker;

// Re-export generated protobuf types
pub mod proto {
    tonic::include_proto!("lrts");
}
