//! Progress server role: an advisory, last-write-wins store of the
//! latest progress payload per job.
//!
//! Progress is telemetry, not job state. The store is ephemeral: a
//! restart loses it, and that is acceptable because the scheduler is
//! the authoritative source of job status.

pub mod server;
pub mod service;
pub mod store;

pub use server::ProgressServer;
pub use store::{ProgressEntry, ProgressStore};
