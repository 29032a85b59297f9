//! Scheduler role: job intake, worker registry, and assignment.
//!
//! All mutable scheduler state (the job table and the worker registry)
//! is owned by a single [`core::SchedulerCore`] task; the gRPC surface
//! in [`service`] only passes messages into it. This keeps every
//! mutation on one logical thread without lock discipline.

pub mod core;
pub mod job;
pub mod queue;
pub mod registry;
pub mod server;
pub mod service;

pub use core::{SchedulerCore, SchedulerHandle, SchedulerMessage};
pub use job::{Job, JobState};
pub use queue::JobQueue;
pub use registry::WorkerRegistry;
pub use server::SchedulerServer;
