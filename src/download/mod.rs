//! Offline download orchestration.
//!
//! This module tracks course, module and resource downloads as independent
//! jobs, drives their progress concurrently and commits the finished
//! artifact to the [`Store`](crate::store::Store).
//!
//! # Features
//!
//! - Idempotent start: repeated requests never create a second job
//! - Monotonic progress from 0 to 100
//! - Completion only after the artifact is durable
//! - Failed jobs can be requested again
//! - Advisory size estimates for download buttons

mod error;
mod job;
mod orchestrator;
mod size;
mod source;

pub use error::DownloadError;
pub use job::{DownloadJob, JobEvent, JobKey, JobKind, JobSnapshot, JobStatus};
pub use orchestrator::{
    DEFAULT_EVENT_CAPACITY, DownloadOrchestrator, DownloadRequest, DownloadStats,
};
pub use size::{SizeEstimate, estimate_size};
pub use source::{DEFAULT_STEP, DEFAULT_TICK, ProgressSource, SimulatedProgress};

// No module-local Result alias; use `Result<T, DownloadError>` explicitly.
