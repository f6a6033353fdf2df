//! Course Offline Core Library
//!
//! Offline content cache and progress synchronization for the learning
//! platform. Learners keep using downloaded courses while disconnected;
//! progress made offline is pushed to the server once the network returns.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - `SQLite` connection and schema management
//! - [`store`] - Keyed collections of cached records
//! - [`download`] - Download job state machines and orchestration
//! - [`network`] - Observable online/offline state
//! - [`sync`] - Reconciliation of local progress with the backend
//! - [`query`] - Read-side queries over cache and job state
//! - [`progress`] - Write path for learner progress
//! - [`leaderboard`] - Read-through leaderboard cache
//! - [`config`] - TOML configuration loading

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod db;
pub mod download;
pub mod error;
pub mod http;
pub mod leaderboard;
pub mod network;
pub mod progress;
pub mod query;
pub mod store;
pub mod sync;
mod user_agent;

// Re-export commonly used types
pub use config::{
    ConfigError, FileConfig, LoadedConfig, OfflineConfig, load_config_file, load_default_config,
    resolve_default_config_path,
};
pub use db::{Database, DatabaseOptions, DbError};
pub use download::{
    DownloadError, DownloadJob, DownloadOrchestrator, DownloadRequest, JobEvent, JobKey, JobKind,
    JobSnapshot, JobStatus, ProgressSource, SimulatedProgress, SizeEstimate, estimate_size,
};
pub use error::{CoreError, ErrorKind};
pub use http::HttpTimeouts;
pub use leaderboard::{Freshness, LeaderboardCache, LeaderboardError, LeaderboardView};
pub use network::{
    Connectivity, ConnectivityProbe, HttpProbe, NetworkMonitor, NetworkNotice, StaticProbe,
    spawn_reconnect_sync,
};
pub use progress::LearnerProgress;
pub use query::CacheQuery;
pub use store::{
    BadgeRecord, CachedCourseRecord, Collection, CourseId, CourseSnapshot, EntityId,
    LeaderboardEntry, LeaderboardPeriod, LeaderboardSnapshot, ModuleProgressDetail, ModuleSnapshot,
    ModuleState, ProgressRecord, Record, ResourceRecord, ResourceSnapshot, Store, StoreDbErrorKind,
    StoreError,
};
pub use sync::{HttpBackend, ProgressBatch, RemoteBackend, SyncError, SyncReconciler, SyncReport};
