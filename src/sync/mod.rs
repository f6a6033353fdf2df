//! Progress synchronization with the remote system of record.
//!
//! Reconciliation is last-write-wins: every attempt sends the full set of
//! local progress and the backend keeps whatever arrives last.

mod backend;
mod error;
mod reconciler;

pub use backend::{HttpBackend, ProgressBatch, RemoteBackend};
pub use error::SyncError;
pub use reconciler::{SyncReconciler, SyncReport};
