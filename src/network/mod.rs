//! Network status monitoring.
//!
//! [`NetworkMonitor`] holds the online/offline state behind a
//! `tokio::sync::watch` channel and broadcasts a [`NetworkNotice`] on each
//! real transition. [`spawn_reconnect_sync`] wires reconnects to the
//! [`SyncReconciler`](crate::sync::SyncReconciler).

mod monitor;
mod probe;

pub use monitor::{Connectivity, NetworkMonitor, NetworkNotice, spawn_reconnect_sync};
pub use probe::{ConnectivityProbe, HttpProbe, StaticProbe};
