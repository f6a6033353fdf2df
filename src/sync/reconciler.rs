//! Reconciliation of locally persisted progress with the backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::{debug, info, instrument, warn};

use super::backend::{ProgressBatch, RemoteBackend};
use super::error::SyncError;
use crate::store::{ModuleProgressDetail, ProgressRecord, Store};

type SyncFuture = Shared<BoxFuture<'static, Result<SyncReport, SyncError>>>;

/// Outcome of one reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Progress records read from the store.
    pub records: usize,
    /// Module progress details read from the store.
    pub module_progress: usize,
    /// When the batch was accepted; `None` if there was nothing to send.
    pub submitted_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    #[must_use]
    pub fn submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

/// Pushes local progress to a [`RemoteBackend`].
///
/// At most one reconciliation runs at a time. Calls that arrive while one is
/// in flight wait for it and receive the same result.
pub struct SyncReconciler {
    store: Store,
    backend: Arc<dyn RemoteBackend>,
    in_flight: Mutex<Option<(u64, SyncFuture)>>,
    generation: AtomicU64,
}

impl std::fmt::Debug for SyncReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncReconciler")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SyncReconciler {
    #[must_use]
    pub fn new(store: Store, backend: Arc<dyn RemoteBackend>) -> Self {
        Self {
            store,
            backend,
            in_flight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Reads all progress from the store and submits it as one batch.
    ///
    /// Nothing local is changed on success or failure; a failed batch is
    /// resent in full by the next call.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`] if progress cannot be read, or the
    /// backend's error if the batch is not accepted.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<SyncReport, SyncError> {
        let (generation, attempt) = self.join_or_start();
        let result = attempt.await;
        self.clear(generation);
        result
    }

    fn clear(&self, generation: u64) {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|(current, _)| *current == generation) {
            *slot = None;
        }
    }

    fn join_or_start(&self) -> (u64, SyncFuture) {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((generation, attempt)) = slot.as_ref() {
            debug!(generation, "joining in-flight reconciliation");
            return (*generation, attempt.clone());
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let attempt = run(self.store.clone(), Arc::clone(&self.backend))
            .boxed()
            .shared();
        *slot = Some((generation, attempt.clone()));
        (generation, attempt)
    }
}

async fn run(store: Store, backend: Arc<dyn RemoteBackend>) -> Result<SyncReport, SyncError> {
    let records = store.get_all::<ProgressRecord>().await?;
    let module_progress = store.get_all::<ModuleProgressDetail>().await?;

    let mut report = SyncReport {
        records: records.len(),
        module_progress: module_progress.len(),
        submitted_at: None,
    };

    let batch = ProgressBatch {
        records,
        module_progress,
        submitted_at: Utc::now(),
    };
    if batch.is_empty() {
        debug!("no local progress to sync");
        return Ok(report);
    }

    match backend.submit_progress(&batch).await {
        Ok(()) => {
            info!(
                records = report.records,
                modules = report.module_progress,
                "progress batch submitted"
            );
            report.submitted_at = Some(batch.submitted_at);
            Ok(report)
        }
        Err(error) => {
            warn!(error = %error, retryable = error.is_retryable(), "progress batch not accepted");
            Err(error)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;
    use crate::Database;

    #[derive(Default)]
    struct CountingBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteBackend for CountingBackend {
        async fn submit_progress(&self, _batch: &ProgressBatch) -> Result<(), SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn store() -> Store {
        Store::new(Database::new_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_empty_store_skips_submission() {
        let backend = Arc::new(CountingBackend::default());
        let reconciler = SyncReconciler::new(store().await, backend.clone());

        let report = reconciler.reconcile().await.unwrap();

        assert!(!report.submitted());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_progress_is_submitted_and_kept() {
        let store = store().await;
        store
            .put(&ProgressRecord {
                enrollment_id: 7,
                course_id: 1,
                completion_fraction: 0.5,
                last_updated: Utc::now(),
            })
            .await
            .unwrap();
        let backend = Arc::new(CountingBackend::default());
        let reconciler = SyncReconciler::new(store.clone(), backend.clone());

        let report = reconciler.reconcile().await.unwrap();

        assert!(report.submitted());
        assert_eq!(report.records, 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.count::<ProgressRecord>().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sequential_calls_each_submit() {
        let store = store().await;
        store
            .put(&ProgressRecord {
                enrollment_id: 1,
                course_id: 1,
                completion_fraction: 0.1,
                last_updated: Utc::now(),
            })
            .await
            .unwrap();
        let backend = Arc::new(CountingBackend::default());
        let reconciler = SyncReconciler::new(store, backend.clone());

        reconciler.reconcile().await.unwrap();
        reconciler.reconcile().await.unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }
}
