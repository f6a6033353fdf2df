//! Read-side queries over cached content and download state.
//!
//! [`CacheQuery`] never writes. It combines the store (what is durably
//! cached) with the orchestrator's job table (what is in flight).

use tracing::instrument;

use crate::download::{DownloadOrchestrator, JobKey, JobKind, JobSnapshot};
use crate::store::{
    BadgeRecord, CachedCourseRecord, CourseId, ModuleProgressDetail, ProgressRecord,
    ResourceRecord, Result, Store,
};

/// Answers "is this available offline" and "how far along is it".
#[derive(Debug, Clone)]
pub struct CacheQuery {
    store: Store,
    orchestrator: DownloadOrchestrator,
}

impl CacheQuery {
    #[must_use]
    pub fn new(store: Store, orchestrator: DownloadOrchestrator) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// Whether the artifact for `key` is in the store.
    ///
    /// # Errors
    ///
    /// Returns the store error if the lookup fails.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn is_available_offline(&self, key: &JobKey) -> Result<bool> {
        match key.kind {
            JobKind::Course => Ok(self
                .store
                .get::<CachedCourseRecord>(&key.entity_id)
                .await?
                .is_some()),
            JobKind::Module => Ok(self
                .store
                .get::<ModuleProgressDetail>(&key.course_id())
                .await?
                .and_then(|detail| detail.module(key.entity_id).map(|m| m.available_offline))
                .unwrap_or(false)),
            JobKind::Resource => Ok(self
                .store
                .get::<ResourceRecord>(&key.entity_id)
                .await?
                .is_some_and(|record| record.course_id == key.course_id())),
        }
    }

    /// Live job state, or `completed`/100 for stored artifacts, else `idle`/0.
    ///
    /// # Errors
    ///
    /// Returns the store error if there is no live job and the lookup fails.
    pub async fn get_progress(&self, key: &JobKey) -> Result<JobSnapshot> {
        if let Some(job) = self.orchestrator.job(key) {
            return Ok(job.snapshot());
        }
        if self.is_available_offline(key).await? {
            Ok(JobSnapshot::CACHED)
        } else {
            Ok(JobSnapshot::IDLE)
        }
    }

    /// # Errors
    ///
    /// Returns the store error if the lookup fails.
    pub async fn get_cached_course(&self, course_id: CourseId) -> Result<Option<CachedCourseRecord>> {
        self.store.get(&course_id).await
    }

    /// # Errors
    ///
    /// Returns the store error if the read fails.
    pub async fn cached_courses(&self) -> Result<Vec<CachedCourseRecord>> {
        self.store.get_all().await
    }

    /// Resources downloaded for one course.
    ///
    /// # Errors
    ///
    /// Returns the store error if the read fails.
    pub async fn downloaded_resources(&self, course_id: CourseId) -> Result<Vec<ResourceRecord>> {
        let all: Vec<ResourceRecord> = self.store.get_all().await?;
        Ok(all
            .into_iter()
            .filter(|record| record.course_id == course_id)
            .collect())
    }

    /// # Errors
    ///
    /// Returns the store error if the read fails.
    pub async fn earned_badges(&self) -> Result<Vec<BadgeRecord>> {
        self.store.get_all().await
    }

    /// # Errors
    ///
    /// Returns the store error if the read fails.
    pub async fn progress_records(&self) -> Result<Vec<ProgressRecord>> {
        self.store.get_all().await
    }

    /// # Errors
    ///
    /// Returns the store error if the lookup fails.
    pub async fn module_progress(&self, course_id: CourseId) -> Result<Option<ModuleProgressDetail>> {
        self.store.get(&course_id).await
    }
}
