//! Download orchestrator: one state machine per job, many jobs at once.
//!
//! The orchestrator owns the in-memory job table. A request creates a job
//! (or returns the existing one), and a spawned Tokio task drives it from
//! its [`ProgressSource`] until it completes or fails.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use course_offline_core::download::{DownloadOrchestrator, DownloadRequest};
//! use course_offline_core::store::{CourseSnapshot, Store};
//! use course_offline_core::Database;
//!
//! # async fn example(course: CourseSnapshot) -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::new(Database::new_in_memory().await?);
//! let orchestrator = DownloadOrchestrator::with_simulated_progress(store);
//! let request = DownloadRequest::course(Arc::new(course));
//! let key = request.key();
//! orchestrator.request_download(request)?;
//! let done = orchestrator.wait_for_terminal(&key).await;
//! println!("{key}: {done}");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use super::error::DownloadError;
use super::job::{DownloadJob, JobEvent, JobKey, JobKind, JobSnapshot, JobStatus};
use super::size::{SizeEstimate, estimate_size};
use super::source::{ProgressSource, SimulatedProgress};
use crate::store::{
    CachedCourseRecord, CourseSnapshot, EntityId, ModuleProgressDetail, ResourceRecord, Store,
};

/// Capacity of the job event channel; slow subscribers see `Lagged`.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A learner's request to make something available offline.
///
/// Carries the course context the UI already holds, so completing a course
/// job can cache the full snapshot.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    kind: JobKind,
    course: Arc<CourseSnapshot>,
    target_id: EntityId,
}

impl DownloadRequest {
    #[must_use]
    pub fn course(course: Arc<CourseSnapshot>) -> Self {
        let target_id = course.id;
        Self {
            kind: JobKind::Course,
            course,
            target_id,
        }
    }

    #[must_use]
    pub fn module(course: Arc<CourseSnapshot>, module_id: EntityId) -> Self {
        Self {
            kind: JobKind::Module,
            course,
            target_id: module_id,
        }
    }

    #[must_use]
    pub fn resource(course: Arc<CourseSnapshot>, resource_id: EntityId) -> Self {
        Self {
            kind: JobKind::Resource,
            course,
            target_id: resource_id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    #[must_use]
    pub fn course_snapshot(&self) -> &CourseSnapshot {
        &self.course
    }

    #[must_use]
    pub fn key(&self) -> JobKey {
        match self.kind {
            JobKind::Course => JobKey::course(self.course.id),
            JobKind::Module => JobKey::module(self.course.id, self.target_id),
            JobKind::Resource => JobKey::resource(self.course.id, self.target_id),
        }
    }

    /// Advisory size of this download.
    #[must_use]
    pub fn size_estimate(&self) -> SizeEstimate {
        estimate_size(self.kind, &self.course, self.target_id)
    }

    fn validate(&self) -> Result<(), DownloadError> {
        let known = match self.kind {
            JobKind::Course => true,
            JobKind::Module => self.course.module(self.target_id).is_some(),
            JobKind::Resource => self.course.resource(self.target_id).is_some(),
        };
        if known {
            Ok(())
        } else {
            Err(DownloadError::UnknownTarget {
                kind: self.kind,
                course_id: self.course.id,
                target_id: self.target_id,
            })
        }
    }
}

/// Counters over the orchestrator's lifetime.
#[derive(Debug, Default)]
pub struct DownloadStats {
    started: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl DownloadStats {
    /// Jobs created (including restarts of failed jobs).
    #[must_use]
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    fn increment_started(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Owns every download job and drives them concurrently.
///
/// # Concurrency Model
///
/// - Each job runs in its own Tokio task; its progress steps are sequential
/// - Start eligibility is decided under the job table's entry lock, so two
///   racing requests for one key create at most one job
/// - The store artifact is written before a job is marked `completed`
///
/// Cloning is cheap and shares the job table.
#[derive(Clone)]
pub struct DownloadOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Store,
    jobs: DashMap<JobKey, DownloadJob>,
    source: Arc<dyn ProgressSource>,
    events: broadcast::Sender<JobEvent>,
    stats: DownloadStats,
}

impl std::fmt::Debug for DownloadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("jobs", &self.inner.jobs.len())
            .field("stats", &self.inner.stats)
            .finish_non_exhaustive()
    }
}

impl DownloadOrchestrator {
    /// Creates an orchestrator that commits artifacts into `store`.
    #[must_use]
    pub fn new(store: Store, source: Arc<dyn ProgressSource>) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                jobs: DashMap::new(),
                source,
                events,
                stats: DownloadStats::default(),
            }),
        }
    }

    /// Creates an orchestrator driven by the default timer-based progress.
    #[must_use]
    pub fn with_simulated_progress(store: Store) -> Self {
        Self::new(store, Arc::new(SimulatedProgress::default()))
    }

    /// Subscribes to job state changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    #[must_use]
    pub fn stats(&self) -> &DownloadStats {
        &self.inner.stats
    }

    /// Current state of `key`; `idle` when no job exists.
    #[must_use]
    pub fn snapshot(&self, key: &JobKey) -> JobSnapshot {
        self.inner
            .jobs
            .get(key)
            .map_or(JobSnapshot::IDLE, |job| job.snapshot())
    }

    /// Returns a copy of the job for `key`, if one exists.
    #[must_use]
    pub fn job(&self, key: &JobKey) -> Option<DownloadJob> {
        self.inner.jobs.get(key).map(|job| job.clone())
    }

    /// Returns copies of all jobs currently downloading.
    #[must_use]
    pub fn active_jobs(&self) -> Vec<DownloadJob> {
        self.inner
            .jobs
            .iter()
            .filter(|job| job.status == JobStatus::Downloading)
            .map(|job| job.clone())
            .collect()
    }

    /// Starts a download, or returns the state of the one already tracked.
    ///
    /// Fire-and-forget: the job is driven on a spawned task and the initial
    /// snapshot is returned immediately. Must be called within a Tokio runtime.
    ///
    /// A key that is `downloading` or `completed` is left untouched. A
    /// `failed` key is restarted from progress 0.
    ///
    /// Only the in-memory job table is consulted. After a restart, or after
    /// [`evict_completed`](Self::evict_completed), a key whose artifact is
    /// already stored starts a fresh job at 0 and rewrites the artifact on
    /// completion. Callers that show [`CacheQuery`](crate::CacheQuery)
    /// progress should check `is_available_offline` first if they do not
    /// want a re-download.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::UnknownTarget`] if the module/resource is not
    /// part of the request's course. No job is created in that case.
    #[instrument(skip(self, request), fields(key = %request.key()))]
    pub fn request_download(&self, request: DownloadRequest) -> Result<JobSnapshot, DownloadError> {
        request.validate()?;
        let key = request.key();
        let estimate = request.size_estimate();

        let snapshot = match self.inner.jobs.entry(key) {
            Entry::Occupied(mut occupied) => {
                let job = occupied.get_mut();
                if !job.status.can_start() {
                    debug!(status = %job.status, progress = job.progress, "download already tracked");
                    return Ok(job.snapshot());
                }
                info!(previous_error = ?job.last_error, "restarting failed download");
                *job = DownloadJob::start(key, estimate);
                job.snapshot()
            }
            Entry::Vacant(vacant) => vacant.insert(DownloadJob::start(key, estimate)).snapshot(),
        };

        self.inner.stats.increment_started();
        info!(estimate = %estimate, "download started");
        self.inner.emit(key, snapshot);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.drive(request).await;
        });

        Ok(snapshot)
    }

    /// Drops `completed` jobs from the table and returns how many were removed.
    ///
    /// Their artifacts are in the store, so [`CacheQuery::get_progress`]
    /// keeps reporting them as `completed`/100. A later request for an
    /// evicted key starts a new job. Long-running processes call this to
    /// keep the table bounded by the jobs still in flight or failed.
    ///
    /// [`CacheQuery::get_progress`]: crate::CacheQuery::get_progress
    pub fn evict_completed(&self) -> usize {
        let before = self.inner.jobs.len();
        self.inner
            .jobs
            .retain(|_, job| job.status != JobStatus::Completed);
        let evicted = before.saturating_sub(self.inner.jobs.len());
        if evicted > 0 {
            debug!(evicted, "evicted completed downloads");
        }
        evicted
    }

    /// Waits until `key` is `completed` or `failed` and returns that state.
    ///
    /// Returns immediately with `idle` if no job exists for the key.
    pub async fn wait_for_terminal(&self, key: &JobKey) -> JobSnapshot {
        let mut events = self.subscribe();
        loop {
            let snapshot = self.snapshot(key);
            if snapshot.status != JobStatus::Downloading {
                return snapshot;
            }
            match events.recv().await {
                Ok(event) if event.key == *key && event.snapshot.status.is_terminal() => {
                    return event.snapshot;
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return self.snapshot(key),
            }
        }
    }
}

impl Inner {
    fn emit(&self, key: JobKey, snapshot: JobSnapshot) {
        // No subscribers is fine.
        let _ = self.events.send(JobEvent { key, snapshot });
    }

    #[instrument(skip(self, request), fields(key = %request.key()))]
    async fn drive(&self, request: DownloadRequest) {
        let key = request.key();
        let mut progress = 0u8;

        loop {
            let next = match self.source.next_progress(&key, progress).await {
                Ok(next) => next.clamp(progress, 100),
                Err(error) => {
                    self.fail(&key, &error);
                    return;
                }
            };

            if next >= 100 {
                match self.commit(&request).await {
                    Ok(()) => self.complete(&key),
                    Err(error) => self.fail(&key, &error),
                }
                return;
            }

            if next > progress {
                progress = next;
                self.advance(&key, next);
            }
        }
    }

    /// Writes the artifact for a finished transfer.
    async fn commit(&self, request: &DownloadRequest) -> Result<(), DownloadError> {
        let key = request.key();
        let course = request.course_snapshot();

        let result = match request.kind() {
            JobKind::Course => {
                self.store
                    .put(&CachedCourseRecord {
                        course: course.clone(),
                        cached_at: Utc::now(),
                    })
                    .await
            }
            JobKind::Module => self
                .store
                .update::<ModuleProgressDetail, _>(&course.id, |current| {
                    let mut detail =
                        current.unwrap_or_else(|| ModuleProgressDetail::for_course(course));
                    detail.set_available_offline(key.entity_id, true);
                    detail
                })
                .await
                .map(|_| ()),
            JobKind::Resource => {
                let Some(resource) = course.resource(key.entity_id) else {
                    return Err(DownloadError::UnknownTarget {
                        kind: JobKind::Resource,
                        course_id: course.id,
                        target_id: key.entity_id,
                    });
                };
                self.store
                    .put(&ResourceRecord::from_snapshot(course.id, resource))
                    .await
            }
        };

        result.map_err(|source| DownloadError::commit(key, source))
    }

    fn advance(&self, key: &JobKey, next: u8) {
        let changed = self
            .jobs
            .get_mut(key)
            .map(|mut job| job.advance(next).then(|| job.snapshot()));
        if let Some(Some(snapshot)) = changed {
            debug!(%key, progress = snapshot.progress, "download progress");
            self.emit(*key, snapshot);
        }
    }

    fn complete(&self, key: &JobKey) {
        let snapshot = self.jobs.get_mut(key).map(|mut job| {
            job.complete();
            job.snapshot()
        });
        if let Some(snapshot) = snapshot {
            self.stats.increment_completed();
            info!(%key, "download completed");
            self.emit(*key, snapshot);
        }
    }

    fn fail(&self, key: &JobKey, error: &DownloadError) {
        let snapshot = self.jobs.get_mut(key).map(|mut job| {
            job.fail(error.to_string());
            job.snapshot()
        });
        if let Some(snapshot) = snapshot {
            self.stats.increment_failed();
            warn!(%key, progress = snapshot.progress, error = %error, "download failed");
            self.emit(*key, snapshot);
        }
    }
}
