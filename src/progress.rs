//! Write path for learner progress.
//!
//! Lesson and module completion events land here. Writes go straight to the
//! store whether or not the device is online; the sync reconciler picks them
//! up on the next reconnect.

use chrono::Utc;
use tracing::{info, instrument};

use crate::store::{
    BadgeRecord, CourseId, CourseSnapshot, EntityId, ModuleProgressDetail, ProgressRecord, Result,
    Store,
};

/// Records completions, module flips and earned badges.
#[derive(Debug, Clone)]
pub struct LearnerProgress {
    store: Store,
}

impl LearnerProgress {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Upserts the enrollment's completion fraction, clamped to `[0, 1]`.
    ///
    /// A non-finite fraction is stored as 0.
    ///
    /// # Errors
    ///
    /// Returns the store error if the write fails.
    #[instrument(skip(self))]
    pub async fn record_completion(
        &self,
        enrollment_id: EntityId,
        course_id: CourseId,
        fraction: f64,
    ) -> Result<ProgressRecord> {
        let completion_fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let record = ProgressRecord {
            enrollment_id,
            course_id,
            completion_fraction,
            last_updated: Utc::now(),
        };
        self.store.put(&record).await?;
        info!(completion_fraction, "progress recorded");
        Ok(record)
    }

    /// Flips one module's completion and recomputes the course fraction in
    /// the same write.
    ///
    /// # Errors
    ///
    /// Returns the store error if the update fails; nothing is written then.
    #[instrument(skip(self, course), fields(course_id = course.id))]
    pub async fn set_module_completed(
        &self,
        course: &CourseSnapshot,
        module_id: EntityId,
        completed: bool,
    ) -> Result<ModuleProgressDetail> {
        let detail = self
            .store
            .update::<ModuleProgressDetail, _>(&course.id, |current| {
                let mut detail =
                    current.unwrap_or_else(|| ModuleProgressDetail::for_course(course));
                detail.set_completed(module_id, completed);
                detail
            })
            .await?;
        info!(
            completed = detail.completed_count(),
            total = detail.modules.len(),
            "module progress updated"
        );
        Ok(detail)
    }

    /// Deletes an enrollment's local progress record.
    ///
    /// # Errors
    ///
    /// Returns the store error if the delete fails.
    pub async fn reset(&self, enrollment_id: EntityId) -> Result<bool> {
        self.store.delete::<ProgressRecord>(&enrollment_id).await
    }

    /// Caches a badge the learner earned.
    ///
    /// # Errors
    ///
    /// Returns the store error if the write fails.
    pub async fn record_badge(&self, badge: &BadgeRecord) -> Result<()> {
        self.store.put(badge).await
    }
}
