//! Error types for the download module.
//!
//! A [`DownloadError`] inside a running job is not fatal: the orchestrator
//! records it on the job, flips the job to `failed`, and the learner may
//! request the download again.

use thiserror::Error;

use super::job::{JobKey, JobKind};
use crate::store::{CourseId, EntityId, StoreError};

/// Errors that can occur while requesting or driving a download job.
#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// The requested module/resource does not belong to the supplied course.
    #[error(
        "{kind} {target_id} is not part of course {course_id}\n  Suggestion: Refresh the course before downloading"
    )]
    UnknownTarget {
        /// Granularity of the rejected request.
        kind: JobKind,
        /// Course the request was made against.
        course_id: CourseId,
        /// Module or resource id that was not found.
        target_id: EntityId,
    },

    /// The progress source reported a failure mid-transfer.
    #[error("transfer of {key} stopped: {reason}")]
    Transfer {
        /// Job whose transfer failed.
        key: JobKey,
        /// Human-readable cause.
        reason: String,
    },

    /// The completed artifact could not be written to the store.
    #[error("failed to store downloaded {key}: {source}")]
    Commit {
        /// Job whose artifact failed to persist.
        key: JobKey,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },
}

impl DownloadError {
    /// Creates a transfer error for a job.
    pub fn transfer(key: JobKey, reason: impl Into<String>) -> Self {
        Self::Transfer {
            key,
            reason: reason.into(),
        }
    }

    /// Creates a commit error wrapping a store failure.
    #[must_use]
    pub fn commit(key: JobKey, source: StoreError) -> Self {
        Self::Commit { key, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreDbErrorKind;

    #[test]
    fn test_unknown_target_display_has_suggestion() {
        let error = DownloadError::UnknownTarget {
            kind: JobKind::Module,
            course_id: 1,
            target_id: 42,
        };
        let msg = error.to_string();
        assert!(msg.contains("module 42"), "got: {msg}");
        assert!(msg.contains("course 1"));
        assert!(msg.contains("Suggestion"));
    }

    #[test]
    fn test_transfer_display_names_job() {
        let error = DownloadError::transfer(JobKey::resource(1, 9), "connection reset");
        let msg = error.to_string();
        assert!(msg.contains("resource 9 of course 1"), "got: {msg}");
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_commit_keeps_store_cause() {
        let error = DownloadError::commit(
            JobKey::course(3),
            StoreError::Database {
                kind: StoreDbErrorKind::Io,
                message: "disk full".to_string(),
            },
        );
        assert!(error.to_string().contains("disk full"));
        assert!(std::error::Error::source(&error).is_some());
    }
}
