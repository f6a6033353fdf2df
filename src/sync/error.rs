//! Error types for progress synchronization.

use thiserror::Error;

use crate::store::StoreError;

/// Errors from a reconciliation attempt.
///
/// Cloneable so coalesced callers can each receive the shared outcome.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Local progress could not be read.
    #[error("failed to read local progress: {0}")]
    Storage(#[from] StoreError),

    /// The request never got a response.
    #[error("could not reach sync endpoint: {message}\n  Suggestion: Progress stays saved locally and will be sent on the next reconnect")]
    Transport { message: String },

    /// The backend answered with a non-success status.
    #[error("sync endpoint rejected progress batch (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

impl SyncError {
    /// Whether resending the same batch later could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(error) => error.is_busy_or_locked() || error.is_unavailable(),
            Self::Transport { .. } => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport {
            message: error.to_string(),
        }
    }
}
