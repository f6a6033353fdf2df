//! Crate-wide error umbrella and failure taxonomy.

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::db::DbError;
use crate::download::DownloadError;
use crate::leaderboard::LeaderboardError;
use crate::store::StoreError;
use crate::sync::SyncError;

/// Coarse failure class for reporting and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Local storage could not be opened, read or written.
    StorageFailure,
    /// A download job could not be started or finished.
    DownloadFailure,
    /// Reaching the remote side failed.
    SyncFailure,
    /// Configuration is missing or invalid.
    Configuration,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StorageFailure => "storage_failure",
            Self::DownloadFailure => "download_failure",
            Self::SyncFailure => "sync_failure",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Any error the library surfaces.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CoreError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Database(_)
            | Self::Store(_)
            | Self::Sync(SyncError::Storage(_))
            | Self::Leaderboard(LeaderboardError::Store(_)) => ErrorKind::StorageFailure,
            Self::Download(_) => ErrorKind::DownloadFailure,
            Self::Sync(_) | Self::Leaderboard(LeaderboardError::Fetch { .. }) => {
                ErrorKind::SyncFailure
            }
            Self::Config(_) => ErrorKind::Configuration,
        }
    }
}
