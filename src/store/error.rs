//! Error types for persistent store operations.

use std::fmt;

use thiserror::Error;

use super::Collection;

/// Structured classification for store/database failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreDbErrorKind {
    /// `SQLite` returned busy/locked under concurrent access.
    BusyOrLocked,
    /// Constraint failure (unique/check/not-null).
    ConstraintViolation,
    /// Connection pool timed out waiting for a free connection.
    PoolTimeout,
    /// Connection pool is closed.
    PoolClosed,
    /// Expected row was not found.
    RowNotFound,
    /// Filesystem or transport IO failure (includes disk full).
    Io,
    /// SQL protocol/driver error.
    Protocol,
    /// Unclassified database failure.
    Other,
}

impl StoreDbErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::RowNotFound => Self::RowNotFound,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::Protocol(_) => Self::Protocol,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for StoreDbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::RowNotFound => "row_not_found",
            Self::Io => "io",
            Self::Protocol => "protocol",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(
    database_error: &(dyn sqlx::error::DatabaseError + 'static),
) -> StoreDbErrorKind {
    let code = database_error.code();
    if matches!(
        code.as_deref(),
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
    ) {
        return StoreDbErrorKind::BusyOrLocked;
    }

    if database_error.is_unique_violation()
        || database_error.is_check_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT"))
    {
        return StoreDbErrorKind::ConstraintViolation;
    }

    // SQLITE_FULL (13): quota or disk exhausted.
    if matches!(code.as_deref(), Some("SQLITE_FULL" | "13")) {
        return StoreDbErrorKind::Io;
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("database is busy")
    {
        return StoreDbErrorKind::BusyOrLocked;
    }

    StoreDbErrorKind::Other
}

/// Errors that can occur during store operations.
///
/// Any of these means the operation did not happen.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("storage error ({kind}): {message}")]
    Database {
        /// Typed classification used for failure handling.
        kind: StoreDbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// A record or key could not be encoded/decoded as JSON.
    #[error("failed to (de)serialize record in '{collection}': {message}")]
    Serialization {
        /// Collection the record belongs to.
        collection: Collection,
        /// serde_json error text.
        message: String,
    },

    /// An update closure returned a record whose key differs from the one being updated.
    #[error("update in '{collection}' changed the record key from {expected} to {actual}")]
    KeyMismatch {
        /// Collection being updated.
        collection: Collection,
        /// Encoded key passed to `update`.
        expected: String,
        /// Encoded key of the returned record.
        actual: String,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: StoreDbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl StoreError {
    pub(crate) fn serialization(collection: Collection, err: &serde_json::Error) -> Self {
        Self::Serialization {
            collection,
            message: err.to_string(),
        }
    }

    /// Returns the typed database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<StoreDbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            Self::Serialization { .. } | Self::KeyMismatch { .. } => None,
        }
    }

    /// Returns true when this error is a database busy/locked condition.
    #[must_use]
    pub fn is_busy_or_locked(&self) -> bool {
        self.database_kind() == Some(StoreDbErrorKind::BusyOrLocked)
    }

    /// Returns true when the store is gone (pool closed) rather than a single op failing.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self.database_kind(),
            Some(StoreDbErrorKind::PoolClosed | StoreDbErrorKind::PoolTimeout)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_database_message() {
        let err = StoreError::Database {
            kind: StoreDbErrorKind::Other,
            message: "connection failed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("storage error"));
        assert!(msg.contains("other"));
        assert!(msg.contains("connection failed"));
    }

    #[test]
    fn test_store_error_busy_flag() {
        let err = StoreError::Database {
            kind: StoreDbErrorKind::BusyOrLocked,
            message: "database is locked".to_string(),
        };
        assert_eq!(err.database_kind(), Some(StoreDbErrorKind::BusyOrLocked));
        assert!(err.is_busy_or_locked());
        assert!(!err.is_unavailable());
    }

    #[test]
    fn test_store_error_from_pool_closed_is_unavailable() {
        let err = StoreError::from(sqlx::Error::PoolClosed);
        assert_eq!(err.database_kind(), Some(StoreDbErrorKind::PoolClosed));
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("pool_closed"));
    }

    #[test]
    fn test_store_error_serialization_names_collection() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = StoreError::serialization(Collection::Resources, &json_err);
        assert!(err.to_string().contains("resources"));
        assert_eq!(err.database_kind(), None);
    }
}
