//! Persistent store for the offline collections.
//!
//! The store is a keyed upsert/read/delete layer over `SQLite`, one table per
//! [`Collection`]. It holds no business logic.
//!
//! # Overview
//!
//! - [`Store`] - Main interface for record operations
//! - [`Record`] - Implemented by every persisted type; names its collection and key
//! - [`Collection`] - The six independent keyspaces
//! - [`StoreError`] - Operation error types
//!
//! Keys are encoded with `serde_json`, so a composite key such as
//! `(course_id, period)` stays a structured value with the same uniqueness
//! as the tuple itself.
//!
//! # Example
//!
//! ```ignore
//! use course_offline_core::store::{Store, ResourceRecord};
//! use course_offline_core::Database;
//!
//! let store = Store::new(Database::new_in_memory().await?);
//! store.put(&record).await?;
//! let again: Option<ResourceRecord> = store.get(&record.resource_id).await?;
//! ```

mod error;
mod records;

pub use error::{StoreDbErrorKind, StoreError};
pub use records::{
    BadgeRecord, CachedCourseRecord, CourseId, CourseSnapshot, EntityId, LeaderboardEntry,
    LeaderboardPeriod, LeaderboardSnapshot, ModuleProgressDetail, ModuleSnapshot, ModuleState,
    ProgressRecord, ResourceRecord, ResourceSnapshot,
};

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::db::Database;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Independent keyspaces of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Courses,
    Progress,
    ModuleProgress,
    Badges,
    Leaderboards,
    Resources,
}

impl Collection {
    /// All collections, in migration order.
    pub const ALL: [Collection; 6] = [
        Self::Courses,
        Self::Progress,
        Self::ModuleProgress,
        Self::Badges,
        Self::Leaderboards,
        Self::Resources,
    ];

    /// Returns the table name backing this collection.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Courses => "courses",
            Self::Progress => "progress",
            Self::ModuleProgress => "module_progress",
            Self::Badges => "badges",
            Self::Leaderboards => "leaderboards",
            Self::Resources => "resources",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A JSON-serializable record stored in one collection under a primary key.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// Collection the record lives in.
    const COLLECTION: Collection;

    /// Primary key type.
    type Key: Serialize + fmt::Debug + Send + Sync;

    /// Returns this record's primary key.
    fn key(&self) -> Self::Key;
}

/// Keyed record storage backed by `SQLite`.
///
/// Every operation is atomic per record; there are no cross-collection
/// transactions. Same-key writes from unrelated flows are last-write-wins.
#[derive(Debug, Clone)]
pub struct Store {
    db: Database,
}

impl Store {
    /// Creates a store over an opened database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Inserts or replaces a record by its primary key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the record cannot be encoded,
    /// or [`StoreError::Database`] if the write fails.
    #[instrument(skip(self, record), fields(collection = %R::COLLECTION, key = ?record.key()))]
    pub async fn put<R: Record>(&self, record: &R) -> Result<()> {
        let key = encode_key::<R>(&record.key())?;
        let data = encode_record(record)?;

        sqlx::query(&upsert_sql(R::COLLECTION))
            .bind(&key)
            .bind(&data)
            .execute(self.db.pool())
            .await?;

        debug!("record stored");
        Ok(())
    }

    /// Reads one record by primary key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails, or
    /// [`StoreError::Serialization`] if the stored JSON no longer decodes.
    #[instrument(skip(self), fields(collection = %R::COLLECTION))]
    pub async fn get<R: Record>(&self, key: &R::Key) -> Result<Option<R>> {
        let key = encode_key::<R>(key)?;
        let row: Option<(String,)> = sqlx::query_as(&format!(
            "SELECT data FROM {} WHERE key = ?",
            R::COLLECTION.as_str()
        ))
        .bind(&key)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|(data,)| decode_record::<R>(&data)).transpose()
    }

    /// Reads every record of a collection in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails, or
    /// [`StoreError::Serialization`] if any stored JSON no longer decodes.
    #[instrument(skip(self), fields(collection = %R::COLLECTION))]
    pub async fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        let rows: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT data FROM {} ORDER BY rowid ASC",
            R::COLLECTION.as_str()
        ))
        .fetch_all(self.db.pool())
        .await?;

        rows.iter()
            .map(|(data,)| decode_record::<R>(data))
            .collect()
    }

    /// Deletes a record by primary key.
    ///
    /// Returns `true` if a record was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the delete fails.
    #[instrument(skip(self), fields(collection = %R::COLLECTION))]
    pub async fn delete<R: Record>(&self, key: &R::Key) -> Result<bool> {
        let key = encode_key::<R>(key)?;
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE key = ?",
            R::COLLECTION.as_str()
        ))
        .bind(&key)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts records in a collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self), fields(collection = %R::COLLECTION))]
    pub async fn count<R: Record>(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {}",
            R::COLLECTION.as_str()
        ))
        .fetch_one(self.db.pool())
        .await?;

        Ok(count)
    }

    /// Read-modify-write of a single record inside one transaction.
    ///
    /// `apply` receives the current record (if any) and returns the record to
    /// store. Readers never observe the intermediate state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyMismatch`] if `apply` returns a record with a
    /// different key, or any read/write error. Nothing is written on error.
    #[instrument(skip(self, apply), fields(collection = %R::COLLECTION))]
    pub async fn update<R, F>(&self, key: &R::Key, apply: F) -> Result<R>
    where
        R: Record,
        F: FnOnce(Option<R>) -> R + Send,
    {
        let table = R::COLLECTION.as_str();
        let encoded = encode_key::<R>(key)?;

        let mut tx = self.db.pool().begin().await?;

        // Take the write lock before reading so a concurrent writer cannot
        // slip in between the read and the upsert.
        sqlx::query(&format!("UPDATE {table} SET key = key WHERE key = ?"))
            .bind(&encoded)
            .execute(&mut *tx)
            .await?;

        let row: Option<(String,)> =
            sqlx::query_as(&format!("SELECT data FROM {table} WHERE key = ?"))
                .bind(&encoded)
                .fetch_optional(&mut *tx)
                .await?;
        let current = row.map(|(data,)| decode_record::<R>(&data)).transpose()?;

        let next = apply(current);
        let next_key = encode_key::<R>(&next.key())?;
        if next_key != encoded {
            return Err(StoreError::KeyMismatch {
                collection: R::COLLECTION,
                expected: encoded,
                actual: next_key,
            });
        }

        let data = encode_record(&next)?;
        sqlx::query(&upsert_sql(R::COLLECTION))
            .bind(&encoded)
            .bind(&data)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(next)
    }
}

fn upsert_sql(collection: Collection) -> String {
    format!(
        r"INSERT INTO {} (key, data, updated_at)
          VALUES (?, ?, datetime('now'))
          ON CONFLICT(key) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        collection.as_str()
    )
}

fn encode_key<R: Record>(key: &R::Key) -> Result<String> {
    serde_json::to_string(key).map_err(|e| StoreError::serialization(R::COLLECTION, &e))
}

fn encode_record<R: Record>(record: &R) -> Result<String> {
    serde_json::to_string(record).map_err(|e| StoreError::serialization(R::COLLECTION, &e))
}

fn decode_record<R: Record>(data: &str) -> Result<R> {
    serde_json::from_str(data).map_err(|e| StoreError::serialization(R::COLLECTION, &e))
}
