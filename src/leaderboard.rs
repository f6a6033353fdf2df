//! Read-through cache of leaderboard snapshots.
//!
//! Rankings are computed elsewhere. This cache only decides whether the
//! stored `(course, period)` snapshot is young enough to serve, and falls
//! back to a stale copy when a refresh fails.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::store::{
    CourseId, LeaderboardEntry, LeaderboardPeriod, LeaderboardSnapshot, Store, StoreError,
};

/// How a returned snapshot was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Served from the store within `max_age`.
    Cached,
    /// Fetched just now and stored.
    Refreshed,
    /// Fetch failed; an older stored copy was served.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardView {
    pub snapshot: LeaderboardSnapshot,
    pub freshness: Freshness,
}

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error("leaderboard cache unavailable: {0}")]
    Store(#[from] StoreError),

    /// Fetch failed and nothing was cached to fall back on.
    #[error("failed to fetch {period} leaderboard for course {course_id}: {message}")]
    Fetch {
        course_id: CourseId,
        period: LeaderboardPeriod,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct LeaderboardCache {
    store: Store,
}

impl LeaderboardCache {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Returns the stored snapshot if younger than `max_age`, otherwise
    /// calls `fetch` and stores the result.
    ///
    /// # Errors
    ///
    /// Returns [`LeaderboardError::Fetch`] if `fetch` fails with no stored
    /// snapshot to fall back on, or [`LeaderboardError::Store`] if the store
    /// cannot be read or written.
    #[instrument(skip(self, fetch))]
    pub async fn get_or_refresh<F, Fut, E>(
        &self,
        course_id: CourseId,
        period: LeaderboardPeriod,
        max_age: Duration,
        fetch: F,
    ) -> Result<LeaderboardView, LeaderboardError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Vec<LeaderboardEntry>, E>> + Send,
        E: Display,
    {
        let cached: Option<LeaderboardSnapshot> = self.store.get(&(course_id, period)).await?;

        if let Some(snapshot) = &cached {
            let age = Utc::now()
                .signed_duration_since(snapshot.timestamp)
                .to_std()
                .unwrap_or(Duration::ZERO);
            if age <= max_age {
                debug!(age_secs = age.as_secs(), "serving cached leaderboard");
                return Ok(LeaderboardView {
                    snapshot: snapshot.clone(),
                    freshness: Freshness::Cached,
                });
            }
        }

        match fetch().await {
            Ok(entries) => {
                let snapshot = LeaderboardSnapshot {
                    course_id,
                    period,
                    entries,
                    timestamp: Utc::now(),
                };
                self.store.put(&snapshot).await?;
                debug!(entries = snapshot.entries.len(), "leaderboard refreshed");
                Ok(LeaderboardView {
                    snapshot,
                    freshness: Freshness::Refreshed,
                })
            }
            Err(error) => match cached {
                Some(snapshot) => {
                    warn!(error = %error, "leaderboard refresh failed, serving stale copy");
                    Ok(LeaderboardView {
                        snapshot,
                        freshness: Freshness::Stale,
                    })
                }
                None => Err(LeaderboardError::Fetch {
                    course_id,
                    period,
                    message: error.to_string(),
                }),
            },
        }
    }

    /// Stored snapshot regardless of age.
    ///
    /// # Errors
    ///
    /// Returns the store error if the lookup fails.
    pub async fn cached(
        &self,
        course_id: CourseId,
        period: LeaderboardPeriod,
    ) -> Result<Option<LeaderboardSnapshot>, StoreError> {
        self.store.get(&(course_id, period)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Database;

    fn entries(score: i64) -> Vec<LeaderboardEntry> {
        vec![LeaderboardEntry {
            user_id: "u-1".to_string(),
            display_name: "Ada".to_string(),
            score,
            rank: 1,
        }]
    }

    async fn cache() -> LeaderboardCache {
        LeaderboardCache::new(Store::new(Database::new_in_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn test_miss_fetches_and_stores() {
        let cache = cache().await;
        let view = cache
            .get_or_refresh(1, LeaderboardPeriod::Weekly, Duration::from_secs(60), || async {
                Ok::<_, String>(entries(10))
            })
            .await
            .unwrap();

        assert_eq!(view.freshness, Freshness::Refreshed);
        assert!(cache.cached(1, LeaderboardPeriod::Weekly).await.unwrap().is_some());
        assert!(cache.cached(1, LeaderboardPeriod::Monthly).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fresh_snapshot_skips_fetch() {
        let cache = cache().await;
        cache
            .get_or_refresh(1, LeaderboardPeriod::Weekly, Duration::from_secs(60), || async {
                Ok::<_, String>(entries(10))
            })
            .await
            .unwrap();

        let view = cache
            .get_or_refresh(1, LeaderboardPeriod::Weekly, Duration::from_secs(60), || async {
                Err::<Vec<LeaderboardEntry>, _>("should not be called".to_string())
            })
            .await
            .unwrap();

        assert_eq!(view.freshness, Freshness::Cached);
        assert_eq!(view.snapshot.entries[0].score, 10);
    }

    #[tokio::test]
    async fn test_stale_snapshot_refreshes() {
        let cache = cache().await;
        cache
            .get_or_refresh(1, LeaderboardPeriod::AllTime, Duration::ZERO, || async {
                Ok::<_, String>(entries(10))
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let view = cache
            .get_or_refresh(1, LeaderboardPeriod::AllTime, Duration::ZERO, || async {
                Ok::<_, String>(entries(20))
            })
            .await
            .unwrap();

        assert_eq!(view.freshness, Freshness::Refreshed);
        assert_eq!(view.snapshot.entries[0].score, 20);
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_stale_copy() {
        let cache = cache().await;
        cache
            .get_or_refresh(2, LeaderboardPeriod::Monthly, Duration::ZERO, || async {
                Ok::<_, String>(entries(5))
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let view = cache
            .get_or_refresh(2, LeaderboardPeriod::Monthly, Duration::ZERO, || async {
                Err::<Vec<LeaderboardEntry>, _>("offline".to_string())
            })
            .await
            .unwrap();

        assert_eq!(view.freshness, Freshness::Stale);
        assert_eq!(view.snapshot.entries[0].score, 5);
    }

    #[tokio::test]
    async fn test_failed_fetch_without_cache_errors() {
        let cache = cache().await;
        let error = cache
            .get_or_refresh(3, LeaderboardPeriod::Weekly, Duration::from_secs(60), || async {
                Err::<Vec<LeaderboardEntry>, _>("offline".to_string())
            })
            .await
            .unwrap_err();

        assert!(matches!(error, LeaderboardError::Fetch { course_id: 3, .. }));
    }
}
