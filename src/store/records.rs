//! Record types held in the offline collections.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Collection, Record};

/// Identifier of any backend entity (course, module, resource, enrollment, badge).
pub type EntityId = i64;

/// Identifier of a course.
pub type CourseId = EntityId;

/// A module entry inside a [`CourseSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    pub id: EntityId,
    pub title: String,
    /// Display order within the course.
    #[serde(default)]
    pub position: u32,
}

/// A downloadable resource attached to a course (optionally to one of its modules).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub id: EntityId,
    #[serde(default)]
    pub module_id: Option<EntityId>,
    pub title: String,
    pub url: String,
    /// MIME type reported by the backend, e.g. `application/pdf`.
    #[serde(default)]
    pub media_type: Option<String>,
    /// Size reported by the backend when known. Only used for estimates.
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

/// Denormalized course as fetched from the backend.
///
/// This is the "course context" a download request carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSnapshot {
    pub id: CourseId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub modules: Vec<ModuleSnapshot>,
    #[serde(default)]
    pub resources: Vec<ResourceSnapshot>,
}

impl CourseSnapshot {
    #[must_use]
    pub fn module(&self, module_id: EntityId) -> Option<&ModuleSnapshot> {
        self.modules.iter().find(|m| m.id == module_id)
    }

    #[must_use]
    pub fn resource(&self, resource_id: EntityId) -> Option<&ResourceSnapshot> {
        self.resources.iter().find(|r| r.id == resource_id)
    }
}

/// A course snapshot committed once its course-level download completes.
///
/// Presence in the `courses` collection means the course is usable offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedCourseRecord {
    pub course: CourseSnapshot,
    pub cached_at: DateTime<Utc>,
}

impl Record for CachedCourseRecord {
    const COLLECTION: Collection = Collection::Courses;
    type Key = CourseId;

    fn key(&self) -> Self::Key {
        self.course.id
    }
}

/// Aggregate progress for one enrollment; the record pushed upstream on reconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub enrollment_id: EntityId,
    pub course_id: CourseId,
    /// Fraction of the course completed, in `[0, 1]`.
    pub completion_fraction: f64,
    pub last_updated: DateTime<Utc>,
}

impl Record for ProgressRecord {
    const COLLECTION: Collection = Collection::Progress;
    type Key = EntityId;

    fn key(&self) -> Self::Key {
        self.enrollment_id
    }
}

/// Per-module flags inside a [`ModuleProgressDetail`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleState {
    pub module_id: EntityId,
    /// Learner finished the module.
    pub completed: bool,
    /// Module-level download finished; does not count towards completion.
    #[serde(default)]
    pub available_offline: bool,
}

/// Module-level completion for one course.
///
/// `completion_fraction` is always `completed / total`; every mutator
/// recomputes it before returning so a stored record is never inconsistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleProgressDetail {
    pub course_id: CourseId,
    pub modules: Vec<ModuleState>,
    pub completion_fraction: f64,
    pub last_updated: DateTime<Utc>,
}

impl ModuleProgressDetail {
    /// Builds an all-incomplete detail from the course's module list.
    #[must_use]
    pub fn for_course(course: &CourseSnapshot) -> Self {
        let mut modules: Vec<_> = course.modules.iter().collect();
        modules.sort_by_key(|m| m.position);
        Self {
            course_id: course.id,
            modules: modules
                .into_iter()
                .map(|m| ModuleState {
                    module_id: m.id,
                    completed: false,
                    available_offline: false,
                })
                .collect(),
            completion_fraction: 0.0,
            last_updated: Utc::now(),
        }
    }

    /// Sets a module's completion flag and recomputes the fraction.
    ///
    /// Modules missing from the list (course gained a module since the
    /// detail was created) are appended.
    pub fn set_completed(&mut self, module_id: EntityId, completed: bool) {
        self.module_entry(module_id).completed = completed;
        self.recompute();
    }

    /// Marks a module as downloaded for offline use.
    pub fn set_available_offline(&mut self, module_id: EntityId, available: bool) {
        self.module_entry(module_id).available_offline = available;
        self.recompute();
    }

    #[must_use]
    pub fn module(&self, module_id: EntityId) -> Option<&ModuleState> {
        self.modules.iter().find(|m| m.module_id == module_id)
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.modules.iter().filter(|m| m.completed).count()
    }

    fn module_entry(&mut self, module_id: EntityId) -> &mut ModuleState {
        let index = match self.modules.iter().position(|m| m.module_id == module_id) {
            Some(index) => index,
            None => {
                self.modules.push(ModuleState {
                    module_id,
                    completed: false,
                    available_offline: false,
                });
                self.modules.len() - 1
            }
        };
        &mut self.modules[index]
    }

    #[allow(clippy::cast_precision_loss)]
    fn recompute(&mut self) {
        let total = self.modules.len();
        self.completion_fraction = if total == 0 {
            0.0
        } else {
            self.completed_count() as f64 / total as f64
        };
        self.last_updated = Utc::now();
    }
}

impl Record for ModuleProgressDetail {
    const COLLECTION: Collection = Collection::ModuleProgress;
    type Key = CourseId;

    fn key(&self) -> Self::Key {
        self.course_id
    }
}

/// A downloaded resource. Re-downloading replaces the record.
///
/// Keyed by `resource_id` alone: resource ids are global across courses.
/// A resource shared by two courses holds one record, owned by whichever
/// course downloaded it last, and is only available offline under that
/// course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub resource_id: EntityId,
    pub course_id: CourseId,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub media_type: Option<String>,
    pub downloaded_at: DateTime<Utc>,
}

impl ResourceRecord {
    #[must_use]
    pub fn from_snapshot(course_id: CourseId, resource: &ResourceSnapshot) -> Self {
        Self {
            resource_id: resource.id,
            course_id,
            title: resource.title.clone(),
            url: resource.url.clone(),
            media_type: resource.media_type.clone(),
            downloaded_at: Utc::now(),
        }
    }
}

impl Record for ResourceRecord {
    const COLLECTION: Collection = Collection::Resources;
    type Key = EntityId;

    fn key(&self) -> Self::Key {
        self.resource_id
    }
}

/// An earned badge, cached for offline display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeRecord {
    pub badge_id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub earned_at: DateTime<Utc>,
}

impl Record for BadgeRecord {
    const COLLECTION: Collection = Collection::Badges;
    type Key = EntityId;

    fn key(&self) -> Self::Key {
        self.badge_id
    }
}

/// Ranking window of a leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardPeriod {
    Weekly,
    Monthly,
    AllTime,
}

impl LeaderboardPeriod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::AllTime => "all_time",
        }
    }
}

impl fmt::Display for LeaderboardPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LeaderboardPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "all_time" => Ok(Self::AllTime),
            _ => Err(format!("invalid leaderboard period: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub display_name: String,
    pub score: i64,
    pub rank: u32,
}

/// Cached ranking for one `(course, period)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub course_id: CourseId,
    pub period: LeaderboardPeriod,
    pub entries: Vec<LeaderboardEntry>,
    pub timestamp: DateTime<Utc>,
}

impl Record for LeaderboardSnapshot {
    const COLLECTION: Collection = Collection::Leaderboards;
    type Key = (CourseId, LeaderboardPeriod);

    fn key(&self) -> Self::Key {
        (self.course_id, self.period)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn course_with_modules(count: i64) -> CourseSnapshot {
        CourseSnapshot {
            id: 1,
            title: "Rust".to_string(),
            description: None,
            modules: (1..=count)
                .map(|id| ModuleSnapshot {
                    id,
                    title: format!("Module {id}"),
                    position: u32::try_from(count - id).unwrap(),
                })
                .collect(),
            resources: Vec::new(),
        }
    }

    #[test]
    fn test_module_progress_for_course_orders_by_position() {
        let detail = ModuleProgressDetail::for_course(&course_with_modules(3));
        let ids: Vec<_> = detail.modules.iter().map(|m| m.module_id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(detail.completion_fraction, 0.0);
    }

    #[test]
    fn test_module_progress_set_completed_recomputes_fraction() {
        let mut detail = ModuleProgressDetail::for_course(&course_with_modules(4));

        detail.set_completed(1, true);
        assert_eq!(detail.completion_fraction, 0.25);

        detail.set_completed(2, true);
        assert_eq!(detail.completion_fraction, 0.5);

        detail.set_completed(1, false);
        assert_eq!(detail.completion_fraction, 0.25);
    }

    #[test]
    fn test_module_progress_unknown_module_is_appended() {
        let mut detail = ModuleProgressDetail::for_course(&course_with_modules(1));
        detail.set_completed(99, true);

        assert_eq!(detail.modules.len(), 2);
        assert_eq!(detail.completion_fraction, 0.5);
    }

    #[test]
    fn test_module_progress_available_offline_does_not_count_as_completion() {
        let mut detail = ModuleProgressDetail::for_course(&course_with_modules(2));
        detail.set_available_offline(1, true);

        assert!(detail.module(1).unwrap().available_offline);
        assert_eq!(detail.completion_fraction, 0.0);
    }

    #[test]
    fn test_module_progress_empty_course_has_zero_fraction() {
        let mut detail = ModuleProgressDetail::for_course(&course_with_modules(0));
        detail.recompute();
        assert_eq!(detail.completion_fraction, 0.0);
    }

    #[test]
    fn test_leaderboard_period_from_str() {
        assert_eq!(
            "all_time".parse::<LeaderboardPeriod>().unwrap(),
            LeaderboardPeriod::AllTime
        );
        assert!("daily".parse::<LeaderboardPeriod>().is_err());
    }

    #[test]
    fn test_leaderboard_period_serde_matches_as_str() {
        let json = serde_json::to_string(&LeaderboardPeriod::AllTime).unwrap();
        assert_eq!(json, "\"all_time\"");
    }

    #[test]
    fn test_course_snapshot_defaults_missing_lists() {
        let course: CourseSnapshot =
            serde_json::from_str(r#"{"id": 5, "title": "Intro"}"#).unwrap();
        assert!(course.modules.is_empty());
        assert!(course.resources.is_empty());
    }
}
