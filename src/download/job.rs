//! Download job types and status definitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::size::SizeEstimate;
use crate::store::{CourseId, EntityId};

/// Granularity at which offline availability is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Course,
    Module,
    Resource,
}

impl JobKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Course => "course",
            Self::Module => "module",
            Self::Resource => "resource",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "course" => Ok(Self::Course),
            "module" => Ok(Self::Module),
            "resource" => Ok(Self::Resource),
            _ => Err(format!("invalid job kind: {s}")),
        }
    }
}

/// Identity of a download job.
///
/// Course jobs have no parent; module and resource jobs live under their
/// course. Each kind is its own keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub kind: JobKind,
    pub parent_id: Option<CourseId>,
    pub entity_id: EntityId,
}

impl JobKey {
    #[must_use]
    pub fn course(course_id: CourseId) -> Self {
        Self {
            kind: JobKind::Course,
            parent_id: None,
            entity_id: course_id,
        }
    }

    #[must_use]
    pub fn module(course_id: CourseId, module_id: EntityId) -> Self {
        Self {
            kind: JobKind::Module,
            parent_id: Some(course_id),
            entity_id: module_id,
        }
    }

    #[must_use]
    pub fn resource(course_id: CourseId, resource_id: EntityId) -> Self {
        Self {
            kind: JobKind::Resource,
            parent_id: Some(course_id),
            entity_id: resource_id,
        }
    }

    /// Course this job belongs to (itself for course jobs).
    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.parent_id.unwrap_or(self.entity_id)
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent_id {
            Some(parent) => write!(f, "{} {} of course {}", self.kind, self.entity_id, parent),
            None => write!(f, "{} {}", self.kind, self.entity_id),
        }
    }
}

/// Lifecycle state of a download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// No job exists for the key.
    Idle,
    /// Progress is being driven.
    Downloading,
    /// Artifact committed to the store.
    Completed,
    /// Transfer or commit failed; may be requested again.
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether a new request may (re)create a job in this state.
    #[must_use]
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Failed)
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the UI sees for a key: status plus percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub progress: u8,
}

impl JobSnapshot {
    /// State reported for keys with no job.
    pub const IDLE: Self = Self {
        status: JobStatus::Idle,
        progress: 0,
    };

    /// State reported for artifacts found in the store with no live job.
    pub const CACHED: Self = Self {
        status: JobStatus::Completed,
        progress: 100,
    };
}

impl fmt::Display for JobSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}%)", self.status, self.progress)
    }
}

/// A tracked download. Owned by the orchestrator's job table.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub key: JobKey,
    pub status: JobStatus,
    pub progress: u8,
    pub started_at: DateTime<Utc>,
    pub size_estimate: SizeEstimate,
    /// Cause of the last failure, if `failed`.
    pub last_error: Option<String>,
}

impl DownloadJob {
    pub(crate) fn start(key: JobKey, size_estimate: SizeEstimate) -> Self {
        Self {
            key,
            status: JobStatus::Downloading,
            progress: 0,
            started_at: Utc::now(),
            size_estimate,
            last_error: None,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            status: self.status,
            progress: self.progress,
        }
    }

    /// Raises progress; never lowers it and never reaches 100 here.
    ///
    /// Returns `true` if the observable progress changed.
    pub(crate) fn advance(&mut self, next: u8) -> bool {
        if self.status != JobStatus::Downloading {
            return false;
        }
        let next = next.min(99);
        if next <= self.progress {
            return false;
        }
        self.progress = next;
        true
    }

    pub(crate) fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.last_error = None;
    }

    /// Progress stays frozen at its last value.
    pub(crate) fn fail(&mut self, reason: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.last_error = Some(reason.into());
    }
}

/// Broadcast whenever a job's observable state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobEvent {
    pub key: JobKey,
    pub snapshot: JobSnapshot,
}
