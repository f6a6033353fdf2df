//! Advisory download size estimates.
//!
//! Estimates come from backend-reported resource sizes where present and
//! fixed per-item guesses otherwise. They are display hints only and never
//! gate a download.

use std::fmt;

use super::job::JobKind;
use crate::store::{CourseSnapshot, EntityId};

/// Course metadata (titles, descriptions, module list).
const COURSE_METADATA_BYTES: u64 = 256 * 1024;

/// Guess for one module's lesson content.
const MODULE_CONTENT_BYTES: u64 = 8 * 1024 * 1024;

/// Guess for a resource with no reported size.
const RESOURCE_FALLBACK_BYTES: u64 = 2 * 1024 * 1024;

const BYTES_PER_KB: u64 = 1024;
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Heuristic size of a pending download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SizeEstimate {
    bytes: u64,
}

impl SizeEstimate {
    #[must_use]
    pub fn from_bytes(bytes: u64) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Button label such as `Download Course (42 MB)`.
    #[must_use]
    pub fn label(&self, kind: JobKind) -> String {
        let noun = match kind {
            JobKind::Course => "Course",
            JobKind::Module => "Module",
            JobKind::Resource => "Resource",
        };
        format!("Download {noun} ({self})")
    }
}

impl fmt::Display for SizeEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes < BYTES_PER_MB {
            let kb = self.bytes.div_ceil(BYTES_PER_KB);
            write!(f, "{kb} KB")
        } else {
            let mb = (self.bytes + BYTES_PER_MB / 2) / BYTES_PER_MB;
            write!(f, "{mb} MB")
        }
    }
}

/// Estimates the size of downloading `target_id` of the given kind.
///
/// Unknown targets estimate to zero rather than failing.
#[must_use]
pub fn estimate_size(kind: JobKind, course: &CourseSnapshot, target_id: EntityId) -> SizeEstimate {
    let bytes = match kind {
        JobKind::Course => {
            let modules = u64::try_from(course.modules.len()).unwrap_or(u64::MAX);
            let resources: u64 = course.resources.iter().map(resource_bytes).sum();
            COURSE_METADATA_BYTES
                .saturating_add(modules.saturating_mul(MODULE_CONTENT_BYTES))
                .saturating_add(resources)
        }
        JobKind::Module => {
            if course.module(target_id).is_none() {
                0
            } else {
                let attached: u64 = course
                    .resources
                    .iter()
                    .filter(|r| r.module_id == Some(target_id))
                    .map(resource_bytes)
                    .sum();
                MODULE_CONTENT_BYTES.saturating_add(attached)
            }
        }
        JobKind::Resource => course.resource(target_id).map_or(0, resource_bytes),
    };
    SizeEstimate::from_bytes(bytes)
}

fn resource_bytes(resource: &crate::store::ResourceSnapshot) -> u64 {
    resource.size_bytes.unwrap_or(RESOURCE_FALLBACK_BYTES)
}
