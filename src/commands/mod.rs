//! CLI command handlers.

mod download;
mod progress;
mod status;
mod sync;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use course_offline_core::{CourseSnapshot, Database, OfflineConfig, Store};
use tracing::debug;

pub use download::run_download_command;
pub use progress::run_complete_module_command;
pub use status::run_status_command;
pub use sync::{run_sync_command, run_watch_command};

/// Opens the configured database and wraps it in a store.
pub(crate) async fn open_store(config: &OfflineConfig) -> Result<Store> {
    let path = &config.database_path;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory '{}'", parent.display()))?;
    }
    let db = Database::new_with_options(path, config.database)
        .await
        .with_context(|| format!("Failed to open database '{}'", path.display()))?;
    debug!(path = %path.display(), "database opened");
    Ok(Store::new(db))
}

/// Reads a course snapshot from a JSON file.
pub(crate) fn load_course(path: &Path) -> Result<CourseSnapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read course file '{}'", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse course file '{}'", path.display()))
}
