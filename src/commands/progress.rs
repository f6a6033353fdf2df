//! Complete-module command handler.

use anyhow::{Result, bail};
use course_offline_core::{LearnerProgress, OfflineConfig};

use super::{load_course, open_store};
use crate::cli::CompleteModuleArgs;

pub async fn run_complete_module_command(
    args: &CompleteModuleArgs,
    config: &OfflineConfig,
    quiet: bool,
) -> Result<()> {
    let course = load_course(&args.course)?;
    if course.module(args.module).is_none() {
        bail!(
            "Module {} is not part of course {}\n  Suggestion: Check the module id in '{}'",
            args.module,
            course.id,
            args.course.display()
        );
    }

    let store = open_store(config).await?;
    let progress = LearnerProgress::new(store.clone());
    let detail = progress
        .set_module_completed(&course, args.module, !args.undo)
        .await?;
    store.database().close().await;

    if !quiet {
        println!(
            "course {}: {}/{} modules completed ({:.0}%)",
            course.id,
            detail.completed_count(),
            detail.modules.len(),
            detail.completion_fraction * 100.0
        );
    }
    Ok(())
}
