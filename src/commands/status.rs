//! Status command handler: report what is cached for offline use.

use anyhow::Result;
use course_offline_core::{CacheQuery, DownloadOrchestrator, JobKey, OfflineConfig};

use super::open_store;
use crate::cli::StatusArgs;

pub async fn run_status_command(args: &StatusArgs, config: &OfflineConfig) -> Result<()> {
    let store = open_store(config).await?;
    let query = CacheQuery::new(
        store.clone(),
        DownloadOrchestrator::with_simulated_progress(store.clone()),
    );

    let Some(course_id) = args.course_id else {
        let courses = query.cached_courses().await?;
        if courses.is_empty() {
            println!("No courses cached.");
        }
        for record in &courses {
            println!(
                "course {}\t{}\tcached {}",
                record.course.id,
                record.course.title,
                record.cached_at.format("%Y-%m-%d %H:%M")
            );
        }
        store.database().close().await;
        return Ok(());
    };

    let key = match (args.module, args.resource) {
        (Some(module_id), _) => JobKey::module(course_id, module_id),
        (None, Some(resource_id)) => JobKey::resource(course_id, resource_id),
        (None, None) => JobKey::course(course_id),
    };
    let progress = query.get_progress(&key).await?;
    println!("{key}: {progress}");

    if args.module.is_none() && args.resource.is_none() {
        if let Some(detail) = query.module_progress(course_id).await? {
            println!(
                "modules completed: {}/{} ({:.0}%)",
                detail.completed_count(),
                detail.modules.len(),
                detail.completion_fraction * 100.0
            );
        }
        let resources = query.downloaded_resources(course_id).await?;
        if !resources.is_empty() {
            println!("resources downloaded: {}", resources.len());
        }
    }

    store.database().close().await;
    Ok(())
}
