//! Download command handler: run one download job to completion.

use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use course_offline_core::{
    DownloadOrchestrator, DownloadRequest, JobEvent, JobKey, JobSnapshot, JobStatus,
    OfflineConfig, SimulatedProgress,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;
use tracing::info;

use super::{load_course, open_store};
use crate::cli::DownloadArgs;

pub async fn run_download_command(
    args: &DownloadArgs,
    config: &OfflineConfig,
    quiet: bool,
) -> Result<()> {
    let course = Arc::new(load_course(&args.course)?);
    let request = match (args.module, args.resource) {
        (Some(module_id), _) => DownloadRequest::module(Arc::clone(&course), module_id),
        (None, Some(resource_id)) => DownloadRequest::resource(Arc::clone(&course), resource_id),
        (None, None) => DownloadRequest::course(Arc::clone(&course)),
    };
    let key = request.key();
    let label = request.size_estimate().label(request.kind());

    let mut source = config.progress_source();
    if args.tick_ms.is_some() || args.step.is_some() {
        source = SimulatedProgress::new(
            args.tick_ms.map_or(source.tick(), Duration::from_millis),
            args.step.unwrap_or(source.step()),
        )
        .with_jitter(config.progress_jitter);
    }

    let store = open_store(config).await?;
    let orchestrator = DownloadOrchestrator::new(store.clone(), Arc::new(source));
    let events = orchestrator.subscribe();

    info!(%key, "{label}");
    orchestrator.request_download(request)?;

    let bar = progress_bar(!quiet && io::stderr().is_terminal(), &label);
    let done = follow(&orchestrator, events, &key, bar.as_ref()).await;
    store.database().close().await;

    match done.status {
        JobStatus::Completed => {
            if !quiet {
                println!("{key} is available offline");
            }
            Ok(())
        }
        _ => {
            let reason = orchestrator
                .job(&key)
                .and_then(|job| job.last_error)
                .unwrap_or_else(|| done.to_string());
            bail!("Download of {key} failed: {reason}")
        }
    }
}

fn progress_bar(enabled: bool, label: &str) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(label.to_string());
    Some(bar)
}

async fn follow(
    orchestrator: &DownloadOrchestrator,
    mut events: broadcast::Receiver<JobEvent>,
    key: &JobKey,
    bar: Option<&ProgressBar>,
) -> JobSnapshot {
    loop {
        let snapshot = match events.recv().await {
            Ok(event) if event.key == *key => event.snapshot,
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => orchestrator.snapshot(key),
            Err(broadcast::error::RecvError::Closed) => return orchestrator.snapshot(key),
        };
        if let Some(bar) = bar {
            bar.set_position(u64::from(snapshot.progress));
        }
        if snapshot.status.is_terminal() {
            if let Some(bar) = bar {
                bar.finish_and_clear();
            }
            return snapshot;
        }
    }
}
