//! Sync and watch command handlers.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use course_offline_core::{
    ConnectivityProbe, HttpBackend, HttpProbe, NetworkMonitor, OfflineConfig, SyncReconciler,
    spawn_reconnect_sync,
};
use tracing::{info, warn};
use url::Url;

use super::open_store;
use crate::cli::{SyncArgs, WatchArgs};

fn backend(endpoint: Option<&Url>, config: &OfflineConfig) -> Result<HttpBackend> {
    let endpoint = endpoint
        .or(config.sync_endpoint.as_ref())
        .cloned()
        .ok_or_else(|| {
            anyhow!(
                "No sync endpoint configured\n  Suggestion: Pass --endpoint or set `sync_endpoint` in the config file"
            )
        })?;
    let mut backend = HttpBackend::new(endpoint, config.http_timeouts)
        .context("Failed to build HTTP client for progress sync")?;
    if let Some(token) = &config.api_token {
        backend = backend.with_api_token(token.clone());
    }
    Ok(backend)
}

pub async fn run_sync_command(args: &SyncArgs, config: &OfflineConfig, quiet: bool) -> Result<()> {
    let backend = backend(args.endpoint.as_ref(), config)?;
    let store = open_store(config).await?;
    let reconciler = SyncReconciler::new(store.clone(), Arc::new(backend));

    let result = reconciler.reconcile().await;
    store.database().close().await;
    let report = result.context("Progress sync failed")?;

    if !quiet {
        if report.submitted() {
            println!(
                "Synced {} progress records and {} module progress entries.",
                report.records, report.module_progress
            );
        } else {
            println!("No local progress to sync.");
        }
    }
    Ok(())
}

pub async fn run_watch_command(args: &WatchArgs, config: &OfflineConfig) -> Result<()> {
    let backend = backend(args.endpoint.as_ref(), config)?;
    let probe_url = args
        .probe_url
        .as_ref()
        .or(config.probe_url.as_ref())
        .cloned()
        .ok_or_else(|| {
            anyhow!(
                "No probe URL configured\n  Suggestion: Pass --probe-url or set `probe_url` in the config file"
            )
        })?;
    let interval = args
        .interval_secs
        .map_or(config.probe_interval, std::time::Duration::from_secs);

    let probe: Arc<dyn ConnectivityProbe> = Arc::new(
        HttpProbe::new(probe_url, config.http_timeouts)
            .context("Failed to build HTTP client for connectivity probe")?,
    );
    let store = open_store(config).await?;
    let reconciler = Arc::new(SyncReconciler::new(store.clone(), Arc::new(backend)));

    let monitor = NetworkMonitor::from_probe(probe.as_ref()).await;
    let mut notices = monitor.notices();
    let sync_task = spawn_reconnect_sync(&monitor, reconciler);
    let poll_task = monitor.spawn_polling(probe, interval);
    info!(state = %monitor.current(), interval_secs = interval.as_secs(), "watching connectivity");

    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Ok(notice) => println!("{}", notice.message()),
                Err(error) => warn!(error = %error, "notice stream interrupted"),
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    poll_task.abort();
    sync_task.abort();
    store.database().close().await;
    info!("watch stopped");
    Ok(())
}
