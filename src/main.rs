//! CLI entry point for course-offline.

use anyhow::{Context, Result};
use clap::Parser;
use course_offline_core::{OfflineConfig, load_config_file, load_default_config};
use tracing::{debug, info};

mod cli;
mod commands;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = resolve_config(&args)?;
    debug!(?config, "configuration resolved");

    match &args.command {
        Command::Download(download) => {
            commands::run_download_command(download, &config, args.quiet).await
        }
        Command::Status(status) => commands::run_status_command(status, &config).await,
        Command::CompleteModule(complete) => {
            commands::run_complete_module_command(complete, &config, args.quiet).await
        }
        Command::Sync(sync) => commands::run_sync_command(sync, &config, args.quiet).await,
        Command::Watch(watch) => commands::run_watch_command(watch, &config).await,
    }
}

fn resolve_config(args: &Args) -> Result<OfflineConfig> {
    let mut config = if let Some(path) = &args.config {
        load_config_file(path)
            .with_context(|| format!("Failed to load config file '{}'", path.display()))?
    } else {
        let loaded = load_default_config().context("Failed to load default config file")?;
        if loaded.loaded_from_file
            && let Some(path) = &loaded.path
        {
            info!(path = %path.display(), "loaded config file");
        }
        loaded.config
    };

    if let Some(database) = &args.database {
        config.database_path.clone_from(database);
    }
    Ok(config)
}
