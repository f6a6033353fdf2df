//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

/// Offline course cache and progress sync.
///
/// Downloads courses, modules and resources for offline use, records
/// learner progress locally and syncs it when the network returns.
#[derive(Parser, Debug)]
#[command(name = "course-offline")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/course-offline/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file (overrides config)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download a course, module or resource for offline use
    Download(DownloadArgs),

    /// Show what is available offline
    Status(StatusArgs),

    /// Mark a module completed (or not) and update course progress
    CompleteModule(CompleteModuleArgs),

    /// Send local progress to the sync endpoint once
    Sync(SyncArgs),

    /// Watch connectivity and sync progress on every reconnect
    Watch(WatchArgs),
}

#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    /// Course snapshot JSON file
    #[arg(long)]
    pub course: PathBuf,

    /// Download one module of the course
    #[arg(long, conflicts_with = "resource")]
    pub module: Option<i64>,

    /// Download one resource of the course
    #[arg(long)]
    pub resource: Option<i64>,

    /// Simulated progress tick in milliseconds (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub tick_ms: Option<u64>,

    /// Simulated percent per tick (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub step: Option<u8>,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Course id to inspect; lists all cached courses when omitted
    #[arg(long)]
    pub course_id: Option<i64>,

    #[arg(long, requires = "course_id", conflicts_with = "resource")]
    pub module: Option<i64>,

    #[arg(long, requires = "course_id")]
    pub resource: Option<i64>,
}

#[derive(clap::Args, Debug)]
pub struct CompleteModuleArgs {
    /// Course snapshot JSON file
    #[arg(long)]
    pub course: PathBuf,

    #[arg(long)]
    pub module: i64,

    /// Mark the module not completed instead
    #[arg(long)]
    pub undo: bool,
}

#[derive(clap::Args, Debug)]
pub struct SyncArgs {
    /// Progress sync endpoint (overrides config)
    #[arg(long)]
    pub endpoint: Option<Url>,
}

#[derive(clap::Args, Debug)]
pub struct WatchArgs {
    /// Progress sync endpoint (overrides config)
    #[arg(long)]
    pub endpoint: Option<Url>,

    /// URL probed for connectivity (overrides config)
    #[arg(long)]
    pub probe_url: Option<Url>,

    /// Seconds between probes (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub interval_secs: Option<u64>,
}
