//! Configuration loading.
//!
//! Settings come from a TOML file at the default path (see
//! [`resolve_default_config_path`]); every key is optional. The CLI applies
//! its own flags on top of the resolved [`OfflineConfig`].

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::db::{DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_MAX_CONNECTIONS, DatabaseOptions};
use crate::download::{DEFAULT_STEP, DEFAULT_TICK, SimulatedProgress};
use crate::http::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, HttpTimeouts};

/// Directory name under the config home.
const APP_DIR: &str = "course-offline";

/// Default database file name, relative to the working directory.
pub const DEFAULT_DATABASE_FILE: &str = "course-offline.db";

/// Default connectivity polling interval.
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;

/// Errors from reading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config value for `{field}`: {value}. Expected {expected}")]
    Invalid {
        field: &'static str,
        value: String,
        expected: String,
    },
}

/// Raw file contents. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// SQLite database file.
    pub database_path: Option<PathBuf>,
    /// Simulated progress tick in milliseconds.
    pub tick_interval_ms: Option<u64>,
    /// Simulated percent per tick (1..=100).
    pub progress_step: Option<u8>,
    /// Extra random percent per tick (0..=50).
    pub progress_jitter: Option<u8>,
    /// URL probed for connectivity.
    pub probe_url: Option<String>,
    pub probe_interval_secs: Option<u64>,
    /// Progress sync endpoint.
    pub sync_endpoint: Option<String>,
    pub api_token: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    /// Database pool max connections (1..=20).
    pub db_max_connections: Option<u32>,
    /// Database busy timeout in milliseconds.
    pub db_busy_timeout_ms: Option<u32>,
}

impl FileConfig {
    /// Parses TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown keys, and
    /// [`ConfigError::Invalid`] on out-of-range values.
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("tick_interval_ms", self.tick_interval_ms, 0..=60_000)?;
        check_range("progress_step", self.progress_step, 1..=100)?;
        check_range("progress_jitter", self.progress_jitter, 0..=50)?;
        check_range("probe_interval_secs", self.probe_interval_secs, 1..=3600)?;
        check_range("connect_timeout_secs", self.connect_timeout_secs, 1..=3600)?;
        check_range("request_timeout_secs", self.request_timeout_secs, 1..=3600)?;
        check_range("db_max_connections", self.db_max_connections, 1..=20)?;
        check_range("db_busy_timeout_ms", self.db_busy_timeout_ms, 0..=120_000)?;
        if let Some(raw) = &self.probe_url {
            parse_http_url("probe_url", raw)?;
        }
        if let Some(raw) = &self.sync_endpoint {
            parse_http_url("sync_endpoint", raw)?;
        }
        Ok(())
    }
}

fn check_range<T>(
    field: &'static str,
    value: Option<T>,
    range: std::ops::RangeInclusive<T>,
) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display + std::fmt::Debug,
{
    let Some(value) = value else {
        return Ok(());
    };
    if range.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::Invalid {
        field,
        value: value.to_string(),
        expected: format!("range {range:?}"),
    })
}

fn parse_http_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::Invalid {
        field,
        value: raw.to_string(),
        expected: "an http(s) URL".to_string(),
    };
    let url = Url::parse(raw).map_err(|_| invalid())?;
    if matches!(url.scheme(), "http" | "https") {
        Ok(url)
    } else {
        Err(invalid())
    }
}

/// Fully resolved settings with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineConfig {
    pub database_path: PathBuf,
    pub tick_interval: Duration,
    pub progress_step: u8,
    pub progress_jitter: u8,
    pub probe_url: Option<Url>,
    pub probe_interval: Duration,
    pub sync_endpoint: Option<Url>,
    pub api_token: Option<String>,
    pub http_timeouts: HttpTimeouts,
    pub database: DatabaseOptions,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_FILE),
            tick_interval: DEFAULT_TICK,
            progress_step: DEFAULT_STEP,
            progress_jitter: 0,
            probe_url: None,
            probe_interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS),
            sync_endpoint: None,
            api_token: None,
            http_timeouts: HttpTimeouts::default(),
            database: DatabaseOptions::default(),
        }
    }
}

impl OfflineConfig {
    /// Applies file values over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the file config fails validation.
    pub fn from_file(file: &FileConfig) -> Result<Self, ConfigError> {
        file.validate()?;
        let defaults = Self::default();
        Ok(Self {
            database_path: file
                .database_path
                .clone()
                .unwrap_or(defaults.database_path),
            tick_interval: file
                .tick_interval_ms
                .map_or(defaults.tick_interval, Duration::from_millis),
            progress_step: file.progress_step.unwrap_or(defaults.progress_step),
            progress_jitter: file.progress_jitter.unwrap_or(defaults.progress_jitter),
            probe_url: file
                .probe_url
                .as_deref()
                .map(|raw| parse_http_url("probe_url", raw))
                .transpose()?,
            probe_interval: file
                .probe_interval_secs
                .map_or(defaults.probe_interval, Duration::from_secs),
            sync_endpoint: file
                .sync_endpoint
                .as_deref()
                .map(|raw| parse_http_url("sync_endpoint", raw))
                .transpose()?,
            api_token: file.api_token.clone(),
            http_timeouts: HttpTimeouts {
                connect_secs: file
                    .connect_timeout_secs
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
                request_secs: file
                    .request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            },
            database: DatabaseOptions {
                max_connections: file.db_max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
                busy_timeout_ms: file.db_busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
            },
        })
    }

    /// Progress source configured by this file.
    #[must_use]
    pub fn progress_source(&self) -> SimulatedProgress {
        SimulatedProgress::new(self.tick_interval, self.progress_step)
            .with_jitter(self.progress_jitter)
    }
}

/// Result of looking for a config file.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    pub config: OfflineConfig,
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/course-offline/config.toml`
/// 2. `$HOME/.config/course-offline/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config from the default path, or defaults if there is none.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a file exists but cannot be read or is invalid.
pub fn load_default_config() -> Result<LoadedConfig, ConfigError> {
    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_config_file(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: OfflineConfig::default(),
            loaded_from_file: false,
        }),
    }
}

/// Loads and resolves one config file.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed or validated.
pub fn load_config_file(path: &Path) -> Result<OfflineConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file = FileConfig::from_toml_str(&raw, path)?;
    OfflineConfig::from_file(&file)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<FileConfig, ConfigError> {
        FileConfig::from_toml_str(raw, Path::new("config.toml"))
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let file = parse("progress_step = 25\n").expect("partial config should parse");
        let config = OfflineConfig::from_file(&file).unwrap();

        assert_eq!(config.progress_step, 25);
        assert_eq!(config.tick_interval, DEFAULT_TICK);
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DATABASE_FILE));
        assert!(config.sync_endpoint.is_none());
    }

    #[test]
    fn test_full_config_parses() {
        let file = parse(
            r#"
database_path = "/var/lib/course-offline/cache.db"
tick_interval_ms = 50
progress_step = 20
progress_jitter = 5
probe_url = "https://example.com/health"
probe_interval_secs = 30
sync_endpoint = "https://api.example.com/progress"
api_token = "secret"
connect_timeout_secs = 5
request_timeout_secs = 20
db_max_connections = 8
db_busy_timeout_ms = 2000
"#,
        )
        .expect("full config should parse");
        let config = OfflineConfig::from_file(&file).unwrap();

        assert_eq!(config.tick_interval, Duration::from_millis(50));
        assert_eq!(config.progress_jitter, 5);
        assert_eq!(
            config.sync_endpoint.as_ref().map(Url::as_str),
            Some("https://api.example.com/progress")
        );
        assert_eq!(config.http_timeouts.connect_secs, 5);
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.database.busy_timeout_ms, 2000);
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let err = parse("concurrency = 4").expect_err("unknown key should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("concurrency"), "got: {err}");
    }

    #[test]
    fn test_rejects_zero_progress_step() {
        let err = parse("progress_step = 0").expect_err("zero step should fail");
        assert!(err.to_string().contains("progress_step"));
        assert!(err.to_string().contains("1..=100"));
    }

    #[test]
    fn test_rejects_db_max_connections_out_of_range() {
        let err = parse("db_max_connections = 21").expect_err("21 is above range");
        assert!(err.to_string().contains("db_max_connections"));
    }

    #[test]
    fn test_rejects_non_http_sync_endpoint() {
        let err = parse(r#"sync_endpoint = "ftp://example.com/progress""#)
            .expect_err("ftp endpoint should fail");
        assert!(err.to_string().contains("sync_endpoint"));
    }

    #[test]
    fn test_progress_source_uses_config() {
        let config = OfflineConfig {
            tick_interval: Duration::from_millis(7),
            progress_step: 33,
            ..OfflineConfig::default()
        };
        let source = config.progress_source();
        assert_eq!(source.tick(), Duration::from_millis(7));
        assert_eq!(source.step(), 33);
    }

    #[test]
    fn test_load_config_file_missing_is_read_error() {
        let err = load_config_file(Path::new("/nonexistent/course-offline/config.toml"))
            .expect_err("missing file should fail");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
