//! Shared reqwest client construction.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default whole-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Timeouts applied to every outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpTimeouts {
    pub connect_secs: u64,
    pub request_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Builds a client with the given User-Agent and timeouts.
///
/// # Errors
///
/// Returns the reqwest builder error (e.g. TLS backend initialization).
pub(crate) fn build_client(
    user_agent: &str,
    timeouts: HttpTimeouts,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_secs(timeouts.request_secs))
        .gzip(true)
        .build()
}
