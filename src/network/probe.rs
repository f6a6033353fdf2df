//! Connectivity probes.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use crate::http::{HttpTimeouts, build_client};
use crate::user_agent;

/// Answers "can we reach the network right now".
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Probe with a fixed answer. Useful for tests and forced offline mode.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn is_online(&self) -> bool {
        self.0
    }
}

/// Reports online when `url` answers at all within the request timeout.
///
/// Any HTTP status counts; only transport failures mean offline.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    url: Url,
}

impl HttpProbe {
    /// # Errors
    ///
    /// Returns the reqwest builder error if the client cannot be built.
    pub fn new(url: Url, timeouts: HttpTimeouts) -> Result<Self, reqwest::Error> {
        let client = build_client(&user_agent::probe_user_agent(), timeouts)?;
        Ok(Self { client, url })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    #[instrument(level = "debug", skip(self), fields(url = %self.url))]
    async fn is_online(&self) -> bool {
        match self.client.head(self.url.clone()).send().await {
            Ok(response) => {
                debug!(status = %response.status(), "probe answered");
                true
            }
            Err(error) => {
                debug!(error = %error, "probe failed");
                false
            }
        }
    }
}
