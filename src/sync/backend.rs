//! Remote system of record for learner progress.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use super::error::SyncError;
use crate::http::{HttpTimeouts, build_client};
use crate::store::{ModuleProgressDetail, ProgressRecord};
use crate::user_agent;

/// Longest response body kept in a rejection error.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Everything submitted in one reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressBatch {
    pub records: Vec<ProgressRecord>,
    pub module_progress: Vec<ModuleProgressDetail>,
    pub submitted_at: DateTime<Utc>,
}

impl ProgressBatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.module_progress.is_empty()
    }
}

/// Accepts a progress batch; success or failure only.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// # Errors
    ///
    /// Any error means the batch was not accepted.
    async fn submit_progress(&self, batch: &ProgressBatch) -> Result<(), SyncError>;
}

/// POSTs batches as JSON to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    endpoint: Url,
    api_token: Option<String>,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns the reqwest builder error if the client cannot be built.
    pub fn new(endpoint: Url, timeouts: HttpTimeouts) -> Result<Self, reqwest::Error> {
        let client = build_client(&user_agent::sync_user_agent(), timeouts)?;
        Ok(Self {
            client,
            endpoint,
            api_token: None,
        })
    }

    /// Sends `Authorization: Bearer <token>` with each batch.
    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteBackend for HttpBackend {
    #[instrument(skip(self, batch), fields(
        endpoint = %self.endpoint,
        records = batch.records.len(),
        modules = batch.module_progress.len(),
    ))]
    async fn submit_progress(&self, batch: &ProgressBatch) -> Result<(), SyncError> {
        let mut request = self.client.post(self.endpoint.clone()).json(batch);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            debug!(%status, "progress batch accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SyncError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        })
    }
}
