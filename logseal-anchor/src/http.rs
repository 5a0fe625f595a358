//! HTTP anchor client.
//!
//! Talks to an anchor ledger service over a small JSON API:
//!
//! - `POST {base}/roots` with `{"root": "0x..."}` returns `{"batchId": n}`
//! - `GET {base}/roots/{id}` returns `{"root": "0x...", "anchoredAt": ...}`

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use logseal_core::crypto::Hash;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{AnchorClient, AnchoredRoot};
use crate::errors::{AnchorError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`HttpAnchor`].
#[derive(Debug, Clone)]
pub struct HttpAnchorConfig {
    /// Base URL of the ledger service, e.g. `http://anchor.internal:8545`.
    pub base_url: String,
    /// Per-request deadline.
    pub timeout: Duration,
}

impl HttpAnchorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// [`AnchorClient`] backed by an HTTP ledger service.
#[derive(Debug, Clone)]
pub struct HttpAnchor {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct CommitRequest<'a> {
    root: &'a str,
}

#[derive(Deserialize)]
struct CommitResponse {
    #[serde(rename = "batchId")]
    batch_id: u64,
}

#[derive(Deserialize)]
struct RetrieveResponse {
    root: String,
    #[serde(rename = "anchoredAt")]
    anchored_at: DateTime<Utc>,
}

impl HttpAnchor {
    pub fn new(config: HttpAnchorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnchorError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }

    fn roots_url(&self) -> String {
        format!("{}/roots", self.base_url)
    }

    fn root_url(&self, batch_id: u64) -> String {
        format!("{}/roots/{batch_id}", self.base_url)
    }

    fn transport_error(&self, e: reqwest::Error) -> AnchorError {
        if e.is_timeout() {
            AnchorError::Timeout(self.timeout.as_millis() as u64)
        } else {
            AnchorError::Network(e.to_string())
        }
    }
}

fn status_error(status: StatusCode, body: String) -> AnchorError {
    if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::TOO_MANY_REQUESTS {
        AnchorError::Unavailable(format!("{status}: {body}"))
    } else if status.is_client_error() {
        AnchorError::Submission(format!("{status}: {body}"))
    } else {
        AnchorError::Network(format!("{status}: {body}"))
    }
}

#[async_trait]
impl AnchorClient for HttpAnchor {
    async fn commit(&self, root: &Hash) -> Result<u64> {
        let response = self
            .client
            .post(self.roots_url())
            .json(&CommitRequest {
                root: &root.to_hex(),
            })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let committed: CommitResponse = response
            .json()
            .await
            .map_err(|e| AnchorError::Network(format!("malformed commit response: {e}")))?;
        debug!(batch_id = committed.batch_id, root = %root, "anchored root");
        Ok(committed.batch_id)
    }

    async fn retrieve(&self, batch_id: u64) -> Result<AnchoredRoot> {
        let response = self
            .client
            .get(self.root_url(batch_id))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AnchorError::NotFound(batch_id));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let retrieved: RetrieveResponse = response
            .json()
            .await
            .map_err(|e| AnchorError::Network(format!("malformed retrieve response: {e}")))?;
        Ok(AnchoredRoot {
            root: retrieved.root,
            anchored_at: retrieved.anchored_at,
        })
    }
}
