//! HTTP advisory backend.

use async_trait::async_trait;
use reqwest::Client;

use super::backend::{AdvisoryBackend, AdvisoryError, AdvisoryRequest, AdvisoryResponse};

/// Posts snapshots to `{base_url}/suggest`.
#[derive(Debug, Clone)]
pub struct HttpAdvisor {
    client: Client,
    base_url: String,
}

impl HttpAdvisor {
    /// Create a new advisor for the given base URL.
    pub fn new(base_url: &str) -> Result<Self, AdvisoryError> {
        let client = Client::builder()
            .user_agent(concat!("pairpad/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl AdvisoryBackend for HttpAdvisor {
    /// POST /suggest - Request a suggestion for a snapshot
    async fn suggest(&self, request: AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
        let url = format!("{}/suggest", self.base_url);
        let resp = self.client.post(&url).json(&request).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(AdvisoryError::Api { status, message });
        }

        resp.json().await.map_err(Into::into)
    }
}
