//! Advisory backend contract.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of an advisory call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    pub snapshot: String,
}

impl AdvisoryRequest {
    pub fn new(snapshot: impl Into<String>) -> Self {
        Self {
            snapshot: snapshot.into(),
        }
    }
}

/// Successful advisory reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryResponse {
    pub suggestion_text: String,
}

#[derive(Debug, Error)]
pub enum AdvisoryError {
    #[error("advisory request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("advisory backend unavailable: {0}")]
    Unavailable(String),
}

impl AdvisoryError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

impl From<AdvisoryError> for crate::error::PadError {
    fn from(err: AdvisoryError) -> Self {
        Self::advisory_failure(err.to_string())
    }
}

/// Anything that can turn a buffer snapshot into a suggestion.
#[async_trait]
pub trait AdvisoryBackend: Send + Sync {
    async fn suggest(&self, request: AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError>;
}

/// Canned suggestions returned in rotation after a fixed delay.
#[derive(Debug)]
pub struct StubAdvisor {
    suggestions: Vec<String>,
    delay: Duration,
    counter: AtomicUsize,
}

impl Default for StubAdvisor {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl StubAdvisor {
    pub fn new(delay: Duration) -> Self {
        Self {
            suggestions: vec![
                "Consider using const for values that are never reassigned.".to_string(),
                "Extract repeated logic into a named function.".to_string(),
                "Add a guard for empty input before processing.".to_string(),
            ],
            delay,
            counter: AtomicUsize::new(0),
        }
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions = suggestions.into_iter().map(Into::into).collect();
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl AdvisoryBackend for StubAdvisor {
    async fn suggest(&self, request: AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
        tokio::time::sleep(self.delay).await;
        if self.suggestions.is_empty() {
            return Err(AdvisoryError::unavailable("no suggestions configured"));
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.suggestions.len();
        tracing::debug!(bytes = request.snapshot.len(), index, "stub suggestion");
        Ok(AdvisoryResponse {
            suggestion_text: self.suggestions[index].clone(),
        })
    }
}
