/// Wikipedia REST summary client
///
/// Calls `GET {base_url}/page/summary/{topic}` using reqwest. The topic is
/// pushed as a single percent-encoded path segment.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use super::{ExternalError, KnowledgeSource, Summary};
use crate::config::ExternalConfig;

pub struct WikipediaClient {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl WikipediaClient {
    /// Create a client for `config.base_url` with `config.timeout_ms` as the
    /// per-request timeout.
    ///
    /// # Errors
    /// Returns `ExternalError::Transport` if the base URL cannot be parsed or
    /// cannot carry path segments, or the HTTP client cannot be built.
    pub fn new(config: &ExternalConfig) -> Result<Self, ExternalError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| {
                ExternalError::Transport(format!("Invalid base URL '{}': {}", config.base_url, e))
            })?;
        if base_url.cannot_be_a_base() {
            return Err(ExternalError::Transport(format!(
                "Base URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExternalError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(WikipediaClient { client, base_url, timeout })
    }

    /// Full summary URL for `topic`.
    pub fn summary_url(&self, topic: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("page").push("summary").push(topic);
        }
        url
    }
}

#[async_trait]
impl KnowledgeSource for WikipediaClient {
    async fn fetch_summary(&self, topic: &str) -> Result<Summary, ExternalError> {
        let url = self.summary_url(topic);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ExternalError::Timeout(self.timeout)
            } else {
                ExternalError::Transport(format!("HTTP request failed: {}", e))
            }
        })?;

        if !response.status().is_success() {
            return Err(ExternalError::Status(response.status().as_u16()));
        }

        response
            .json::<Summary>()
            .await
            .map_err(|e| ExternalError::Decode(e.to_string()))
    }

    fn name(&self) -> &str {
        "wikipedia"
    }
}
