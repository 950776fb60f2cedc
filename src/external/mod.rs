/// External knowledge signal
///
/// One lookup per request against a knowledge source, turned into a global
/// relevance boost applied uniformly to every candidate. Chaos can fail the
/// lookup outright or stall it past the configured timeout. Real lookup
/// problems (network, status, bad body) are absorbed as "no signal".

pub mod wikipedia;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chaos::{ChaosController, ChaosKind};
use crate::config::ExternalConfig;
use crate::query::NormalizedQuery;

pub use wikipedia::WikipediaClient;

/// Extract length at which relevance saturates.
const RELEVANCE_SATURATION_CHARS: f64 = 500.0;
/// Page views at which popularity saturates.
const POPULARITY_SATURATION_VIEWS: f64 = 10_000.0;
/// Extra stall on top of the lookup timeout when a chaos timeout fires.
const CHAOS_TIMEOUT_OVERSHOOT: Duration = Duration::from_secs(1);

/// Global relevance boost for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalSignal {
    pub source: String,
    /// min(extract chars / 500, 1)
    pub relevance_score: f64,
    pub description_length: usize,
    /// page views / 10000 clamped to [0, 1], when the source reports views
    pub popularity_proxy: Option<f64>,
}

/// Raw summary returned by a knowledge source.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub extract: String,
    #[serde(default)]
    pub pageviews: Option<f64>,
}

/// Errors that can occur during an external lookup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExternalError {
    /// Injected failure; no lookup was attempted
    #[error("External lookup failed: {0}")]
    Failure(String),

    #[error("External lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("External transport error: {0}")]
    Transport(String),

    #[error("External source returned status {0}")]
    Status(u16),

    #[error("Failed to decode external response: {0}")]
    Decode(String),
}

/// A topic-summary lookup service.
///
/// Implementations must be Send + Sync; one instance serves all requests.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Fetch the summary for a single topic.
    async fn fetch_summary(&self, topic: &str) -> Result<Summary, ExternalError>;

    /// Short source name, e.g. "wikipedia"
    fn name(&self) -> &str;
}

/// Chaos-aware wrapper around a `KnowledgeSource`.
pub struct ExternalSignalSource {
    source: Arc<dyn KnowledgeSource>,
    chaos: Arc<ChaosController>,
    config: ExternalConfig,
}

impl ExternalSignalSource {
    pub fn new(
        source: Arc<dyn KnowledgeSource>,
        chaos: Arc<ChaosController>,
        config: ExternalConfig,
    ) -> Self {
        ExternalSignalSource { source, chaos, config }
    }

    /// Topic looked up for `query`: its first token, or the configured default.
    pub fn topic_for<'a>(&'a self, query: &'a NormalizedQuery) -> &'a str {
        query
            .tokens
            .first()
            .map(String::as_str)
            .unwrap_or(self.config.default_topic.as_str())
    }

    /// Look up the external signal for `query`.
    ///
    /// Returns `Err` only for injected failures and timeouts. Any genuine
    /// lookup problem yields `Ok(None)`.
    pub async fn get_signal(
        &self,
        query: &NormalizedQuery,
    ) -> Result<Option<ExternalSignal>, ExternalError> {
        if self.chaos.should_trigger(ChaosKind::ExternalFailure) {
            return Err(ExternalError::Failure("simulated external failure".to_string()));
        }

        if self.chaos.should_trigger(ChaosKind::ExternalTimeout) {
            let timeout = Duration::from_millis(self.config.timeout_ms);
            tokio::time::sleep(timeout + CHAOS_TIMEOUT_OVERSHOOT).await;
            return Err(ExternalError::Timeout(timeout));
        }

        let topic = self.topic_for(query);
        match self.source.fetch_summary(topic).await {
            Ok(summary) => Ok(Some(self.signal_from(&summary))),
            Err(e) => {
                tracing::warn!(
                    source = self.source.name(),
                    topic,
                    error = %e,
                    "External lookup failed, continuing without signal"
                );
                Ok(None)
            }
        }
    }

    fn signal_from(&self, summary: &Summary) -> ExternalSignal {
        let description_length = summary.extract.chars().count();
        ExternalSignal {
            source: self.config.source.clone(),
            relevance_score: (description_length as f64 / RELEVANCE_SATURATION_CHARS).min(1.0),
            description_length,
            popularity_proxy: summary
                .pageviews
                .map(|views| (views / POPULARITY_SATURATION_VIEWS).clamp(0.0, 1.0)),
        }
    }
}
