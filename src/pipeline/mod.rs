/// Search orchestration
///
/// One request flows through:
///   normalize -> lexical index -> { per-candidate features + model | external lookup } -> fusion
///
/// The per-candidate scoring stream and the external lookup run concurrently.
/// Every suspension point is bounded by a request-scoped deadline. Only a
/// validation error or a lexical index failure fails the request; every other
/// stage degrades and is reported in `meta.degradation`.

pub mod request;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::time::{timeout_at, Instant as Deadline};
use uuid::Uuid;

use crate::chaos::ChaosController;
use crate::config::Config;
use crate::errors::SignalError;
use crate::external::{ExternalError, ExternalSignal, ExternalSignalSource, KnowledgeSource};
use crate::query::{NormalizedQuery, QueryNormalizer};
use crate::recommendation::{CandidateScore, FeatureBuilder, MockRanker, ModelError};
use crate::search::{CandidateDocument, FusionRanker, LexicalIndex};
use crate::store::DocumentCatalog;
use crate::telemetry::{ServiceMetrics, Stage, StageObserver, StageOutcome};

pub use request::{Degradation, ParsedQuery, ResponseMeta, SearchRequest, SearchResponse};

pub struct SearchPipeline {
    normalizer: QueryNormalizer,
    index: LexicalIndex,
    features: FeatureBuilder,
    model: MockRanker,
    external: ExternalSignalSource,
    ranker: FusionRanker,
    chaos: Arc<ChaosController>,
    observer: Arc<dyn StageObserver>,
    metrics: Arc<ServiceMetrics>,
    request_timeout: Duration,
    default_limit: usize,
    max_limit: usize,
    workers: usize,
}

impl SearchPipeline {
    /// Wire every stage from `config`. The chaos controller is shared with
    /// whoever else holds it (the service's chaos tools, the load generator).
    pub fn from_config(
        config: &Config,
        catalog: Arc<dyn DocumentCatalog>,
        knowledge: Arc<dyn KnowledgeSource>,
        chaos: Arc<ChaosController>,
        observer: Arc<dyn StageObserver>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        SearchPipeline {
            normalizer: QueryNormalizer::new(&config.stopwords),
            index: LexicalIndex::new(
                Arc::clone(&catalog),
                Arc::clone(&chaos),
                Duration::from_millis(config.search.slow_threshold_ms),
            ),
            features: FeatureBuilder::new(catalog),
            model: MockRanker::new(Arc::clone(&chaos), config.model.clone()),
            external: ExternalSignalSource::new(
                knowledge,
                Arc::clone(&chaos),
                config.external.clone(),
            ),
            ranker: FusionRanker::new(config.ranking),
            chaos,
            observer,
            metrics,
            request_timeout: Duration::from_millis(config.pipeline.request_timeout_ms),
            default_limit: config.search.default_limit,
            max_limit: config.search.max_limit,
            workers: config.model.workers.max(1),
        }
    }

    pub fn chaos(&self) -> &Arc<ChaosController> {
        &self.chaos
    }

    pub fn metrics(&self) -> &Arc<ServiceMetrics> {
        &self.metrics
    }

    pub fn model_version(&self) -> &str {
        self.model.version()
    }

    /// Run one search request end to end.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SignalError> {
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();

        let limit = match request.validate(self.default_limit, self.max_limit) {
            Ok(limit) => limit,
            Err(e) => {
                self.metrics.record_failed();
                return Err(e);
            }
        };
        let deadline = Deadline::now() + self.request_timeout;

        // 1. Normalize
        self.observer.on_stage_start(&request_id, Stage::QueryNormalizer);
        let stage_started = Instant::now();
        let query = self.normalizer.parse(&request.query);
        self.end_stage(&request_id, Stage::QueryNormalizer, StageOutcome::Ok, stage_started);
        self.metrics.record_query(query.intent);

        // 2. Lexical candidates; without them there is nothing to rank.
        self.observer.on_stage_start(&request_id, Stage::LexicalIndex);
        let stage_started = Instant::now();
        let searched = match timeout_at(deadline, self.index.search(&query, limit)).await {
            Ok(result) => result,
            Err(_) => Err(SignalError::IndexUnavailable(format!(
                "request deadline of {}ms passed during lexical search",
                self.request_timeout.as_millis()
            ))),
        };
        let candidates = match searched {
            Ok(candidates) => {
                self.end_stage(&request_id, Stage::LexicalIndex, StageOutcome::Ok, stage_started);
                candidates
            }
            Err(e) => {
                self.end_stage(
                    &request_id,
                    Stage::LexicalIndex,
                    StageOutcome::Failed,
                    stage_started,
                );
                self.metrics.record_failed();
                tracing::error!(request_id = %request_id, error = %e, "Search request failed");
                return Err(e);
            }
        };

        // 3. Model scores and the external signal, concurrently.
        let (scores, external) = tokio::join!(
            self.score_candidates(&request_id, &query, &candidates, &request.user_id, deadline),
            self.fetch_external(&request_id, &query, deadline),
        );

        let mut components_called = vec![Stage::QueryNormalizer, Stage::LexicalIndex];
        let mut degradation = Vec::new();

        let unscored = scores.values().filter(|s| s.is_err()).count();
        if scores.len() > unscored {
            components_called.push(Stage::Recommendation);
        }
        if unscored > 0 {
            degradation.push(Degradation {
                stage: Stage::Recommendation,
                detail: format!("{} of {} candidates unscored", unscored, candidates.len()),
            });
        }

        let signal = match external {
            Ok(Some(signal)) => {
                components_called.push(Stage::ExternalSignal);
                Some(signal)
            }
            Ok(None) => {
                degradation.push(Degradation {
                    stage: Stage::ExternalSignal,
                    detail: "no external signal available".to_string(),
                });
                None
            }
            Err(e) => {
                degradation.push(Degradation {
                    stage: Stage::ExternalSignal,
                    detail: e.to_string(),
                });
                None
            }
        };

        // 4. Fuse
        self.observer.on_stage_start(&request_id, Stage::FusionRanker);
        let stage_started = Instant::now();
        let results = self.ranker.rank(&candidates, &scores, signal.as_ref());
        self.end_stage(&request_id, Stage::FusionRanker, StageOutcome::Ok, stage_started);
        components_called.push(Stage::FusionRanker);

        let latency_ms = started.elapsed().as_millis() as u64;
        self.metrics.record_completed(latency_ms);
        tracing::info!(
            request_id = %request_id,
            intent = query.intent.as_str(),
            results = results.len(),
            degraded = !degradation.is_empty(),
            latency_ms,
            "Search request complete"
        );

        Ok(SearchResponse {
            query: request.query.clone(),
            parsed_query: ParsedQuery::from(&query),
            results,
            meta: ResponseMeta {
                request_id,
                latency_ms,
                model_version: self.model.version().to_string(),
                components_called,
                degradation,
            },
        })
    }

    /// Score every candidate with at most `workers` in flight. Completion order
    /// is irrelevant: outcomes are keyed by doc_id.
    async fn score_candidates(
        &self,
        request_id: &str,
        query: &NormalizedQuery,
        candidates: &[CandidateDocument],
        user_id: &str,
        deadline: Deadline,
    ) -> HashMap<String, CandidateScore> {
        self.observer.on_stage_start(request_id, Stage::Recommendation);
        let stage_started = Instant::now();
        let budget = self.request_timeout;

        // Items must be owned: a borrowed item makes the scoring future
        // non-Send for the MCP tool handler.
        let scores: HashMap<String, CandidateScore> = stream::iter(candidates.iter().cloned())
            .map(move |candidate| async move {
                let scoring = self.score_one(query, &candidate, user_id);
                let outcome = match timeout_at(deadline, scoring).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ModelError::Timeout(budget)),
                };
                self.metrics.record_prediction(&outcome);
                if let Err(e) = &outcome {
                    tracing::debug!(
                        doc_id = %candidate.doc_id,
                        error = %e,
                        "Candidate left unscored"
                    );
                }
                (candidate.doc_id, outcome)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let outcome = if scores.values().any(|s| s.is_err()) {
            StageOutcome::Degraded
        } else {
            StageOutcome::Ok
        };
        self.end_stage(request_id, Stage::Recommendation, outcome, stage_started);
        scores
    }

    async fn score_one(
        &self,
        query: &NormalizedQuery,
        candidate: &CandidateDocument,
        user_id: &str,
    ) -> CandidateScore {
        let features = self.features.build(query, candidate, user_id).await;
        let started = Instant::now();
        let outcome = self.model.predict(&features).await;
        self.metrics.record_inference(started.elapsed());
        outcome
    }

    async fn fetch_external(
        &self,
        request_id: &str,
        query: &NormalizedQuery,
        deadline: Deadline,
    ) -> Result<Option<ExternalSignal>, ExternalError> {
        self.observer.on_stage_start(request_id, Stage::ExternalSignal);
        let stage_started = Instant::now();

        let outcome = match timeout_at(deadline, self.external.get_signal(query)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ExternalError::Timeout(self.request_timeout)),
        };
        self.metrics.record_external(&outcome);

        let stage_outcome = match &outcome {
            Ok(Some(_)) => StageOutcome::Ok,
            _ => StageOutcome::Degraded,
        };
        self.end_stage(request_id, Stage::ExternalSignal, stage_outcome, stage_started);
        outcome
    }

    /// Report a stage boundary to the observer and the stage timers.
    fn end_stage(&self, request_id: &str, stage: Stage, outcome: StageOutcome, started: Instant) {
        let elapsed = started.elapsed();
        self.metrics.record_stage(stage, elapsed);
        self.observer.on_stage_end(request_id, stage, outcome, elapsed);
    }
}
