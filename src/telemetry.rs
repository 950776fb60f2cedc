/// Stage instrumentation and service counters
///
/// The pipeline reports stage boundaries to an injected `StageObserver`; the
/// core stages themselves never log timings. `ServiceMetrics` keeps
/// process-wide atomic counters that the `get_metrics` tool snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::external::{ExternalError, ExternalSignal};
use crate::query::QueryIntent;
use crate::recommendation::{CandidateScore, ModelError};

const STAGE_COUNT: usize = 5;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    QueryNormalizer,
    LexicalIndex,
    Recommendation,
    ExternalSignal,
    FusionRanker,
}

impl Stage {
    pub const ALL: [Stage; STAGE_COUNT] = [
        Stage::QueryNormalizer,
        Stage::LexicalIndex,
        Stage::Recommendation,
        Stage::ExternalSignal,
        Stage::FusionRanker,
    ];

    /// Position in execution order.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::QueryNormalizer => "query_normalizer",
            Stage::LexicalIndex => "lexical_index",
            Stage::Recommendation => "recommendation",
            Stage::ExternalSignal => "external_signal",
            Stage::FusionRanker => "fusion_ranker",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutcome {
    Ok,
    /// Finished, but without some of its signal
    Degraded,
    Failed,
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Ok => write!(f, "ok"),
            StageOutcome::Degraded => write!(f, "degraded"),
            StageOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Receives stage boundaries for one request.
pub trait StageObserver: Send + Sync {
    fn on_stage_start(&self, request_id: &str, stage: Stage);

    fn on_stage_end(
        &self,
        request_id: &str,
        stage: Stage,
        outcome: StageOutcome,
        elapsed: Duration,
    );
}

/// Emits one tracing event per stage end.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn on_stage_start(&self, request_id: &str, stage: Stage) {
        tracing::trace!(request_id, stage = %stage, "Stage started");
    }

    fn on_stage_end(
        &self,
        request_id: &str,
        stage: Stage,
        outcome: StageOutcome,
        elapsed: Duration,
    ) {
        let duration_ms = elapsed.as_secs_f64() * 1000.0;
        match outcome {
            StageOutcome::Ok => {
                tracing::debug!(request_id, stage = %stage, %outcome, duration_ms, "Stage finished")
            }
            StageOutcome::Degraded | StageOutcome::Failed => {
                tracing::warn!(request_id, stage = %stage, %outcome, duration_ms, "Stage finished")
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {
    fn on_stage_start(&self, _request_id: &str, _stage: Stage) {}

    fn on_stage_end(
        &self,
        _request_id: &str,
        _stage: Stage,
        _outcome: StageOutcome,
        _elapsed: Duration,
    ) {
    }
}

/// Buckets of the model score histogram, each 0.1 wide over [0, 1].
pub const SCORE_BUCKETS: usize = 10;

/// Count, total and worst case of one timed operation.
#[derive(Debug, Default)]
struct DurationCounter {
    count: AtomicU64,
    total_us: AtomicU64,
    max_us: AtomicU64,
}

impl DurationCounter {
    fn record(&self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_us.fetch_add(us, Ordering::Relaxed);
        self.max_us.fetch_max(us, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DurationSnapshot {
        DurationSnapshot {
            count: self.count.load(Ordering::Relaxed),
            total_us: self.total_us.load(Ordering::Relaxed),
            max_us: self.max_us.load(Ordering::Relaxed),
        }
    }
}

/// Timings in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DurationSnapshot {
    pub count: u64,
    pub total_us: u64,
    pub max_us: u64,
}

impl DurationSnapshot {
    pub fn mean_us(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_us / self.count
        }
    }
}

#[derive(Debug, Default)]
pub struct ServiceMetrics {
    queries_search: AtomicU64,
    queries_discovery: AtomicU64,
    predictions_ok: AtomicU64,
    predictions_failed: AtomicU64,
    predictions_timeout: AtomicU64,
    external_hit: AtomicU64,
    external_miss: AtomicU64,
    external_failure: AtomicU64,
    external_timeout: AtomicU64,
    requests_completed: AtomicU64,
    requests_failed: AtomicU64,
    latency_ms_total: AtomicU64,
    /// Indexed by `Stage::index`
    stage_durations: [DurationCounter; STAGE_COUNT],
    inference: DurationCounter,
    score_buckets: [AtomicU64; SCORE_BUCKETS],
    /// Sum of successful scores in millionths
    score_sum_micros: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub queries_search: u64,
    pub queries_discovery: u64,
    pub predictions_ok: u64,
    pub predictions_failed: u64,
    pub predictions_timeout: u64,
    pub external_hit: u64,
    pub external_miss: u64,
    pub external_failure: u64,
    pub external_timeout: u64,
    pub requests_completed: u64,
    pub requests_failed: u64,
    pub latency_ms_total: u64,
    pub stage_durations: BTreeMap<Stage, DurationSnapshot>,
    /// Completed model inferences (failed ones included, deadline cut-offs not)
    pub inference: DurationSnapshot,
    /// Successful scores per 0.1-wide bucket; a score of exactly 1.0 lands in the last one
    pub score_distribution: [u64; SCORE_BUCKETS],
    /// Mean of successful scores, 0 when there are none
    pub score_mean: f64,
}

impl ServiceMetrics {
    pub fn record_query(&self, intent: QueryIntent) {
        match intent {
            QueryIntent::Search => self.queries_search.fetch_add(1, Ordering::Relaxed),
            QueryIntent::Discovery => self.queries_discovery.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_prediction(&self, outcome: &CandidateScore) {
        let counter = match outcome {
            Ok(prediction) => {
                self.record_score(prediction.score);
                &self.predictions_ok
            }
            Err(ModelError::Failure(_)) => &self.predictions_failed,
            Err(ModelError::Timeout(_)) => &self.predictions_timeout,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_score(&self, score: f64) {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        let bucket = ((score * SCORE_BUCKETS as f64) as usize).min(SCORE_BUCKETS - 1);
        self.score_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.score_sum_micros
            .fetch_add((score * 1_000_000.0).round() as u64, Ordering::Relaxed);
    }

    /// Time spent inside one model inference.
    pub fn record_inference(&self, elapsed: Duration) {
        self.inference.record(elapsed);
    }

    pub fn record_stage(&self, stage: Stage, elapsed: Duration) {
        self.stage_durations[stage.index()].record(elapsed);
    }

    pub fn record_external(&self, outcome: &Result<Option<ExternalSignal>, ExternalError>) {
        let counter = match outcome {
            Ok(Some(_)) => &self.external_hit,
            Ok(None) => &self.external_miss,
            Err(ExternalError::Timeout(_)) => &self.external_timeout,
            Err(_) => &self.external_failure,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self, latency_ms: u64) {
        self.requests_completed.fetch_add(1, Ordering::Relaxed);
        self.latency_ms_total.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let predictions_ok = self.predictions_ok.load(Ordering::Relaxed);
        let score_sum = self.score_sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let mut score_distribution = [0; SCORE_BUCKETS];
        for (slot, bucket) in score_distribution.iter_mut().zip(&self.score_buckets) {
            *slot = bucket.load(Ordering::Relaxed);
        }

        MetricsSnapshot {
            queries_search: self.queries_search.load(Ordering::Relaxed),
            queries_discovery: self.queries_discovery.load(Ordering::Relaxed),
            predictions_ok,
            predictions_failed: self.predictions_failed.load(Ordering::Relaxed),
            predictions_timeout: self.predictions_timeout.load(Ordering::Relaxed),
            external_hit: self.external_hit.load(Ordering::Relaxed),
            external_miss: self.external_miss.load(Ordering::Relaxed),
            external_failure: self.external_failure.load(Ordering::Relaxed),
            external_timeout: self.external_timeout.load(Ordering::Relaxed),
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            latency_ms_total: self.latency_ms_total.load(Ordering::Relaxed),
            stage_durations: Stage::ALL
                .iter()
                .map(|stage| (*stage, self.stage_durations[stage.index()].snapshot()))
                .collect(),
            inference: self.inference.snapshot(),
            score_distribution,
            score_mean: if predictions_ok == 0 {
                0.0
            } else {
                score_sum / predictions_ok as f64
            },
        }
    }
}
