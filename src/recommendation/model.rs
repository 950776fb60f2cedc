/// Mock learned ranker.
///
/// Scoring is deterministic for a given feature vector:
/// 1. Weighted sum of normalized features (plus a derived match-quality term)
/// 2. Logistic squash centered at 0.5
/// 3. Noise in [-0.05, 0.05] keyed by a hash of the integer features
/// 4. Clamp to [0, 1]
///
/// Only the chaos-injected failure and the simulated latency are random.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use super::features::stable_hash;
use super::{FeatureVector, ModelError, Prediction};
use crate::chaos::{ChaosController, ChaosKind};
use crate::config::ModelConfig;

const W_OVERLAP: f64 = 0.30;
const W_EMBEDDING: f64 = 0.25;
const W_TOKEN_COUNT: f64 = 0.15;
const W_CATEGORY: f64 = 0.10;
const W_MATCH_QUALITY: f64 = 0.20;

const SIGMOID_STEEPNESS: f64 = 5.0;
const NOISE_AMPLITUDE: f64 = 0.05;
/// Token counts saturate here.
const TOKEN_COUNT_CAP: f64 = 10.0;
/// Highest category encoding.
const CATEGORY_MAX: f64 = 4.0;

pub struct MockRanker {
    chaos: Arc<ChaosController>,
    config: ModelConfig,
}

impl MockRanker {
    pub fn new(chaos: Arc<ChaosController>, config: ModelConfig) -> Self {
        MockRanker { chaos, config }
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    /// Score one candidate.
    ///
    /// The chaos trial runs before anything else. The simulated inference delay
    /// always runs to completion; this method never reports a timeout itself.
    pub async fn predict(&self, features: &FeatureVector) -> Result<Prediction, ModelError> {
        if self.chaos.should_trigger(ChaosKind::ModelFailure) {
            return Err(ModelError::Failure("simulated error".to_string()));
        }

        let delay = self.inference_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let (score, confidence) = score_features(features);
        tracing::trace!(
            score,
            confidence,
            inference_ms = delay.as_millis() as u64,
            "Model prediction"
        );

        Ok(Prediction {
            score,
            confidence,
            model_version: self.config.version.clone(),
        })
    }

    /// Usually uniform in [min, max]; occasionally stretched to 80% of the timeout.
    fn inference_delay(&self) -> Duration {
        let mut rng = rand::thread_rng();
        if rng.gen::<f64>() < self.config.slow_inference_rate {
            return Duration::from_millis(self.config.timeout_ms * 4 / 5);
        }
        let (lo, hi) = (self.config.min_latency_ms, self.config.max_latency_ms);
        if hi <= lo {
            return Duration::from_millis(lo);
        }
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

/// Pure scoring function: returns (score, confidence).
pub fn score_features(features: &FeatureVector) -> (f64, f64) {
    let overlap = features.query_doc_overlap;
    let positive_dot = features.embedding_dot_product.max(0.0);
    let match_quality = (overlap + positive_dot) / 2.0;

    let raw = W_OVERLAP * overlap
        + W_EMBEDDING * positive_dot
        + W_TOKEN_COUNT * (features.query_token_count as f64 / TOKEN_COUNT_CAP).min(1.0)
        + W_CATEGORY * (features.doc_category_encoded as f64 / CATEGORY_MAX)
        + W_MATCH_QUALITY * match_quality;

    let squashed = 1.0 / (1.0 + (-SIGMOID_STEEPNESS * (raw - 0.5)).exp());
    let score = (squashed + feature_noise(features)).clamp(0.0, 1.0);
    let confidence = (score - 0.5).abs() * 2.0;
    (score, confidence)
}

/// Noise in [-0.05, 0.05] derived only from
/// (query_length, query_token_count, user_id_hash, doc_length).
pub fn feature_noise(features: &FeatureVector) -> f64 {
    let mut seed = Vec::with_capacity(32);
    seed.extend_from_slice(&(features.query_length as u64).to_le_bytes());
    seed.extend_from_slice(&(features.query_token_count as u64).to_le_bytes());
    seed.extend_from_slice(&features.user_id_hash.to_le_bytes());
    seed.extend_from_slice(&(features.doc_length as u64).to_le_bytes());

    let unit = stable_hash(&seed) as f64 / u64::MAX as f64;
    (unit * 2.0 - 1.0) * NOISE_AMPLITUDE
}
