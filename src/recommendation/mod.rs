/// Learned-ranking leg: per-candidate feature construction and the mock model.
///
/// Both halves run once per (query, candidate, user) triple. A failure here only
/// removes that candidate's recommendation contribution; it never fails the request.

pub mod features;
pub mod model;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use features::FeatureBuilder;
pub use model::MockRanker;

/// Model input for one candidate. Ephemeral: built and consumed immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Characters in the raw query
    pub query_length: usize,
    pub query_token_count: usize,
    /// Stable hash of the user id, reduced mod 1000
    pub user_id_hash: u64,
    /// Characters in the document text
    pub doc_length: usize,
    /// Category encoding 0..=4
    pub doc_category_encoded: u8,
    /// Jaccard similarity of query tokens vs document tokens
    pub query_doc_overlap: f64,
    /// Inner product of the document embedding and the synthesized query embedding
    pub embedding_dot_product: f64,
}

/// Model output for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub score: f64,
    pub confidence: f64,
    pub model_version: String,
}

/// Errors that can occur while scoring a single candidate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Inference failed (chaos-injected)
    #[error("Model inference failed: {0}")]
    Failure(String),

    /// The request deadline passed before the candidate was scored
    #[error("Model inference timed out after {0:?}")]
    Timeout(Duration),
}

/// Per-candidate outcome handed to the fusion ranker.
pub type CandidateScore = Result<Prediction, ModelError>;
