pub mod fusion;
pub mod index;

// Re-export key types for convenience
pub use fusion::FusionRanker;
pub use index::LexicalIndex;

use serde::{Deserialize, Serialize};

/// Maximum characters of document text carried in a candidate.
pub const SNIPPET_CHARS: usize = 200;

/// One lexical candidate, in index order.
///
/// Produced by LexicalIndex::search(); read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDocument {
    pub doc_id: String,
    pub title: String,
    /// First 200 characters of the document text
    pub text_snippet: String,
    /// Native rank mapped into [0, 1]
    pub base_score: f64,
    /// How many query tokens occur in title + text
    pub match_count: usize,
}

/// Per-signal contributions before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreExplanation {
    pub search: f64,
    pub recommendation: f64,
    pub external: f64,
}

/// A fused, ranked result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub doc_id: String,
    pub title: String,
    pub text_snippet: String,
    /// Weighted sum of the explanation components. Within [0, 1] only when the
    /// weights are non-negative and sum to at most 1.
    pub final_score: f64,
    pub explanation: ScoreExplanation,
}
