/// Weighted fusion of the three relevance signals.
///
///   final_score = w_search * base_score + w_rec * recommendation + w_ext * external
///
/// The external component is the same for every candidate. A candidate whose
/// model score is missing or failed contributes 0 for recommendation but is
/// still ranked. Weights are used exactly as configured: no renormalization, so
/// callers that move them off the 0.5 / 0.3 / 0.2 defaults own the score range.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::{CandidateDocument, RankedResult, ScoreExplanation};
use crate::config::RankingConfig;
use crate::external::ExternalSignal;
use crate::recommendation::CandidateScore;

pub struct FusionRanker {
    weights: RankingConfig,
}

impl FusionRanker {
    pub fn new(weights: RankingConfig) -> Self {
        FusionRanker { weights }
    }

    pub fn weights(&self) -> RankingConfig {
        self.weights
    }

    /// Fuse and sort. `candidates` must be in lexical index order; equal final
    /// scores keep that order.
    pub fn rank(
        &self,
        candidates: &[CandidateDocument],
        scores: &HashMap<String, CandidateScore>,
        external: Option<&ExternalSignal>,
    ) -> Vec<RankedResult> {
        let external_score = external.map(|s| s.relevance_score).unwrap_or(0.0);

        let results = candidates
            .iter()
            .map(|doc| {
                let recommendation = match scores.get(&doc.doc_id) {
                    Some(Ok(prediction)) => prediction.score,
                    _ => 0.0,
                };
                let explanation = ScoreExplanation {
                    search: doc.base_score,
                    recommendation,
                    external: external_score,
                };
                RankedResult {
                    doc_id: doc.doc_id.clone(),
                    title: doc.title.clone(),
                    text_snippet: doc.text_snippet.clone(),
                    final_score: self.combine(&explanation),
                    explanation,
                }
            })
            .collect();

        sort_descending(results)
    }

    /// Re-apply the ordering rule to already ranked results.
    pub fn resort(&self, results: Vec<RankedResult>) -> Vec<RankedResult> {
        sort_descending(results)
    }

    fn combine(&self, e: &ScoreExplanation) -> f64 {
        self.weights.weight_search * e.search
            + self.weights.weight_recommendation * e.recommendation
            + self.weights.weight_external * e.external
    }
}

/// Stable sort by final score, descending.
fn sort_descending(mut results: Vec<RankedResult>) -> Vec<RankedResult> {
    results.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap_or(Ordering::Equal));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::{ModelError, Prediction};
    use std::time::Duration;

    fn doc(id: &str, base: f64) -> CandidateDocument {
        CandidateDocument {
            doc_id: id.to_string(),
            title: format!("Title {}", id),
            text_snippet: String::new(),
            base_score: base,
            match_count: 1,
        }
    }

    fn ok(score: f64) -> CandidateScore {
        Ok(Prediction {
            score,
            confidence: (score - 0.5).abs() * 2.0,
            model_version: "mock_v1".into(),
        })
    }

    fn signal(relevance: f64) -> ExternalSignal {
        ExternalSignal {
            source: "wikipedia".into(),
            relevance_score: relevance,
            description_length: (relevance * 500.0) as usize,
            popularity_proxy: None,
        }
    }

    fn ids(results: &[RankedResult]) -> Vec<&str> {
        results.iter().map(|r| r.doc_id.as_str()).collect()
    }

    #[test]
    fn test_weighted_sum_and_order() {
        let ranker = FusionRanker::new(RankingConfig::default());
        let candidates = vec![doc("A", 0.2), doc("B", 0.5), doc("C", 0.4)];
        let scores = HashMap::from([
            ("A".to_string(), ok(0.9)),
            ("B".to_string(), ok(0.1)),
            ("C".to_string(), ok(0.5)),
        ]);
        let ext = signal(0.5);
        let results = ranker.rank(&candidates, &scores, Some(&ext));

        // A: 0.1 + 0.27 + 0.1 = 0.47, B: 0.25 + 0.03 + 0.1 = 0.38, C: 0.2 + 0.15 + 0.1 = 0.45
        assert_eq!(ids(&results), vec!["A", "C", "B"]);
        assert!((results[0].final_score - 0.47).abs() < 1e-12);
        assert_eq!(
            results[0].explanation,
            ScoreExplanation { search: 0.2, recommendation: 0.9, external: 0.5 }
        );
    }

    #[test]
    fn test_failed_and_missing_predictions_contribute_zero() {
        let ranker = FusionRanker::new(RankingConfig::default());
        let candidates = vec![doc("A", 0.6), doc("B", 0.6), doc("C", 0.6)];
        let scores = HashMap::from([
            ("A".to_string(), Err(ModelError::Failure("boom".into()))),
            ("B".to_string(), Err(ModelError::Timeout(Duration::from_millis(5)))),
        ]);
        let results = ranker.rank(&candidates, &scores, None);
        assert_eq!(results.len(), 3, "failed candidates are never dropped");
        for r in &results {
            assert_eq!(r.explanation.recommendation, 0.0);
            assert_eq!(r.explanation.external, 0.0);
            assert!((r.final_score - 0.3).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ties_preserve_index_order() {
        let ranker = FusionRanker::new(RankingConfig::default());
        let candidates = vec![doc("first", 0.5), doc("second", 0.5), doc("third", 0.5)];
        let results = ranker.rank(&candidates, &HashMap::new(), None);
        assert_eq!(ids(&results), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_resort_is_idempotent() {
        let ranker = FusionRanker::new(RankingConfig::default());
        let candidates = vec![doc("A", 0.1), doc("B", 0.9), doc("C", 0.9), doc("D", 0.3)];
        let scores = HashMap::from([("D".to_string(), ok(1.0))]);
        let once = ranker.rank(&candidates, &scores, Some(&signal(0.2)));
        let twice = ranker.resort(once.clone());
        assert_eq!(once, twice);
        assert_eq!(ids(&once), vec!["B", "C", "D", "A"]);
    }

    #[test]
    fn test_weights_are_not_renormalized() {
        let ranker = FusionRanker::new(RankingConfig {
            weight_search: 2.0,
            weight_recommendation: 1.0,
            weight_external: -1.0,
        });
        let scores = HashMap::from([("A".to_string(), ok(0.8))]);
        let results = ranker.rank(&[doc("A", 0.9)], &scores, Some(&signal(1.0)));
        assert!((results[0].final_score - 1.6).abs() < 1e-12);
    }
}
