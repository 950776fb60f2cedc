/// Lexical retrieval over the document catalog.
///
/// Algorithm:
/// 1. Slow-search chaos trial (fixed artificial delay when it fires)
/// 2. OR all query tokens into one full-text query
/// 3. Fetch up to 2 x limit hits in native rank order
/// 4. base_score = 1 / (1 + |rank|)
/// 5. match_count = query tokens found (case-insensitive substring) in title + text
/// 6. Truncate to limit, preserving order

use std::sync::Arc;
use std::time::Duration;

use super::{CandidateDocument, SNIPPET_CHARS};
use crate::chaos::{ChaosController, ChaosKind};
use crate::errors::SignalError;
use crate::query::NormalizedQuery;
use crate::store::DocumentCatalog;

/// Candidates fetched per requested result, leaving room for downstream truncation.
const OVERFETCH_FACTOR: usize = 2;

pub struct LexicalIndex {
    catalog: Arc<dyn DocumentCatalog>,
    chaos: Arc<ChaosController>,
    slow_delay: Duration,
}

impl LexicalIndex {
    pub fn new(
        catalog: Arc<dyn DocumentCatalog>,
        chaos: Arc<ChaosController>,
        slow_delay: Duration,
    ) -> Self {
        LexicalIndex {
            catalog,
            chaos,
            slow_delay,
        }
    }

    /// Retrieve at most `limit` candidates for `query`.
    ///
    /// # Errors
    /// Returns `SignalError::IndexUnavailable` when the catalog query fails.
    pub async fn search(
        &self,
        query: &NormalizedQuery,
        limit: usize,
    ) -> Result<Vec<CandidateDocument>, SignalError> {
        if self.chaos.should_trigger(ChaosKind::SlowSearch) {
            // Served in full once triggered.
            tokio::time::sleep(self.slow_delay).await;
        }

        if query.tokens.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let hits = self
            .catalog
            .search(&query.tokens, limit.saturating_mul(OVERFETCH_FACTOR))
            .await
            .map_err(|e| SignalError::IndexUnavailable(e.to_string()))?;

        let candidates: Vec<CandidateDocument> = hits
            .into_iter()
            .take(limit)
            .map(|hit| {
                let haystack = format!("{} {}", hit.title, hit.text).to_lowercase();
                let match_count = query
                    .tokens
                    .iter()
                    .filter(|t| haystack.contains(t.to_lowercase().as_str()))
                    .count();
                CandidateDocument {
                    base_score: 1.0 / (1.0 + hit.rank.abs()),
                    match_count,
                    text_snippet: hit.text.chars().take(SNIPPET_CHARS).collect(),
                    title: hit.title,
                    doc_id: hit.doc_id,
                }
            })
            .collect();

        tracing::debug!(
            tokens = query.token_count,
            limit,
            returned = candidates.len(),
            "Lexical search complete"
        );
        Ok(candidates)
    }
}
