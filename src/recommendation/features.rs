/// Feature construction for the mock ranking model.
///
/// Features:
/// - query_length: character count of the raw query
/// - query_token_count: number of normalized tokens
/// - user_id_hash: xxHash64 of the user id, mod 1000
/// - doc_length: character count of the document text
/// - doc_category_encoded: integer encoding of the document category
/// - query_doc_overlap: Jaccard similarity of query tokens and document tokens
/// - embedding_dot_product: stored document embedding · synthesized query embedding

use std::collections::HashSet;
use std::hash::Hasher;
use std::sync::Arc;

use twox_hash::XxHash64;

use super::FeatureVector;
use crate::query::NormalizedQuery;
use crate::search::CandidateDocument;
use crate::store::{Category, DocumentCatalog, Embedding, EMBEDDING_DIM};

const USER_HASH_BUCKETS: u64 = 1000;

/// Builds feature vectors, consulting the catalog for category and embedding.
pub struct FeatureBuilder {
    catalog: Arc<dyn DocumentCatalog>,
}

impl FeatureBuilder {
    pub fn new(catalog: Arc<dyn DocumentCatalog>) -> Self {
        FeatureBuilder { catalog }
    }

    /// Build the feature vector for one candidate. Never fails: a missing
    /// catalog record (or a failed lookup) falls back to the default category,
    /// a zero embedding and the candidate's snippet as document text.
    pub async fn build(
        &self,
        query: &NormalizedQuery,
        candidate: &CandidateDocument,
        user_id: &str,
    ) -> FeatureVector {
        let record = match self.catalog.get_by_doc_id(&candidate.doc_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    doc_id = %candidate.doc_id,
                    error = %e,
                    "Catalog lookup failed, using default features"
                );
                None
            }
        };

        let (doc_text, category, doc_embedding) = match &record {
            Some(r) => (r.full_text.as_str(), r.category, r.embedding),
            None => (
                candidate.text_snippet.as_str(),
                Category::default(),
                [0.0; EMBEDDING_DIM],
            ),
        };

        let query_tokens: HashSet<&str> = query.tokens.iter().map(String::as_str).collect();
        let doc_lower = doc_text.to_lowercase();
        let doc_tokens: HashSet<&str> = doc_lower.split_whitespace().collect();

        let query_embedding = query_embedding(&query.tokens);

        FeatureVector {
            query_length: query.original.chars().count(),
            query_token_count: query.token_count,
            user_id_hash: user_hash(user_id),
            doc_length: doc_text.chars().count(),
            doc_category_encoded: category.encoded(),
            query_doc_overlap: jaccard(&query_tokens, &doc_tokens),
            embedding_dot_product: dot(&query_embedding, &doc_embedding),
        }
    }
}

/// 64-bit xxHash with seed 0. Stable across processes and platforms.
pub(crate) fn stable_hash(bytes: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(bytes);
    hasher.finish()
}

pub fn user_hash(user_id: &str) -> u64 {
    stable_hash(user_id.as_bytes()) % USER_HASH_BUCKETS
}

/// |A ∩ B| / |A ∪ B|, or 0 when both sets are empty.
pub fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Per-token hash embedding, average-pooled. Empty input gives the zero vector.
pub fn query_embedding(tokens: &[String]) -> Embedding {
    let mut pooled = [0.0; EMBEDDING_DIM];
    if tokens.is_empty() {
        return pooled;
    }
    for token in tokens {
        let h = stable_hash(token.as_bytes());
        for (i, slot) in pooled.iter_mut().enumerate() {
            let byte = (h >> (i * 8)) & 0xFF;
            *slot += byte as f64 / 255.0 * 2.0 - 1.0;
        }
    }
    let n = tokens.len() as f64;
    for slot in pooled.iter_mut() {
        *slot /= n;
    }
    pooled
}

fn dot(a: &Embedding, b: &Embedding) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
