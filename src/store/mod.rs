/// Document catalog abstraction layer
///
/// Provides the DocumentCatalog trait: keyed lookup of document records and a
/// full-text query returning hits in the backend's native relevance order.
/// The pipeline only reads from the catalog; writes exist for bootstrap/seeding.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::SignalError;

pub mod seed;
pub mod sqlite;

/// Dimension of the mock document and query embeddings.
pub const EMBEDDING_DIM: usize = 8;

pub type Embedding = [f64; EMBEDDING_DIM];

/// Fixed document categories. Declaration order is the feature encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    MachineLearning,
    DataScience,
    WebDevelopment,
    CloudComputing,
    Cybersecurity,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::MachineLearning,
        Category::DataScience,
        Category::WebDevelopment,
        Category::CloudComputing,
        Category::Cybersecurity,
    ];

    /// Integer encoding 0..=4 used as a model feature.
    pub fn encoded(&self) -> u8 {
        match self {
            Category::MachineLearning => 0,
            Category::DataScience => 1,
            Category::WebDevelopment => 2,
            Category::CloudComputing => 3,
            Category::Cybersecurity => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::MachineLearning => "machine_learning",
            Category::DataScience => "data_science",
            Category::WebDevelopment => "web_development",
            Category::CloudComputing => "cloud_computing",
            Category::Cybersecurity => "cybersecurity",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::MachineLearning
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

/// A catalog document with everything the feature builder needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub title: String,
    pub full_text: String,
    pub category: Category,
    pub embedding: Embedding,
}

/// One full-text hit in native index order.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub doc_id: String,
    pub title: String,
    pub text: String,
    /// Native relevance rank (FTS5 BM25: negative, closer to zero is better)
    pub rank: f64,
}

/// Core abstraction for the document catalog.
///
/// All implementations must be Send + Sync to support concurrent access
/// from per-candidate scoring tasks.
#[async_trait]
pub trait DocumentCatalog: Send + Sync {
    /// Look up a single document record.
    async fn get_by_doc_id(&self, doc_id: &str) -> Result<Option<DocumentRecord>, SignalError>;

    /// Disjunctive full-text query over `tokens`, best native rank first.
    ///
    /// An empty token slice returns no hits.
    async fn search(
        &self,
        tokens: &[String],
        max_results: usize,
    ) -> Result<Vec<IndexHit>, SignalError>;

    /// Insert or replace a document (bootstrap only).
    async fn insert(&self, doc: &DocumentRecord) -> Result<(), SignalError>;

    /// Number of documents in the catalog.
    async fn count(&self) -> Result<u64, SignalError>;

    /// Remove every document (used by `seed --reset`).
    async fn clear(&self) -> Result<(), SignalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_encoding_follows_declaration_order() {
        let encoded: Vec<u8> = Category::ALL.iter().map(|c| c.encoded()).collect();
        assert_eq!(encoded, vec![0, 1, 2, 3, 4]);
        assert_eq!(Category::default().encoded(), 0);
    }

    #[test]
    fn test_category_string_round_trip() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>(), Ok(c));
        }
        assert!("gardening".parse::<Category>().is_err());
    }
}
