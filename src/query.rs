/// Query normalization: raw text to a canonical token sequence plus intent.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Coarse classification of what the user is after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    /// Three or more meaningful tokens
    Search,
    /// Short, exploratory query (at most two tokens)
    Discovery,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::Search => "search",
            QueryIntent::Discovery => "discovery",
        }
    }
}

/// A parsed query, created once per request and shared read-only by every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedQuery {
    /// Raw query as received
    pub original: String,
    /// Lowercased, trimmed query
    pub normalized: String,
    /// Tokens in query order (duplicates kept)
    pub tokens: Vec<String>,
    pub intent: QueryIntent,
    pub token_count: usize,
}

/// Tokens of two or fewer mean the user is browsing rather than searching.
const DISCOVERY_MAX_TOKENS: usize = 2;

pub struct QueryNormalizer {
    stopwords: HashSet<String>,
}

impl QueryNormalizer {
    pub fn new<I, S>(stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        QueryNormalizer {
            stopwords: stopwords
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// Normalize a query. Never fails; an input without any word characters
    /// produces an empty token list.
    pub fn parse(&self, raw: &str) -> NormalizedQuery {
        let normalized = raw.trim().to_lowercase();
        let tokens = tokenize(&normalized);

        let mut filtered: Vec<String> = tokens
            .iter()
            .filter(|t| !self.stopwords.contains(t.as_str()) && t.chars().count() > 1)
            .cloned()
            .collect();

        // A query made only of stop-words keeps its raw tokenization.
        if filtered.is_empty() {
            filtered = tokens;
        }

        let intent = if filtered.len() <= DISCOVERY_MAX_TOKENS {
            QueryIntent::Discovery
        } else {
            QueryIntent::Search
        };

        NormalizedQuery {
            original: raw.to_string(),
            normalized,
            token_count: filtered.len(),
            tokens: filtered,
            intent,
        }
    }
}

/// Maximal runs of alphanumeric or underscore characters. Everything else separates.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> QueryNormalizer {
        QueryNormalizer::new(crate::config::Config::default().stopwords)
    }

    #[test]
    fn test_lowercases_and_strips_punctuation() {
        let q = normalizer().parse("  Machine-Learning, RUST!  ");
        assert_eq!(q.normalized, "machine-learning, rust!");
        assert_eq!(q.tokens, vec!["machine", "learning", "rust"]);
        assert_eq!(q.original, "  Machine-Learning, RUST!  ");
        assert_eq!(q.token_count, 3);
    }

    #[test]
    fn test_stopwords_and_single_chars_dropped() {
        let q = normalizer().parse("the history of a C compiler");
        assert_eq!(q.tokens, vec!["history", "compiler"]);
    }

    #[test]
    fn test_all_stopwords_fall_back_to_raw_tokens() {
        let q = normalizer().parse("the and or");
        assert_eq!(q.tokens, vec!["the", "and", "or"]);
        assert_eq!(q.intent, QueryIntent::Search);
    }

    #[test]
    fn test_intent_thresholds() {
        let n = normalizer();
        assert_eq!(n.parse("ai").intent, QueryIntent::Discovery);
        assert_eq!(n.parse("machine learning").intent, QueryIntent::Discovery);
        let q = n.parse("deep learning systems today");
        assert_eq!(q.token_count, 4);
        assert_eq!(q.intent, QueryIntent::Search);
    }

    #[test]
    fn test_tokens_non_empty_when_alphanumeric_present() {
        let n = normalizer();
        for raw in ["a", "c++", "#1", "x_y", "... ok ...", "the"] {
            assert!(!n.parse(raw).tokens.is_empty(), "no tokens for {:?}", raw);
        }
        assert!(n.parse("!!! ???").tokens.is_empty());
    }

    #[test]
    fn test_duplicates_and_order_preserved() {
        let q = normalizer().parse("rust tokio rust");
        assert_eq!(q.tokens, vec!["rust", "tokio", "rust"]);
        assert_eq!(q.intent, QueryIntent::Search);
    }

    #[test]
    fn test_underscore_and_unicode_are_word_characters() {
        assert_eq!(tokenize("snake_case über-cool"), vec!["snake_case", "über", "cool"]);
    }
}
