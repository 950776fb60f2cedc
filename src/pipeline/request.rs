/// Request and response shapes for one search.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::SignalError;
use crate::query::{NormalizedQuery, QueryIntent};
use crate::search::RankedResult;
use crate::telemetry::Stage;

pub const MAX_QUERY_CHARS: usize = 500;
pub const MAX_USER_ID_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchRequest {
    /// Search query text (1-500 characters)
    pub query: String,
    /// Caller identity used for personalization (1-100 characters)
    pub user_id: String,
    /// Maximum results to return (default 10)
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, user_id: impl Into<String>, limit: Option<usize>) -> Self {
        SearchRequest {
            query: query.into(),
            user_id: user_id.into(),
            limit,
        }
    }

    /// Check field bounds and resolve the effective limit.
    pub fn validate(&self, default_limit: usize, max_limit: usize) -> Result<usize, SignalError> {
        let query_chars = self.query.chars().count();
        if query_chars == 0 || self.query.trim().is_empty() {
            return Err(SignalError::validation("query", "Query cannot be empty"));
        }
        if query_chars > MAX_QUERY_CHARS {
            return Err(SignalError::validation(
                "query",
                &format!("Query exceeds {} characters", MAX_QUERY_CHARS),
            ));
        }

        let user_chars = self.user_id.chars().count();
        if user_chars == 0 || user_chars > MAX_USER_ID_CHARS {
            return Err(SignalError::validation(
                "user_id",
                &format!("user_id must be 1-{} characters", MAX_USER_ID_CHARS),
            ));
        }

        let limit = self.limit.unwrap_or(default_limit);
        if limit == 0 || limit > max_limit {
            return Err(SignalError::validation(
                "limit",
                &format!("limit must be between 1 and {}", max_limit),
            ));
        }
        Ok(limit)
    }
}

/// Query details echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub normalized: String,
    pub tokens: Vec<String>,
    pub intent: QueryIntent,
    pub token_count: usize,
}

impl From<&NormalizedQuery> for ParsedQuery {
    fn from(q: &NormalizedQuery) -> Self {
        ParsedQuery {
            normalized: q.normalized.clone(),
            tokens: q.tokens.clone(),
            intent: q.intent,
            token_count: q.token_count,
        }
    }
}

/// A signal that was missing from this response, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Degradation {
    pub stage: Stage,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub latency_ms: u64,
    pub model_version: String,
    /// Stages that contributed to the results, in pipeline order
    pub components_called: Vec<Stage>,
    #[serde(default)]
    pub degradation: Vec<Degradation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub parsed_query: ParsedQuery,
    pub results: Vec<RankedResult>,
    pub meta: ResponseMeta,
}

impl SearchResponse {
    pub fn is_degraded(&self) -> bool {
        !self.meta.degradation.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: SignalError) -> Option<String> {
        match err {
            SignalError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_limit_defaults_and_bounds() {
        assert_eq!(SearchRequest::new("rust", "u1", None).validate(10, 100).unwrap(), 10);
        assert_eq!(SearchRequest::new("rust", "u1", Some(100)).validate(10, 100).unwrap(), 100);
        for bad in [0, 101] {
            let err = SearchRequest::new("rust", "u1", Some(bad)).validate(10, 100).unwrap_err();
            assert_eq!(field_of(err).as_deref(), Some("limit"));
        }
    }

    #[test]
    fn test_query_bounds() {
        for bad in ["".to_string(), "   \t".to_string(), "q".repeat(501)] {
            let err = SearchRequest::new(bad, "u1", None).validate(10, 100).unwrap_err();
            assert_eq!(field_of(err).as_deref(), Some("query"));
        }
        assert!(SearchRequest::new("é".repeat(500), "u1", None).validate(10, 100).is_ok());
    }

    #[test]
    fn test_user_id_bounds() {
        for bad in ["".to_string(), "u".repeat(101)] {
            let err = SearchRequest::new("rust", bad, None).validate(10, 100).unwrap_err();
            assert_eq!(field_of(err).as_deref(), Some("user_id"));
        }
    }

    #[test]
    fn test_missing_limit_deserializes() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"query":"rust","user_id":"u1"}"#).unwrap();
        assert_eq!(req.limit, None);
    }
}
