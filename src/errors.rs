/// Domain-specific error types for signalrank
///
/// `SignalError` is the only error a search request can surface to its caller.
/// Per-candidate model errors and external-signal errors live next to their
/// stages and are recovered inside the pipeline.

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// The lexical index could not produce candidates. There is no fallback
    /// ranking without them, so the request fails.
    #[error("Search index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for SignalError {
    fn from(e: sqlx::Error) -> Self {
        SignalError::Storage(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for SignalError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        SignalError::Storage(format!("Migration failed: {}", e))
    }
}

impl SignalError {
    /// Helper to create validation errors with field names
    ///
    /// Example:
    /// ```
    /// use signalrank::errors::SignalError;
    /// let err = SignalError::validation("query", "Query cannot be empty");
    /// assert_eq!(err.kind(), "validation_error");
    /// ```
    pub fn validation(field: &str, message: &str) -> Self {
        SignalError::Validation {
            message: message.to_string(),
            field: Some(field.to_string()),
        }
    }

    /// Stable machine-readable error kind, returned to callers alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            SignalError::Validation { .. } => "validation_error",
            SignalError::IndexUnavailable(_) => "index_unavailable",
            SignalError::Storage(_) => "storage_error",
            SignalError::Config(_) => "config_error",
            SignalError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_helper_sets_field() {
        match SignalError::validation("limit", "out of range") {
            SignalError::Validation { message, field } => {
                assert_eq!(message, "out of range");
                assert_eq!(field.as_deref(), Some("limit"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_kinds_are_stable() {
        assert_eq!(SignalError::IndexUnavailable("x".into()).kind(), "index_unavailable");
        assert_eq!(SignalError::Storage("x".into()).kind(), "storage_error");
        assert_eq!(SignalError::Config("x".into()).kind(), "config_error");
        assert_eq!(SignalError::Internal("x".into()).kind(), "internal_error");
    }
}
