use rmcp::{
    ServerHandler,
    tool,
    model::{ServerCapabilities, Implementation, ProtocolVersion, CallToolResult},
    handler::server::wrapper::Parameters,
    ErrorData as McpError,
};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::chaos::ChaosConfig;
use crate::errors::SignalError;
use crate::pipeline::{SearchPipeline, SearchRequest};
use crate::store::DocumentCatalog;

pub struct SearchService {
    pipeline: Arc<SearchPipeline>,
    catalog: Arc<dyn DocumentCatalog>,
    start_time: Instant,
}

impl SearchService {
    pub fn new(pipeline: Arc<SearchPipeline>, catalog: Arc<dyn DocumentCatalog>) -> Self {
        Self {
            pipeline,
            catalog,
            start_time: Instant::now(),
        }
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

// Parameter structs

/// Full replacement chaos configuration. All four rates are required.
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ChaosConfigParams {
    /// Probability in [0, 1] that a model inference fails
    pub model_failure_rate: f64,
    /// Probability in [0, 1] that the external lookup stalls past its timeout
    pub external_timeout_rate: f64,
    /// Probability in [0, 1] that lexical search is artificially slowed
    pub slow_search_rate: f64,
    /// Probability in [0, 1] that the external lookup fails outright
    pub external_failure_rate: f64,
}

impl From<ChaosConfigParams> for ChaosConfig {
    fn from(p: ChaosConfigParams) -> Self {
        ChaosConfig {
            model_failure_rate: p.model_failure_rate,
            external_timeout_rate: p.external_timeout_rate,
            slow_search_rate: p.slow_search_rate,
            external_failure_rate: p.external_failure_rate,
        }
    }
}

// Helper: convert SignalError to CallToolResult with isError: true
fn signal_error_to_result(err: SignalError) -> CallToolResult {
    let kind = err.kind();
    match err {
        SignalError::Validation { message, field } => {
            let mut obj = json!({
                "isError": true,
                "kind": kind,
                "error": message,
            });
            if let Some(f) = field {
                obj["field"] = json!(f);
            }
            CallToolResult::structured_error(obj)
        }
        other => CallToolResult::structured_error(json!({
            "isError": true,
            "kind": kind,
            "error": other.to_string()
        })),
    }
}

// Tool implementations
#[rmcp::tool_router]
impl SearchService {
    #[tool(description = "Search the document catalog. Fuses lexical relevance, a per-user model score and an external knowledge signal into one ranked list, with a per-component score explanation for every result.")]
    async fn search(
        &self,
        Parameters(request): Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(
            tool = "search",
            user_id = %request.user_id,
            limit = ?request.limit,
            "Tool called"
        );

        match self.pipeline.search(&request).await {
            Ok(response) => match serde_json::to_value(&response) {
                Ok(value) => Ok(CallToolResult::structured(value)),
                Err(e) => Ok(signal_error_to_result(SignalError::Internal(format!(
                    "Failed to serialize response: {}",
                    e
                )))),
            },
            Err(e) => Ok(signal_error_to_result(e)),
        }
    }

    #[tool(description = "Get the current chaos (fault injection) rates")]
    async fn get_chaos_config(&self) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "get_chaos_config", "Tool called");

        Ok(CallToolResult::structured(json!({
            "config": self.pipeline.chaos().config(),
            "message": "Current chaos configuration"
        })))
    }

    #[tool(description = "Replace all chaos (fault injection) rates at once. Every rate must be within [0, 1]; takes effect for stages that run after the update.")]
    async fn update_chaos_config(
        &self,
        Parameters(params): Parameters<ChaosConfigParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "update_chaos_config", "Tool called");

        let config = ChaosConfig::from(params);
        if let Err(e) = config.validate() {
            return Ok(signal_error_to_result(e));
        }
        self.pipeline.chaos().update_config(config);

        Ok(CallToolResult::structured(json!({
            "config": config,
            "message": "Chaos configuration updated successfully"
        })))
    }

    #[tool(description = "Get service counters: queries by intent, model predictions and external lookups by outcome, request totals, per-stage and inference timings, score distribution and chaos events by kind")]
    async fn get_metrics(&self) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "get_metrics", "Tool called");

        Ok(CallToolResult::structured(json!({
            "service": self.pipeline.metrics().snapshot(),
            "chaos_events": self.pipeline.chaos().event_counts(),
            "model_version": self.pipeline.model_version(),
        })))
    }

    #[tool(description = "Check server health and status")]
    async fn health_check(
        &self,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "health_check", "Tool called");

        let response = match self.catalog.count().await {
            Ok(count) => json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "uptime_seconds": self.uptime_seconds(),
                "document_count": count,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Catalog unreachable during health check");
                json!({
                    "status": "degraded",
                    "version": env!("CARGO_PKG_VERSION"),
                    "uptime_seconds": self.uptime_seconds(),
                    "error": e.to_string(),
                })
            }
        };

        Ok(CallToolResult::structured(response))
    }
}

// ServerHandler implementation
#[rmcp::tool_handler(router = Self::tool_router())]
impl ServerHandler for SearchService {
    fn get_info(&self) -> rmcp::model::InitializeResult {
        rmcp::model::InitializeResult {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "signalrank".to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some(
                    "Signal-fusion search ranking with per-stage chaos injection".to_string(),
                ),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Search ranking server. Tools: search, get_chaos_config, update_chaos_config, \
                 get_metrics, health_check."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_carries_kind_and_field() {
        let error = SignalError::validation("limit", "limit must be between 1 and 100");
        let result = signal_error_to_result(error);
        let body = result.structured_content.expect("structured content");
        assert_eq!(body["kind"], "validation_error");
        assert_eq!(body["field"], "limit");
        assert_eq!(body["isError"], true);
    }

    #[test]
    fn test_index_error_carries_kind() {
        let result = signal_error_to_result(SignalError::IndexUnavailable("fts offline".into()));
        let body = result.structured_content.expect("structured content");
        assert_eq!(body["kind"], "index_unavailable");
        assert!(body["error"].as_str().unwrap().contains("fts offline"));
    }

    #[test]
    fn test_params_convert_field_by_field() {
        let config = ChaosConfig::from(ChaosConfigParams {
            model_failure_rate: 0.1,
            external_timeout_rate: 0.2,
            slow_search_rate: 0.3,
            external_failure_rate: 0.4,
        });
        assert_eq!(config.rate(crate::chaos::ChaosKind::SlowSearch), 0.3);
        assert_eq!(config.external_failure_rate, 0.4);
    }
}
