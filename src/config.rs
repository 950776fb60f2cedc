/// Configuration management using figment
///
/// Loads configuration with this precedence (highest wins):
/// 1. Defaults (hardcoded)
/// 2. TOML file: signalrank.toml (in working directory)
/// 3. Environment variables: prefixed SIGNALRANK_, nested with `__`
///    (e.g., SIGNALRANK_LOG_LEVEL=debug, SIGNALRANK_CHAOS__MODEL_FAILURE_RATE=0.5)

use figment::{
    Figment,
    providers::{Env, Format, Toml, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::chaos::ChaosConfig;
use crate::errors::SignalError;

const DEFAULT_STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "be", "been",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// SQLite catalog path. Supports the sqlite:// URI scheme and sqlite::memory:.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Insert the built-in document set when the catalog is empty at startup
    #[serde(default = "default_true")]
    pub seed_on_startup: bool,

    /// Words dropped by the query normalizer
    #[serde(default = "default_stopwords")]
    pub stopwords: Vec<String>,

    /// Initial chaos rates; replaceable at runtime through the chaos controller
    #[serde(default)]
    pub chaos: ChaosConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub external: ExternalConfig,

    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Lexical index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Artificial delay applied when the slow-search chaos trial fires
    #[serde(default = "default_slow_threshold_ms")]
    pub slow_threshold_ms: u64,
    /// Limit used when a request does not name one
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Largest accepted request limit
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            slow_threshold_ms: default_slow_threshold_ms(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

/// Mock ranking model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_version")]
    pub version: String,
    /// Nominal inference timeout; slow inferences are stretched to 80% of it
    #[serde(default = "default_model_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: u64,
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
    /// Probability of a slow inference
    #[serde(default = "default_slow_inference_rate")]
    pub slow_inference_rate: f64,
    /// Maximum number of candidates scored concurrently per request
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            version: default_model_version(),
            timeout_ms: default_model_timeout_ms(),
            min_latency_ms: default_min_latency_ms(),
            max_latency_ms: default_max_latency_ms(),
            slow_inference_rate: default_slow_inference_rate(),
            workers: default_workers(),
        }
    }
}

/// External knowledge lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    /// Name reported as ExternalSignal.source
    #[serde(default = "default_external_source")]
    pub source: String,
    #[serde(default = "default_external_base_url")]
    pub base_url: String,
    #[serde(default = "default_external_timeout_ms")]
    pub timeout_ms: u64,
    /// Topic used when the query has no tokens
    #[serde(default = "default_topic")]
    pub default_topic: String,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        ExternalConfig {
            source: default_external_source(),
            base_url: default_external_base_url(),
            timeout_ms: default_external_timeout_ms(),
            default_topic: default_topic(),
        }
    }
}

/// Fusion weights. They are applied as-is and never renormalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_weight_search")]
    pub weight_search: f64,
    #[serde(default = "default_weight_recommendation")]
    pub weight_recommendation: f64,
    #[serde(default = "default_weight_external")]
    pub weight_external: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        RankingConfig {
            weight_search: default_weight_search(),
            weight_recommendation: default_weight_recommendation(),
            weight_external: default_weight_external(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Request-scoped deadline applied to every suspension point
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_path() -> String {
    "sqlite://signalrank.db".to_string()
}

fn default_true() -> bool {
    true
}

fn default_stopwords() -> Vec<String> {
    DEFAULT_STOPWORDS.iter().map(|w| w.to_string()).collect()
}

fn default_slow_threshold_ms() -> u64 {
    500
}

fn default_limit() -> usize {
    10
}

fn default_max_limit() -> usize {
    100
}

fn default_model_version() -> String {
    "mock_v1".to_string()
}

fn default_model_timeout_ms() -> u64 {
    2000
}

fn default_min_latency_ms() -> u64 {
    10
}

fn default_max_latency_ms() -> u64 {
    50
}

fn default_slow_inference_rate() -> f64 {
    0.01
}

fn default_workers() -> usize {
    8
}

fn default_external_source() -> String {
    "wikipedia".to_string()
}

fn default_external_base_url() -> String {
    "https://en.wikipedia.org/api/rest_v1".to_string()
}

fn default_external_timeout_ms() -> u64 {
    5000
}

fn default_topic() -> String {
    "search".to_string()
}

fn default_weight_search() -> f64 {
    0.5
}

fn default_weight_recommendation() -> f64 {
    0.3
}

fn default_weight_external() -> f64 {
    0.2
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            db_path: default_db_path(),
            seed_on_startup: default_true(),
            stopwords: default_stopwords(),
            chaos: ChaosConfig::default(),
            search: SearchConfig::default(),
            model: ModelConfig::default(),
            external: ExternalConfig::default(),
            ranking: RankingConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, TOML file, and environment variables
    ///
    /// Environment variables override TOML file values.
    /// Example: SIGNALRANK_LOG_LEVEL=debug overrides log_level in signalrank.toml
    pub fn load() -> Result<Config, SignalError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("signalrank.toml"))
            .merge(Env::prefixed("SIGNALRANK_").split("__"))
            .extract()
            .map_err(|e| SignalError::Config(format!("Failed to load config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), SignalError> {
        self.chaos
            .validate()
            .map_err(|e| SignalError::Config(e.to_string()))?;
        if self.model.min_latency_ms > self.model.max_latency_ms {
            return Err(SignalError::Config(format!(
                "model.min_latency_ms ({}) exceeds model.max_latency_ms ({})",
                self.model.min_latency_ms, self.model.max_latency_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.model.slow_inference_rate) {
            return Err(SignalError::Config(
                "model.slow_inference_rate must be within [0, 1]".to_string(),
            ));
        }
        if self.model.workers == 0 {
            return Err(SignalError::Config("model.workers must be at least 1".to_string()));
        }
        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            return Err(SignalError::Config(format!(
                "search.default_limit must be within 1..={}",
                self.search.max_limit
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.db_path, "sqlite://signalrank.db");
        assert!(config.seed_on_startup);
        assert_eq!(config.stopwords.len(), 22);
        assert_eq!(config.search.slow_threshold_ms, 500);
        assert_eq!(config.model.version, "mock_v1");
        assert_eq!(config.external.timeout_ms, 5000);
        assert_eq!(config.ranking, RankingConfig {
            weight_search: 0.5,
            weight_recommendation: 0.3,
            weight_external: 0.2,
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_latency_window() {
        let mut config = Config::default();
        config.model.min_latency_ms = 100;
        config.model.max_latency_ms = 10;
        assert!(matches!(config.validate(), Err(SignalError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_chaos() {
        let mut config = Config::default();
        config.chaos.slow_search_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string(
                "log_level = \"debug\"\n\
                 [chaos]\nmodel_failure_rate = 1.0\n\
                 [ranking]\nweight_external = 0.0\n",
            ))
            .extract()
            .expect("config should parse");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.chaos.model_failure_rate, 1.0);
        assert_eq!(config.chaos.slow_search_rate, 0.2);
        assert_eq!(config.ranking.weight_external, 0.0);
        assert_eq!(config.ranking.weight_search, 0.5);
    }
}
