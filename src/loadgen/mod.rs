/// Synthetic traffic for exercising the pipeline under chaos.
///
/// Drives `SearchPipeline` in-process through named scenarios. Each scenario
/// installs its own chaos rates, then issues requests drawn from its query
/// pool with random users and limits.

pub mod report;
pub mod runner;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::chaos::ChaosConfig;

/// Chance that a request reuses an already-seen user id.
pub const USER_REUSE_PROBABILITY: f64 = 0.01;
pub const MIN_REQUEST_LIMIT: usize = 3;
pub const MAX_REQUEST_LIMIT: usize = 10;

/// A named traffic profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Short name used on the command line
    pub name: String,
    pub title: String,
    pub chaos: ChaosConfig,
    pub queries: Vec<String>,
}

impl Scenario {
    fn new(name: &str, title: &str, chaos: ChaosConfig, queries: &[&str]) -> Self {
        Scenario {
            name: name.to_string(),
            title: title.to_string(),
            chaos,
            queries: queries.iter().map(|q| q.to_string()).collect(),
        }
    }
}

fn rates(
    model: f64,
    external_timeout: f64,
    slow_search: f64,
    external_failure: f64,
) -> ChaosConfig {
    ChaosConfig {
        model_failure_rate: model,
        external_timeout_rate: external_timeout,
        slow_search_rate: slow_search,
        external_failure_rate: external_failure,
    }
}

/// The five predefined scenarios, in run order.
pub fn default_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new(
            "normal",
            "Normal request flow",
            rates(0.005, 0.01, 0.01, 0.01),
            &[
                "machine learning", "neural networks", "deep learning",
                "artificial intelligence", "data science", "supervised learning",
                "reinforcement learning", "gradient descent", "backpropagation",
                "convolutional networks", "transformers", "model training",
            ],
        ),
        Scenario::new(
            "model-failures",
            "Model failures",
            rates(0.8, 0.1, 0.2, 0.05),
            &[
                "python", "javascript", "golang", "rust", "typescript",
                "java", "ruby", "kotlin", "swift", "c++", "scala",
                "php", "perl", "haskell", "elixir",
            ],
        ),
        Scenario::new(
            "slow-search",
            "Slow search",
            rates(0.05, 0.1, 0.9, 0.05),
            &[
                "kubernetes", "docker", "containers", "microservices",
                "orchestration", "cloud native", "service mesh", "istio",
                "helm", "rancher", "openshift", "deployment",
            ],
        ),
        Scenario::new(
            "correlation",
            "Log and trace correlation",
            rates(0.5, 0.1, 0.2, 0.1),
            &[
                "testing", "debugging", "monitoring", "observability",
                "tracing", "logging", "instrumentation", "telemetry",
                "metrics", "alerts", "dashboards", "visualization",
            ],
        ),
        Scenario::new(
            "health",
            "Service health monitoring",
            rates(0.01, 0.02, 0.01, 0.02),
            &[
                "monitoring", "metrics", "performance", "reliability",
                "availability", "latency", "throughput", "scalability",
                "uptime", "slo", "sli", "error rate", "apdex", "percentiles",
            ],
        ),
    ]
}

/// Hands out user ids: mostly fresh, occasionally a repeat.
#[derive(Debug, Default)]
pub struct UserIdPool {
    seen: Vec<String>,
}

impl UserIdPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id<R: Rng + ?Sized>(&mut self, rng: &mut R) -> String {
        if !self.seen.is_empty() && rng.gen::<f64>() < USER_REUSE_PROBABILITY {
            let idx = rng.gen_range(0..self.seen.len());
            return self.seen[idx].clone();
        }
        let id = format!("mock_user_{}", rng.gen_range(1_000_000..=9_999_999u32));
        self.seen.push(id.clone());
        id
    }

    /// Number of distinct ids handed out so far (fresh ids may collide).
    pub fn issued(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_scenarios_are_valid() {
        let scenarios = default_scenarios();
        assert_eq!(scenarios.len(), 5);
        for s in &scenarios {
            assert!(s.chaos.validate().is_ok(), "{} has invalid rates", s.name);
            assert!(!s.queries.is_empty());
        }
        let names: Vec<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["normal", "model-failures", "slow-search", "correlation", "health"]);
    }

    #[test]
    fn test_user_ids_are_mostly_fresh() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut pool = UserIdPool::new();
        let ids: Vec<String> = (0..1000).map(|_| pool.next_id(&mut rng)).collect();

        for id in &ids {
            let digits = id.strip_prefix("mock_user_").expect("prefix");
            assert_eq!(digits.len(), 7);
            assert!(digits.chars().all(|c| c.is_ascii_digit()));
        }
        // Reuses never grow the pool; with p=0.01 nearly every draw is fresh.
        assert!(pool.issued() <= 1000);
        assert!(pool.issued() > 950, "issued {}", pool.issued());
    }
}
