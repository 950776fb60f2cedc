/// Probabilistic fault injection shared by every pipeline stage.
///
/// The controller holds a single replaceable `ChaosConfig`. Stages read it at the
/// moment they run, not once per request, so two trials inside one request can
/// see different rates when a writer swaps the config in between. Writers replace
/// the whole config at once; a reader never sees a mix of old and new rates.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Failure rates, each a probability in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChaosConfig {
    #[serde(default = "default_model_failure_rate")]
    pub model_failure_rate: f64,
    #[serde(default = "default_external_timeout_rate")]
    pub external_timeout_rate: f64,
    #[serde(default = "default_slow_search_rate")]
    pub slow_search_rate: f64,
    #[serde(default = "default_external_failure_rate")]
    pub external_failure_rate: f64,
}

fn default_model_failure_rate() -> f64 {
    0.05
}

fn default_external_timeout_rate() -> f64 {
    0.1
}

fn default_slow_search_rate() -> f64 {
    0.2
}

fn default_external_failure_rate() -> f64 {
    0.05
}

impl Default for ChaosConfig {
    fn default() -> Self {
        ChaosConfig {
            model_failure_rate: default_model_failure_rate(),
            external_timeout_rate: default_external_timeout_rate(),
            slow_search_rate: default_slow_search_rate(),
            external_failure_rate: default_external_failure_rate(),
        }
    }
}

impl ChaosConfig {
    /// All four rates set to zero.
    pub fn disabled() -> Self {
        ChaosConfig {
            model_failure_rate: 0.0,
            external_timeout_rate: 0.0,
            slow_search_rate: 0.0,
            external_failure_rate: 0.0,
        }
    }

    pub fn rate(&self, kind: ChaosKind) -> f64 {
        match kind {
            ChaosKind::ModelFailure => self.model_failure_rate,
            ChaosKind::ExternalTimeout => self.external_timeout_rate,
            ChaosKind::SlowSearch => self.slow_search_rate,
            ChaosKind::ExternalFailure => self.external_failure_rate,
        }
    }

    /// Boundary check: every rate must be a probability.
    ///
    /// The controller itself accepts whatever it is given.
    pub fn validate(&self) -> Result<(), crate::errors::SignalError> {
        for kind in ChaosKind::ALL {
            let rate = self.rate(kind);
            if !(0.0..=1.0).contains(&rate) {
                return Err(crate::errors::SignalError::validation(
                    kind.config_field(),
                    &format!("{} must be within [0, 1], got {}", kind.config_field(), rate),
                ));
            }
        }
        Ok(())
    }
}

/// The four independent fault kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChaosKind {
    ModelFailure,
    ExternalTimeout,
    SlowSearch,
    ExternalFailure,
}

impl ChaosKind {
    pub const ALL: [ChaosKind; 4] = [
        ChaosKind::ModelFailure,
        ChaosKind::ExternalTimeout,
        ChaosKind::SlowSearch,
        ChaosKind::ExternalFailure,
    ];

    fn index(self) -> usize {
        match self {
            ChaosKind::ModelFailure => 0,
            ChaosKind::ExternalTimeout => 1,
            ChaosKind::SlowSearch => 2,
            ChaosKind::ExternalFailure => 3,
        }
    }

    fn config_field(self) -> &'static str {
        match self {
            ChaosKind::ModelFailure => "model_failure_rate",
            ChaosKind::ExternalTimeout => "external_timeout_rate",
            ChaosKind::SlowSearch => "slow_search_rate",
            ChaosKind::ExternalFailure => "external_failure_rate",
        }
    }
}

impl fmt::Display for ChaosKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChaosKind::ModelFailure => write!(f, "model_failure"),
            ChaosKind::ExternalTimeout => write!(f, "external_timeout"),
            ChaosKind::SlowSearch => write!(f, "slow_search"),
            ChaosKind::ExternalFailure => write!(f, "external_failure"),
        }
    }
}

/// Triggered-event counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosEventCounts {
    pub model_failure: u64,
    pub external_timeout: u64,
    pub slow_search: u64,
    pub external_failure: u64,
}

/// Shared fault-injection controller. Hand it to stages as `Arc<ChaosController>`.
#[derive(Debug)]
pub struct ChaosController {
    config: RwLock<Arc<ChaosConfig>>,
    triggered: [AtomicU64; 4],
}

impl ChaosController {
    pub fn new(config: ChaosConfig) -> Self {
        ChaosController {
            config: RwLock::new(Arc::new(config)),
            triggered: Default::default(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> ChaosConfig {
        // A poisoned lock still holds a complete Arc; keep serving it.
        let guard = self.config.read().unwrap_or_else(|e| e.into_inner());
        **guard
    }

    /// Replace the whole configuration. Last writer wins, no merging.
    pub fn update_config(&self, new_config: ChaosConfig) {
        let mut guard = self.config.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(new_config);
        tracing::info!(
            model_failure_rate = new_config.model_failure_rate,
            external_timeout_rate = new_config.external_timeout_rate,
            slow_search_rate = new_config.slow_search_rate,
            external_failure_rate = new_config.external_failure_rate,
            "Chaos configuration replaced"
        );
    }

    /// Run one Bernoulli trial for `kind` against the rate configured right now.
    ///
    /// Every call draws a fresh uniform value in [0, 1), so trials for different
    /// kinds (or repeated trials of one kind) are independent.
    pub fn should_trigger(&self, kind: ChaosKind) -> bool {
        let rate = self.config().rate(kind);
        let draw: f64 = rand::thread_rng().gen();
        let fired = draw < rate;
        if fired {
            self.triggered[kind.index()].fetch_add(1, Ordering::Relaxed);
            tracing::warn!(chaos.event_type = %kind, rate, "Chaos event triggered");
        }
        fired
    }

    pub fn event_counts(&self) -> ChaosEventCounts {
        let load = |kind: ChaosKind| self.triggered[kind.index()].load(Ordering::Relaxed);
        ChaosEventCounts {
            model_failure: load(ChaosKind::ModelFailure),
            external_timeout: load(ChaosKind::ExternalTimeout),
            slow_search: load(ChaosKind::SlowSearch),
            external_failure: load(ChaosKind::ExternalFailure),
        }
    }
}

impl Default for ChaosController {
    fn default() -> Self {
        ChaosController::new(ChaosConfig::default())
    }
}
