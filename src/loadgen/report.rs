/// Per-scenario traffic report: success rate, degradation and latency.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chaos::ChaosConfig;

/// Outcome of one generated request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub success: bool,
    /// Succeeded, but some signal was missing
    pub degraded: bool,
    pub latency_ms: u64,
    pub result_count: usize,
    pub error_kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub chaos: ChaosConfig,
    pub total_requests: usize,
    pub successful: usize,
    pub degraded: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub mean_latency_ms: u64,
    pub p95_latency_ms: u64,
    /// Failure counts by error kind
    pub errors: BTreeMap<String, usize>,
}

/// Build a report. Latency statistics cover every request, failed or not.
pub fn generate_report(
    scenario: &str,
    chaos: ChaosConfig,
    outcomes: &[RequestOutcome],
) -> ScenarioReport {
    let total_requests = outcomes.len();
    let successful = outcomes.iter().filter(|o| o.success).count();
    let degraded = outcomes.iter().filter(|o| o.success && o.degraded).count();

    let mut errors: BTreeMap<String, usize> = BTreeMap::new();
    for o in outcomes.iter().filter(|o| !o.success) {
        let kind = o.error_kind.clone().unwrap_or_else(|| "unknown".to_string());
        *errors.entry(kind).or_insert(0) += 1;
    }

    let success_rate = if total_requests > 0 {
        successful as f64 / total_requests as f64
    } else {
        0.0
    };

    let mut latencies: Vec<u64> = outcomes.iter().map(|o| o.latency_ms).collect();
    let mean_latency_ms = if latencies.is_empty() {
        0
    } else {
        latencies.iter().sum::<u64>() / latencies.len() as u64
    };
    let p95_latency_ms = if latencies.is_empty() {
        0
    } else {
        latencies.sort_unstable();
        let idx = ((0.95 * latencies.len() as f64).ceil() as usize).saturating_sub(1);
        latencies[idx.min(latencies.len() - 1)]
    };

    ScenarioReport {
        scenario: scenario.to_string(),
        chaos,
        total_requests,
        successful,
        degraded,
        failed: total_requests - successful,
        success_rate,
        mean_latency_ms,
        p95_latency_ms,
        errors,
    }
}

/// Print a formatted report to stdout.
pub fn print_report(report: &ScenarioReport) {
    println!("=== Scenario: {} ===", report.scenario);
    println!(
        "Chaos: model failures {:.0}%, external timeouts {:.0}%, \
         slow search {:.0}%, external failures {:.0}%",
        report.chaos.model_failure_rate * 100.0,
        report.chaos.external_timeout_rate * 100.0,
        report.chaos.slow_search_rate * 100.0,
        report.chaos.external_failure_rate * 100.0
    );
    println!("Requests: {}", report.total_requests);
    println!(
        "Successful: {} ({:.1}%), degraded: {}",
        report.successful,
        report.success_rate * 100.0,
        report.degraded
    );
    println!("Failed: {}", report.failed);
    for (kind, count) in &report.errors {
        println!("  {:<20} {}", format!("{}:", kind), count);
    }
    println!(
        "Latency: mean={}ms, p95={}ms",
        report.mean_latency_ms, report.p95_latency_ms
    );
}

/// Print one line per scenario.
pub fn print_summary(reports: &[ScenarioReport]) {
    if reports.is_empty() {
        return;
    }
    println!("=== Summary ===");
    println!(
        "{:<16}| {:>8} | {:>8} | {:>8} | {:>9} | {:>9}",
        "Scenario", "Requests", "Success", "Degraded", "Mean ms", "p95 ms"
    );
    println!("{:-<16}|{:-<10}|{:-<10}|{:-<10}|{:-<11}|{:-<10}", "", "", "", "", "", "");
    for r in reports {
        println!(
            "{:<16}| {:>8} | {:>7.1}% | {:>8} | {:>9} | {:>9}",
            r.scenario,
            r.total_requests,
            r.success_rate * 100.0,
            r.degraded,
            r.mean_latency_ms,
            r.p95_latency_ms
        );
    }
}

/// Success rate across all scenarios combined.
pub fn overall_success_rate(reports: &[ScenarioReport]) -> f64 {
    let total: usize = reports.iter().map(|r| r.total_requests).sum();
    if total == 0 {
        return 0.0;
    }
    let successful: usize = reports.iter().map(|r| r.successful).sum();
    successful as f64 / total as f64
}
