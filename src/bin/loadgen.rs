/// Load generator CLI binary.
///
/// Runs the search pipeline in-process through the predefined chaos scenarios
/// and reports success rate, degradation and latency per scenario.
/// CI integration via --requests (small runs) and --min-success-rate (exit code threshold).

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use signalrank::chaos::ChaosController;
use signalrank::config::Config;
use signalrank::external::WikipediaClient;
use signalrank::loadgen::report::{self, ScenarioReport};
use signalrank::logging;
use signalrank::loadgen::runner::run_scenario;
use signalrank::loadgen::{default_scenarios, UserIdPool};
use signalrank::pipeline::SearchPipeline;
use signalrank::store::seed::seed_catalog;
use signalrank::store::sqlite::SqliteCatalog;
use signalrank::store::DocumentCatalog;
use signalrank::telemetry::{ServiceMetrics, TracingObserver};

const LOADGEN_LOG_LEVEL: &str = "warn";

#[derive(Parser)]
#[command(name = "signalrank-loadgen", about = "Chaos scenario traffic generator for signalrank")]
struct Cli {
    /// Scenario to run: normal, model-failures, slow-search, correlation, health, or "all"
    #[arg(long, default_value = "all")]
    scenario: String,

    /// Requests per scenario
    #[arg(long, default_value_t = 50)]
    requests: usize,

    /// Catalog location; defaults to a private in-memory catalog
    #[arg(long, default_value = "sqlite::memory:")]
    db_path: String,

    /// Upper bound of the random pause between requests, in milliseconds
    #[arg(long, default_value_t = 0)]
    max_pause_ms: u64,

    /// Minimum overall success rate to pass (CI threshold, e.g. 0.95 for 95%)
    #[arg(long)]
    min_success_rate: Option<f64>,

    /// Write all scenario reports as JSON to this file
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // 1. Parse CLI args
    let cli = Cli::parse();

    // 2. Initialize tracing (warn by default so the progress bar stays readable)
    logging::init_logging_at(LOADGEN_LOG_LEVEL);

    // 3. Pick scenarios
    let all_scenarios = default_scenarios();
    let scenarios: Vec<_> = if cli.scenario == "all" {
        all_scenarios.iter().collect()
    } else {
        let found = all_scenarios
            .iter()
            .find(|s| s.name == cli.scenario)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown scenario '{}'. Valid options: normal, model-failures, \
                     slow-search, correlation, health, all",
                    cli.scenario
                )
            })?;
        vec![found]
    };

    // 4. Catalog, seeded if empty
    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Config error (using defaults): {}", e);
        Config::default()
    });
    config.db_path = cli.db_path.clone();

    let catalog: Arc<dyn DocumentCatalog> = Arc::new(SqliteCatalog::new(&config.db_path).await?);
    seed_catalog(catalog.as_ref(), false).await?;
    tracing::info!(documents = catalog.count().await?, "Catalog ready");

    // 5. Pipeline; chaos rates are replaced per scenario
    let pipeline = SearchPipeline::from_config(
        &config,
        catalog,
        Arc::new(WikipediaClient::new(&config.external)?),
        Arc::new(ChaosController::new(config.chaos)),
        Arc::new(TracingObserver),
        Arc::new(ServiceMetrics::default()),
    );

    println!("=== signalrank load generator ===");
    println!("Scenarios: {}", scenarios.len());
    println!("Requests per scenario: {}", cli.requests);
    println!();

    // 6. Run each scenario
    let mut users = UserIdPool::new();
    let mut reports: Vec<ScenarioReport> = Vec::new();
    for scenario in &scenarios {
        println!("--- Running scenario: {} ({}) ---", scenario.name, scenario.title);
        let outcomes = run_scenario(
            &pipeline,
            scenario,
            cli.requests,
            &mut users,
            Duration::from_millis(cli.max_pause_ms),
        )
        .await;

        let report = report::generate_report(&scenario.name, scenario.chaos, &outcomes);
        report::print_report(&report);
        println!();
        reports.push(report);
    }

    // 7. Summary across scenarios
    if reports.len() > 1 {
        report::print_summary(&reports);
        println!();
    }
    println!("Distinct users issued: {}", users.issued());

    if let Some(path) = &cli.output {
        std::fs::write(path, serde_json::to_string_pretty(&reports)?)?;
        tracing::info!(path = %path.display(), "Reports saved");
    }

    // 8. CI threshold check
    if let Some(threshold) = cli.min_success_rate {
        let overall = report::overall_success_rate(&reports);
        if overall < threshold {
            eprintln!(
                "FAIL: success rate {:.1}% < threshold {:.1}%",
                overall * 100.0,
                threshold * 100.0
            );
            std::process::exit(1);
        } else {
            println!(
                "PASS: success rate {:.1}% >= threshold {:.1}%",
                overall * 100.0,
                threshold * 100.0
            );
        }
    }

    Ok(())
}
