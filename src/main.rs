use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use signalrank::chaos::ChaosController;
use signalrank::config::Config;
use signalrank::external::WikipediaClient;
use signalrank::logging;
use signalrank::pipeline::{SearchPipeline, SearchRequest};
use signalrank::server::SearchService;
use signalrank::store::seed::seed_catalog;
use signalrank::store::sqlite::SqliteCatalog;
use signalrank::store::DocumentCatalog;
use signalrank::telemetry::{ServiceMetrics, TracingObserver};
use rmcp::ServiceExt;

#[derive(Parser)]
#[command(name = "signalrank", version, about = "Signal-fusion search ranking MCP server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert the built-in document set into the catalog and exit
    Seed {
        /// Delete every existing document first
        #[arg(long)]
        reset: bool,
    },
    /// Run a single search and print the JSON response
    Query {
        /// Query text
        query: String,
        #[arg(long, default_value = "cli_user")]
        user_id: String,
        /// Maximum results (defaults to search.default_limit)
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Open the catalog and build the pipeline around it.
async fn build_pipeline(
    config: &Config,
) -> Result<(Arc<SearchPipeline>, Arc<dyn DocumentCatalog>)> {
    let catalog: Arc<dyn DocumentCatalog> = Arc::new(SqliteCatalog::new(&config.db_path).await?);
    tracing::info!(db_path = %config.db_path, "SQLite catalog initialized");

    if config.seed_on_startup {
        seed_catalog(catalog.as_ref(), false).await?;
    }

    let knowledge = Arc::new(WikipediaClient::new(&config.external)?);
    let pipeline = SearchPipeline::from_config(
        config,
        Arc::clone(&catalog),
        knowledge,
        Arc::new(ChaosController::new(config.chaos)),
        Arc::new(TracingObserver),
        Arc::new(ServiceMetrics::default()),
    );
    Ok((Arc::new(pipeline), catalog))
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args
    let cli = Cli::parse();

    // 2. Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Config error (using defaults): {}", e);
        Config::default()
    });

    // 3. Initialize logging FIRST (before any other output)
    // CRITICAL: logging goes to stderr only, stdout is reserved for JSON-RPC
    logging::init_logging(&config);

    // 4. Handle subcommands
    match cli.command {
        Some(Commands::Seed { reset }) => {
            let catalog = SqliteCatalog::new(&config.db_path).await?;
            let inserted = seed_catalog(&catalog, reset).await?;
            let total = catalog.count().await?;
            println!("Inserted {} documents ({} in catalog).", inserted, total);
        }

        Some(Commands::Query { query, user_id, limit }) => {
            let (pipeline, _catalog) = build_pipeline(&config).await?;
            let response = pipeline.search(&SearchRequest::new(query, user_id, limit)).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        None => {
            // Default: start the MCP server
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                "signalrank server starting"
            );

            let (pipeline, catalog) = build_pipeline(&config).await?;
            tracing::info!(
                model_version = pipeline.model_version(),
                workers = config.model.workers,
                request_timeout_ms = config.pipeline.request_timeout_ms,
                "Search pipeline ready"
            );

            let service = SearchService::new(pipeline, catalog);

            // Serve via stdio transport
            let (stdin, stdout) = rmcp::transport::io::stdio();
            let server = service.serve((stdin, stdout)).await?;

            tracing::info!("signalrank server running, awaiting tool calls via stdio");

            // Wait for shutdown (client disconnects or signal)
            server.waiting().await?;

            tracing::info!("signalrank server stopped");
        }
    }

    Ok(())
}
