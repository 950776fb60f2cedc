/// Structured logging setup using tracing
///
/// CRITICAL: Writes to stderr ONLY (never stdout). stdout carries the MCP
/// JSON-RPC stream in serve mode, the JSON response in query mode and the
/// scenario reports in the load generator.
/// Auto-detects format: human-readable with ANSI colors when stderr is a terminal,
/// structured JSON when piped/redirected.

use std::io::IsTerminal;
use tracing_subscriber::{
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use crate::config::Config;

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Dependencies whose per-query chatter would bury the pipeline's own events.
/// The catalog issues one sqlx statement per candidate lookup.
const QUIET_DEPENDENCIES: &[&str] = &[
    "sqlx=warn",
    "hyper=warn",
    "hyper_util=warn",
    "reqwest=warn",
];

/// Initialize tracing for the server and CLI at config.log_level.
///
/// RUST_LOG env var can override at runtime
pub fn init_logging(config: &Config) {
    init_logging_at(&config.log_level);
}

/// Initialize tracing at `level` (the load generator runs at warn so its
/// progress bar stays readable).
pub fn init_logging_at(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(level)));

    if std::io::stderr().is_terminal() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
            )
            .init();
    }
}

/// Default filter: `level` for everything, with noisy dependencies held at warn
/// unless `level` is already stricter. An unknown level falls back to info.
pub fn filter_directives(level: &str) -> String {
    let level = level.trim().to_lowercase();
    let level = if LEVELS.contains(&level.as_str()) {
        level
    } else {
        eprintln!("Unknown log_level '{}', using info", level);
        "info".to_string()
    };

    if matches!(level.as_str(), "warn" | "error" | "off") {
        return level;
    }
    std::iter::once(level.as_str())
        .chain(QUIET_DEPENDENCIES.iter().copied())
        .collect::<Vec<_>>()
        .join(",")
}
