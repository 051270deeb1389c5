//! Themis - alt-text accessibility compliance evaluation service
//!
//! Binary entry point: resolves CLI and environment configuration, opens the
//! configured storage backend, constructs the model-backed evaluator and
//! serves the HTTP API.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use themis::api::{serve, AppState};
use themis::config::{self, ServiceConfig};
use themis::services::{EvaluatorConfig, OpenAiEvaluator};
use themis::storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "themis",
    about = "Alt-text accessibility compliance evaluation service",
    version
)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Postgres connection string; omit to use the embedded SQLite backend
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// SQLite database file path
    #[arg(long, env = "ALT_DB_PATH", default_value = config::DEFAULT_DB_PATH)]
    db_path: String,

    /// Model identifier for the evaluation provider
    #[arg(long, env = "OPENAI_MODEL", default_value = config::DEFAULT_MODEL)]
    model: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ServiceConfig {
        port: cli.port,
        database_url: cli.database_url.filter(|url| !url.is_empty()),
        db_path: cli.db_path,
        model: cli.model,
    };

    let store = storage::connect(&config)
        .await
        .context("failed to open storage backend")?;

    let api_key = config::openai_api_key().context("model provider credential missing")?;
    let evaluator = OpenAiEvaluator::new(EvaluatorConfig {
        api_key,
        model: config.model.clone(),
        ..EvaluatorConfig::default()
    })?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting evaluation service on port {}", config.port);

    serve(
        AppState {
            store,
            evaluator: Arc::new(evaluator),
        },
        addr,
    )
    .await
}
