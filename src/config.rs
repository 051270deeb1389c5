//! Configuration for the Themis evaluation service
//!
//! All knobs come from the process environment; the CLI in `main` layers
//! clap's `env`-aware flags on top of the same variables. The model
//! credential is resolved separately so the evaluator can fail fast at
//! construction rather than on the first request.

use crate::error::{Result, ThemisError};
use std::env;
use tracing::debug;

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 5000;

/// Default embedded database file, relative to the working directory
pub const DEFAULT_DB_PATH: &str = "alt_text_evaluations.db";

/// Default model identifier sent to the provider
pub const DEFAULT_MODEL: &str = "gpt-4o-2024-08-06";

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listen port
    pub port: u16,

    /// Postgres connection string; absence selects the embedded backend
    pub database_url: Option<String>,

    /// SQLite file path used when no connection string is configured
    pub db_path: String,

    /// Model identifier sent to the provider
    pub model: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_path: DEFAULT_DB_PATH.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Build a configuration from the process environment
    ///
    /// Reads `PORT`, `DATABASE_URL`, `ALT_DB_PATH` and `OPENAI_MODEL`;
    /// anything unset falls back to its default.
    pub fn from_env() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ThemisError::Config(format!("invalid PORT value: {raw}")))?,
            Err(_) => DEFAULT_PORT,
        };

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        if database_url.is_some() {
            debug!("DATABASE_URL is set, the networked backend will be used");
        }

        Ok(Self {
            port,
            database_url,
            db_path: env::var("ALT_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string()),
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        })
    }
}

/// Fetch the model-provider credential from `OPENAI_API_KEY`
pub fn openai_api_key() -> Result<String> {
    match env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => {
            debug!("Using API key from OPENAI_API_KEY environment variable");
            Ok(key)
        }
        _ => Err(ThemisError::Config(
            "OPENAI_API_KEY not set. Export it before starting the service".to_string(),
        )),
    }
}
