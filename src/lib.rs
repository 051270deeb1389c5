//! Themis - Alt-Text Accessibility Compliance Evaluation Service
//!
//! Accepts an image plus its alternative text, delegates the compliance
//! judgment to an external vision-capable language model, normalizes the
//! model's JSON verdict, and persists every evaluation for later retrieval
//! and aggregate statistics.
//!
//! # Architecture
//!
//! The system is organized into several layers:
//! - **Types**: grade/image-type enumerations, the ordinal table, record shapes
//! - **Services**: the injectable `Evaluator` seam and its OpenAI-backed implementation
//! - **Storage**: `EvaluationStore` with SQLite (embedded) and Postgres backends
//! - **Api**: axum HTTP surface mapping requests onto the two layers above
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use themis::api::{serve, AppState};
//! use themis::config::ServiceConfig;
//! use themis::{storage, OpenAiEvaluator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServiceConfig::from_env()?;
//!     let store = storage::connect(&config).await?;
//!     let evaluator = Arc::new(OpenAiEvaluator::with_default()?);
//!
//!     serve(
//!         AppState { store, evaluator },
//!         ([0, 0, 0, 0], config.port).into(),
//!     )
//!     .await
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use error::{Result, ThemisError};
pub use services::{Evaluator, EvaluatorConfig, OpenAiEvaluator};
pub use storage::{postgres::PostgresStore, sqlite::SqliteStore, EvaluationStore};
pub use types::{
    compliant_ordinal, AggregateStats, EvaluationRecord, EvaluationResult, Grade, ImageType,
};
