//! Services layer for the Themis evaluation service
//!
//! Provides the injectable evaluation seam and its model-backed implementation.

pub mod evaluator;

pub use evaluator::{Evaluator, EvaluatorConfig, OpenAiEvaluator};
