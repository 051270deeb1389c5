//! Error types for the Themis evaluation service
//!
//! This module provides structured error definitions using thiserror. Every
//! failure that can cross the HTTP boundary collapses into one of these
//! variants so the API layer can map it to a status code and a JSON body.

use thiserror::Error;

/// Main error type for Themis operations
#[derive(Error, Debug)]
pub enum ThemisError {
    /// Request input was missing or malformed
    #[error("{0}")]
    Validation(String),

    /// External model call failed or returned unusable content
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Lookup by id found nothing
    #[error("Evaluation not found: {0}")]
    NotFound(i64),

    /// Database operation failed
    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for Themis operations
pub type Result<T> = std::result::Result<T, ThemisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ThemisError::NotFound(42);
        assert_eq!(err.to_string(), "Evaluation not found: 42");
    }

    #[test]
    fn test_validation_message_is_unprefixed() {
        let err = ThemisError::Validation("alt_text is required".to_string());
        assert_eq!(err.to_string(), "alt_text is required");
    }
}
