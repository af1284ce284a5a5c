//! Domain errors for the reqsmith generation pipeline.

use thiserror::Error;

/// Domain-level errors that can occur while generating, caching or refining
/// requirement bundles.
///
/// Only [`DomainError::Configuration`] and [`DomainError::SchemaValidation`]
/// are expected to reach an end user. Store write races are resolved inside
/// the store adapter and degenerate similarity values are folded into a cache
/// miss, so neither has a variant here.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Missing or invalid settings, surfaced at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Model output still failed validation after the repair budget.
    #[error("Schema validation failed after {attempts} attempt(s): {message}")]
    SchemaValidation {
        /// Validation attempts made, including the first call.
        attempts: u32,
        /// Last validation error.
        message: String,
    },

    /// The embedding call failed or returned a vector of the wrong size.
    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// A generate, critique or refine call failed.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// A quality scorer failed or returned out-of-range scores.
    #[error("Scoring failed: {0}")]
    ScoringFailed(String),

    /// Invalid input, such as an epic without text.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Store query or transaction failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// JSON encoding or decoding failure.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Writing run artifacts to disk failed.
    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// An external call exceeded the per-call deadline.
    #[error("{operation} timed out after {limit_ms}ms")]
    Timeout {
        /// Name of the bounded call, e.g. `generate`.
        operation: String,
        /// Deadline in milliseconds.
        limit_ms: u64,
    },

    /// The caller cancelled the run.
    #[error("Run cancelled")]
    Cancelled,
}

/// Result alias used across the domain and its ports.
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Whether this error must abort a refinement run instead of being
    /// recovered into the best-known result.
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
