//! Embedding provider port for semantic vector generation.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Converts normalized epic text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name (e.g., "openai", "fixed").
    fn name(&self) -> &'static str;

    /// Embedding dimension for this provider/model.
    fn dimension(&self) -> usize;

    /// Generate an embedding for a single text.
    ///
    /// Fails with [`DomainError::EmbeddingUnavailable`] when the service
    /// cannot be reached.
    ///
    /// [`DomainError::EmbeddingUnavailable`]: crate::domain::DomainError::EmbeddingUnavailable
    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>>;
}
