//! Generative collaborator ports: bundle generation, critique and refinement.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Bundle, Critique, Epic, QualityReport};

/// How a bundle should be produced.
#[derive(Debug, Clone, Copy)]
pub enum GenerationMode<'a> {
    /// Generate from the epic alone.
    Fresh,
    /// Adapt a cached bundle of a similar epic.
    Adapt {
        /// The cached neighbour's bundle.
        draft: &'a Bundle,
        /// Similarity of the neighbour's epic.
        similarity: f64,
    },
}

impl GenerationMode<'_> {
    /// Mode name used in logs and prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Adapt { .. } => "semantic_adapt",
        }
    }
}

/// Produces a schema-valid bundle for an epic.
///
/// Implementations retry malformed output through a bounded repair loop and
/// fail with `DomainError::SchemaValidation` once it is exhausted.
#[async_trait]
pub trait BundleGenerator: Send + Sync {
    /// Model identifier recorded in cache metadata.
    fn model(&self) -> &str;

    /// Produce a bundle for `epic`, from scratch or from a draft.
    async fn generate(&self, epic: &Epic, mode: GenerationMode<'_>) -> DomainResult<Bundle>;
}

/// Reviews a bundle and proposes edits.
#[async_trait]
pub trait Critic: Send + Sync {
    /// Review `bundle` with its quality report.
    async fn critique(
        &self,
        epic: &Epic,
        bundle: &Bundle,
        report: &QualityReport,
    ) -> DomainResult<Critique>;
}

/// Applies a critique to a bundle.
#[async_trait]
pub trait Refiner: Send + Sync {
    /// Apply `critique` and return the revised bundle.
    async fn refine(&self, epic: &Epic, bundle: &Bundle, critique: &Critique)
        -> DomainResult<Bundle>;
}
