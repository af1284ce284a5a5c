//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces adapters and external collaborators
//! implement:
//! - BundleStore: persistence and similarity lookup of cached bundles
//! - EmbeddingProvider: text embedding
//! - BundleGenerator, Critic, Refiner: generative model calls
//! - InvestScorer, GherkinValidator, TraceChecker, AmbiguityDetector: scoring

pub mod bundle_store;
pub mod embedding;
pub mod generator;
pub mod quality;

pub use bundle_store::BundleStore;
pub use embedding::EmbeddingProvider;
pub use generator::{BundleGenerator, Critic, GenerationMode, Refiner};
pub use quality::{AmbiguityDetector, GherkinValidator, InvestScorer, TraceChecker};
