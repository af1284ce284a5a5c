//! reqsmith: epic to requirements-bundle generation with a semantic cache
//! and a scored refinement loop.
//!
//! # Architecture
//!
//! - **Domain** (`domain`): models and port traits
//! - **Adapters** (`adapters`): `SQLite` bundle store, OpenAI-compatible HTTP collaborators
//! - **Services** (`services`): cache policy engine, quality gate, refinement orchestrator
//! - **Infrastructure** (`infrastructure`): configuration and logging
//! - **CLI** (`cli`): command-line front end
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use reqsmith::services::{RefinementOrchestrator, SemanticCache};
//!
//! let cache = Arc::new(SemanticCache::new(store, embedder, generator));
//! let orchestrator = RefinementOrchestrator::new(cache, gate, critic, refiner, config);
//! let outcome = orchestrator.run(&epic).await?;
//! reqsmith::services::export_run("runs".as_ref(), &outcome).await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Bundle, CacheDecision, CacheMetadata, CachePolicy, Config, Epic, Fingerprint, QualityReport,
    RefinementConfig, RefinementOutcome,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{QualityGate, RefinementOrchestrator, SemanticCache};
