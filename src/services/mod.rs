//! Application services built on the domain ports.

pub mod audit_trail;
pub mod call_deadline;
pub mod quality_gate;
pub mod refinement_orchestrator;
pub mod repair;
pub mod semantic_cache;

pub use audit_trail::{export_run, AuditTrail};
pub use call_deadline::with_deadline;
pub use quality_gate::QualityGate;
pub use refinement_orchestrator::RefinementOrchestrator;
pub use repair::with_repair;
pub use semantic_cache::{CachedGeneration, SemanticCache};
