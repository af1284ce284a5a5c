//! Domain models for reqsmith.

pub mod audit;
pub mod bundle;
pub mod cache;
pub mod config;
pub mod epic;
pub mod fingerprint;
pub mod quality;
pub mod refinement;

pub use audit::{AuditEvent, AuditRecord, MAX_AUDITED_VIOLATIONS};
pub use bundle::{Bundle, GherkinScenario, TraceMap, UserStory};
pub use cache::{
    CacheDecision, CacheHitKind, CacheMetadata, CachePolicy, CacheStats, CachedBundle,
    NewBundleRecord, SimilarMatch, SimilarityBand, SimilarityLookup, StoreOutcome,
    BUNDLE_OUTPUT_TYPE, PROMPT_VERSION_ADAPT, PROMPT_VERSION_FRESH,
};
pub use config::{
    Config, DatabaseConfig, EmbeddingConfig, GenerationConfig, LoggingConfig, OpenAiConfig,
};
pub use epic::{Epic, GlossaryTerm};
pub use fingerprint::Fingerprint;
pub use quality::{
    CheckOutcome, InvestAssessment, InvestScores, QualityReport, StoryQualityReport,
};
pub use refinement::{
    Critique, EditAction, EditInstruction, IssueType, IterationRecord, RefinementConfig,
    RefinementOutcome, RefinementState, StopReason,
};
