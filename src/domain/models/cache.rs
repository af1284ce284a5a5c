//! Semantic cache domain model.
//!
//! Policy thresholds, the four-way cache decision, the metadata folded into
//! persisted artifacts, and the value types exchanged with a [`BundleStore`].
//!
//! [`BundleStore`]: crate::domain::ports::BundleStore

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bundle::Bundle;

/// Artifact type under which bundles are persisted.
pub const BUNDLE_OUTPUT_TYPE: &str = "bundle";

/// Prompt version recorded for fresh generations.
pub const PROMPT_VERSION_FRESH: &str = "v1";

/// Prompt version recorded for adaptations of a cached neighbour.
pub const PROMPT_VERSION_ADAPT: &str = "v1_adapt";

/// Versioned similarity thresholds.
///
/// Changing a threshold is a policy version bump, so thresholds are constants
/// of a named policy rather than configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachePolicy {
    /// Policy identifier recorded in cache metadata.
    pub version: &'static str,
    /// Inclusive lower bound of the adapt band.
    pub adapt_threshold: f64,
    /// Inclusive lower bound of the reuse band.
    pub reuse_threshold: f64,
}

/// Similarity band a neighbour falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityBand {
    /// Serve the neighbour verbatim.
    Reuse,
    /// Use the neighbour as a draft for generation.
    Adapt,
}

impl CachePolicy {
    /// Thresholds 0.75 (adapt) and 0.92 (reuse).
    pub const V1: Self = Self {
        version: "cache_policy_v1",
        adapt_threshold: 0.75,
        reuse_threshold: 0.92,
    };

    /// Classify a similarity value. `None` means regenerate.
    ///
    /// Non-finite values and values above 1.0 are outside every band.
    pub fn classify(&self, similarity: f64) -> Option<SimilarityBand> {
        if !similarity.is_finite() || similarity > 1.0 + f64::EPSILON {
            return None;
        }
        if similarity >= self.reuse_threshold {
            Some(SimilarityBand::Reuse)
        } else if similarity >= self.adapt_threshold {
            Some(SimilarityBand::Adapt)
        } else {
            None
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::V1
    }
}

/// Persisted tag of a cache decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheHitKind {
    /// Exact fingerprint match.
    #[serde(rename = "hash")]
    HashHit,
    /// Neighbour reused verbatim.
    SemanticReuse,
    /// Neighbour adapted into a new bundle.
    SemanticAdapt,
    /// Freshly generated.
    Miss,
}

impl CacheHitKind {
    /// Tag as persisted in `cacheHit`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HashHit => "hash",
            Self::SemanticReuse => "semantic_reuse",
            Self::SemanticAdapt => "semantic_adapt",
            Self::Miss => "miss",
        }
    }

    /// Parse a persisted tag.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "hash" => Some(Self::HashHit),
            "semantic_reuse" => Some(Self::SemanticReuse),
            "semantic_adapt" => Some(Self::SemanticAdapt),
            "miss" => Some(Self::Miss),
            _ => None,
        }
    }
}

impl std::fmt::Display for CacheHitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a generation request was served. Only the semantic cases carry a
/// similarity and a source requirement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheDecision {
    /// The fingerprint was already cached.
    HashHit,
    /// A neighbour in the reuse band was returned unchanged.
    SemanticReuse {
        /// Cosine similarity to the neighbour.
        similarity: f64,
        /// Requirement the neighbour is stored under.
        source_requirement_id: i64,
    },
    /// A neighbour in the adapt band was passed to the generator as a draft.
    SemanticAdapt {
        /// Cosine similarity to the neighbour.
        similarity: f64,
        /// Requirement the neighbour is stored under.
        source_requirement_id: i64,
    },
    /// No usable neighbour; the bundle was generated from scratch.
    Miss,
}

impl CacheDecision {
    /// Persisted tag for this decision.
    pub fn kind(&self) -> CacheHitKind {
        match self {
            Self::HashHit => CacheHitKind::HashHit,
            Self::SemanticReuse { .. } => CacheHitKind::SemanticReuse,
            Self::SemanticAdapt { .. } => CacheHitKind::SemanticAdapt,
            Self::Miss => CacheHitKind::Miss,
        }
    }

    /// Similarity, for the two semantic cases.
    pub fn similarity(&self) -> Option<f64> {
        match self {
            Self::SemanticReuse { similarity, .. } | Self::SemanticAdapt { similarity, .. } => {
                Some(*similarity)
            }
            Self::HashHit | Self::Miss => None,
        }
    }

    /// Source requirement, for the two semantic cases.
    pub fn source_requirement_id(&self) -> Option<i64> {
        match self {
            Self::SemanticReuse {
                source_requirement_id,
                ..
            }
            | Self::SemanticAdapt {
                source_requirement_id,
                ..
            } => Some(*source_requirement_id),
            Self::HashHit | Self::Miss => None,
        }
    }

    /// Whether serving this decision invokes the generative model.
    pub fn calls_generator(&self) -> bool {
        matches!(self, Self::SemanticAdapt { .. } | Self::Miss)
    }

    /// Short explanation suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::HashHit => {
                "Exact match found. Reusing cached bundle to save time and cost.".to_string()
            }
            Self::SemanticReuse { similarity, .. } => format!(
                "Found a very close match (similarity {similarity:.2}). Reusing a previous bundle."
            ),
            Self::SemanticAdapt { similarity, .. } => format!(
                "Found a similar epic (similarity {similarity:.2}). Adapting a previous bundle to fit this epic."
            ),
            Self::Miss => "No close match found. Generating a fresh bundle for best fit.".to_string(),
        }
    }
}

/// Metadata stored alongside a bundle artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    /// How the bundle was produced.
    pub cache_hit: CacheHitKind,
    /// Cosine similarity to the source neighbour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    /// Requirement the neighbour is stored under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_requirement_id: Option<i64>,
    /// Policy the decision was made under.
    pub policy_version: String,
    /// Set only when the generator ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_version: Option<String>,
    /// Set only when the generator ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl CacheMetadata {
    /// Metadata for a decision under `policy`, without generation details.
    pub fn for_decision(decision: &CacheDecision, policy: &CachePolicy) -> Self {
        Self {
            cache_hit: decision.kind(),
            similarity: decision.similarity(),
            source_requirement_id: decision.source_requirement_id(),
            policy_version: policy.version.to_string(),
            prompt_version: None,
            model: None,
        }
    }

    /// Record the model and prompt version that produced the bundle.
    pub fn with_generation(mut self, model: impl Into<String>, prompt_version: &str) -> Self {
        self.model = Some(model.into());
        self.prompt_version = Some(prompt_version.to_string());
        self
    }
}

/// A bundle artifact read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedBundle {
    /// Requirement row the artifact belongs to.
    pub requirement_id: i64,
    /// Row id of the bundle artifact.
    pub artifact_id: i64,
    /// Hex SHA-256 of the normalized cache input.
    pub fingerprint_hash: String,
    /// The bundle content.
    pub bundle: Bundle,
    /// Model that produced the bundle.
    pub model: String,
    /// Prompt version that produced the bundle.
    pub prompt_version: String,
    /// `None` for artifacts written without cache metadata.
    pub cache_metadata: Option<CacheMetadata>,
    /// When the artifact was written.
    pub created_at: DateTime<Utc>,
}

/// Nearest cached neighbour of a query embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarMatch {
    /// The neighbour as read from the store.
    pub cached: CachedBundle,
    /// Cosine similarity to the source neighbour.
    pub similarity: f64,
    /// Requirement the neighbour is stored under.
    pub source_requirement_id: i64,
}

/// Outcome of a similarity lookup.
///
/// `Invalid` reports a degenerate similarity (NaN, infinite, or outside
/// [-1, 1]); callers treat it as a miss.
#[derive(Debug, Clone, PartialEq)]
pub enum SimilarityLookup {
    /// Closest neighbour at or above the requested minimum.
    Hit(SimilarMatch),
    /// No eligible row, or the best is below the minimum.
    Miss,
    /// Degenerate similarity computed for `requirement_id`.
    Invalid {
        /// The offending value.
        similarity: f64,
        /// Row it was computed against.
        requirement_id: i64,
    },
}

/// Everything needed to persist one bundle under one fingerprint.
#[derive(Debug, Clone)]
pub struct NewBundleRecord {
    /// Cache input before normalization.
    pub raw_text: String,
    /// Normalized cache input the fingerprint is computed over.
    pub normalized_text: String,
    /// Hex SHA-256 of the normalized cache input.
    pub fingerprint_hash: String,
    /// `None` stores the requirement without a vector; it never matches by similarity.
    pub embedding: Option<Vec<f32>>,
    /// The bundle content.
    pub bundle: Bundle,
    /// Model that produced the bundle.
    pub model: String,
    /// Prompt version that produced the bundle.
    pub prompt_version: String,
    /// Metadata stored with the artifact.
    pub cache_metadata: CacheMetadata,
}

/// Result of a store write. The carried record is always what is persisted.
///
/// A second bundle for an already cached requirement is never written: the
/// first write wins and the caller receives `AlreadyCached` with the
/// existing artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    /// Requirement and artifact were both created.
    Created(CachedBundle),
    /// The requirement existed without a bundle; the artifact was attached.
    Attached(CachedBundle),
    /// A bundle already existed for this fingerprint; nothing was written.
    AlreadyCached(CachedBundle),
}

impl StoreOutcome {
    /// The persisted artifact.
    pub fn cached(&self) -> &CachedBundle {
        match self {
            Self::Created(c) | Self::Attached(c) | Self::AlreadyCached(c) => c,
        }
    }

    /// Take the persisted artifact.
    pub fn into_cached(self) -> CachedBundle {
        match self {
            Self::Created(c) | Self::Attached(c) | Self::AlreadyCached(c) => c,
        }
    }

    /// Tag used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Attached(_) => "attached",
            Self::AlreadyCached(_) => "already_cached",
        }
    }

    /// Whether this call wrote the artifact.
    pub fn wrote(&self) -> bool {
        !matches!(self, Self::AlreadyCached(_))
    }
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Requirement rows.
    pub requirements: i64,
    /// Requirement rows that carry an embedding.
    pub requirements_with_embedding: i64,
    /// Artifact rows.
    pub artifacts: i64,
    /// Artifact counts keyed by the `cacheHit` tag, sorted by tag.
    pub by_cache_hit: Vec<(String, i64)>,
}
