//! Cache policy engine.
//!
//! Serves a bundle for an epic by, in order: exact fingerprint lookup,
//! nearest-neighbour lookup over stored embeddings, and finally fresh
//! generation. Neighbours in the reuse band are returned verbatim, neighbours
//! in the adapt band are passed to the generator as a draft, and anything
//! else regenerates. Degenerate similarity values always regenerate.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::call_deadline::with_deadline;
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    Bundle, CacheDecision, CacheMetadata, CachePolicy, CachedBundle, Epic, Fingerprint,
    NewBundleRecord, SimilarMatch, SimilarityBand, SimilarityLookup, StoreOutcome,
    PROMPT_VERSION_ADAPT, PROMPT_VERSION_FRESH,
};
use crate::domain::ports::{BundleGenerator, BundleStore, EmbeddingProvider, GenerationMode};

/// Result of serving one generation request through the cache.
#[derive(Debug, Clone, Serialize)]
pub struct CachedGeneration {
    /// The bundle served to the caller.
    pub bundle: Bundle,
    /// How the request was served.
    pub decision: CacheDecision,
    /// Metadata describing how this bundle was produced.
    pub metadata: CacheMetadata,
    /// Fingerprint of the request epic.
    pub fingerprint: Fingerprint,
    /// Store write result; `None` when nothing was written.
    #[serde(skip)]
    pub store_outcome: Option<StoreOutcome>,
}

impl CachedGeneration {
    /// End-user explanation of the decision.
    pub fn user_message(&self) -> String {
        self.decision.user_message()
    }
}

/// Semantic cache in front of a bundle generator.
pub struct SemanticCache {
    store: Arc<dyn BundleStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn BundleGenerator>,
    policy: CachePolicy,
    call_timeout: Option<Duration>,
}

impl SemanticCache {
    /// Engine under [`CachePolicy::V1`] with no per-call deadline.
    pub fn new(
        store: Arc<dyn BundleStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn BundleGenerator>,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            policy: CachePolicy::V1,
            call_timeout: None,
        }
    }

    /// Bound every embed, generate and store call by `limit`.
    pub fn with_call_timeout(mut self, limit: Option<Duration>) -> Self {
        self.call_timeout = limit;
        self
    }

    /// Thresholds in effect.
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Serve a bundle for `epic`.
    #[instrument(skip_all, fields(epic_id = %epic.epic_id))]
    pub async fn generate(&self, epic: &Epic) -> DomainResult<CachedGeneration> {
        epic.validate()?;
        let fingerprint = Fingerprint::of(epic);
        let limit = self.call_timeout;

        // 1) exact repeat
        if let Some(cached) = with_deadline(
            limit,
            "find_by_hash",
            self.store.find_by_hash(&fingerprint.hash),
        )
        .await?
        {
            return Ok(self.hash_hit(fingerprint, cached));
        }

        // 2) nearest neighbour
        let embedding = with_deadline(
            limit,
            "embed",
            self.embedder.embed(&fingerprint.normalized_text),
        )
        .await?;

        let lookup = with_deadline(
            limit,
            "find_by_similarity",
            self.store
                .find_by_similarity(&embedding, self.policy.adapt_threshold),
        )
        .await?;

        match self.classify(lookup) {
            Some((SimilarityBand::Reuse, neighbour)) => Ok(self.reuse(fingerprint, neighbour)),
            Some((SimilarityBand::Adapt, neighbour)) => {
                self.adapt(epic, fingerprint, embedding, neighbour).await
            }
            None => self.miss(epic, fingerprint, embedding).await,
        }
    }

    /// Map a lookup to a band. Anything outside the policy's bands is a miss.
    fn classify(&self, lookup: SimilarityLookup) -> Option<(SimilarityBand, SimilarMatch)> {
        match lookup {
            SimilarityLookup::Hit(neighbour) => match self.policy.classify(neighbour.similarity) {
                Some(band) => Some((band, neighbour)),
                None => {
                    warn!(
                        similarity = neighbour.similarity,
                        source_requirement_id = neighbour.source_requirement_id,
                        "store returned a neighbour outside every band, regenerating"
                    );
                    None
                }
            },
            SimilarityLookup::Invalid {
                similarity,
                requirement_id,
            } => {
                warn!(
                    similarity,
                    requirement_id, "degenerate similarity from store, regenerating"
                );
                None
            }
            SimilarityLookup::Miss => None,
        }
    }

    fn hash_hit(&self, fingerprint: Fingerprint, cached: CachedBundle) -> CachedGeneration {
        let decision = CacheDecision::HashHit;
        info!(fingerprint = fingerprint.short_hash(), cache_hit = %decision.kind(), "cache hit");
        CachedGeneration {
            metadata: CacheMetadata::for_decision(&decision, &self.policy),
            bundle: cached.bundle,
            decision,
            fingerprint,
            store_outcome: None,
        }
    }

    fn reuse(&self, fingerprint: Fingerprint, neighbour: SimilarMatch) -> CachedGeneration {
        let decision = CacheDecision::SemanticReuse {
            similarity: neighbour.similarity,
            source_requirement_id: neighbour.source_requirement_id,
        };
        info!(
            fingerprint = fingerprint.short_hash(),
            cache_hit = %decision.kind(),
            similarity = neighbour.similarity,
            source_requirement_id = neighbour.source_requirement_id,
            "reusing cached neighbour"
        );
        CachedGeneration {
            metadata: CacheMetadata::for_decision(&decision, &self.policy),
            bundle: neighbour.cached.bundle,
            decision,
            fingerprint,
            store_outcome: None,
        }
    }

    async fn adapt(
        &self,
        epic: &Epic,
        fingerprint: Fingerprint,
        embedding: Vec<f32>,
        neighbour: SimilarMatch,
    ) -> DomainResult<CachedGeneration> {
        let decision = CacheDecision::SemanticAdapt {
            similarity: neighbour.similarity,
            source_requirement_id: neighbour.source_requirement_id,
        };
        info!(
            fingerprint = fingerprint.short_hash(),
            cache_hit = %decision.kind(),
            similarity = neighbour.similarity,
            source_requirement_id = neighbour.source_requirement_id,
            "adapting cached neighbour"
        );

        let mode = GenerationMode::Adapt {
            draft: &neighbour.cached.bundle,
            similarity: neighbour.similarity,
        };
        let bundle = with_deadline(
            self.call_timeout,
            "generate",
            self.generator.generate(epic, mode),
        )
        .await?;

        self.store_generated(fingerprint, embedding, bundle, decision, PROMPT_VERSION_ADAPT)
            .await
    }

    async fn miss(
        &self,
        epic: &Epic,
        fingerprint: Fingerprint,
        embedding: Vec<f32>,
    ) -> DomainResult<CachedGeneration> {
        let decision = CacheDecision::Miss;
        info!(
            fingerprint = fingerprint.short_hash(),
            cache_hit = %decision.kind(),
            "generating fresh bundle"
        );

        let bundle = with_deadline(
            self.call_timeout,
            "generate",
            self.generator.generate(epic, GenerationMode::Fresh),
        )
        .await?;

        self.store_generated(fingerprint, embedding, bundle, decision, PROMPT_VERSION_FRESH)
            .await
    }

    /// Persist a generated bundle under the request's own fingerprint.
    ///
    /// If a concurrent request cached this fingerprint first, its bundle is
    /// kept in the store and returned in `store_outcome`; the caller still
    /// receives the bundle it generated.
    async fn store_generated(
        &self,
        fingerprint: Fingerprint,
        embedding: Vec<f32>,
        bundle: Bundle,
        decision: CacheDecision,
        prompt_version: &str,
    ) -> DomainResult<CachedGeneration> {
        let model = self.generator.model().to_string();
        let metadata = CacheMetadata::for_decision(&decision, &self.policy)
            .with_generation(model.clone(), prompt_version);

        let record = NewBundleRecord {
            raw_text: fingerprint.raw_text.clone(),
            normalized_text: fingerprint.normalized_text.clone(),
            fingerprint_hash: fingerprint.hash.clone(),
            embedding: Some(embedding),
            bundle: bundle.clone(),
            model,
            prompt_version: prompt_version.to_string(),
            cache_metadata: metadata.clone(),
        };

        let outcome = with_deadline(self.call_timeout, "store_bundle", self.store.store_bundle(record))
            .await?;
        info!(
            fingerprint = fingerprint.short_hash(),
            outcome = outcome.as_str(),
            requirement_id = outcome.cached().requirement_id,
            "bundle stored"
        );

        Ok(CachedGeneration {
            bundle,
            decision,
            metadata,
            fingerprint,
            store_outcome: Some(outcome),
        })
    }
}
