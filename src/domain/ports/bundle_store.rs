//! Bundle store port: persistence of requirement records and their cached
//! bundle artifacts, with exact-hash and nearest-neighbour lookup.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    CacheStats, CachedBundle, NewBundleRecord, SimilarityLookup, StoreOutcome,
};

/// Repository interface for cached bundles.
#[async_trait]
pub trait BundleStore: Send + Sync {
    /// Bundle stored under an exact fingerprint hash, if any.
    async fn find_by_hash(&self, fingerprint_hash: &str) -> DomainResult<Option<CachedBundle>>;

    /// Closest stored bundle by cosine similarity.
    ///
    /// Only requirements with an embedding and a bundle artifact are
    /// candidates. Returns `Miss` when there are none or the best similarity
    /// is below `min_similarity`, and `Invalid` when the best similarity is
    /// not a usable number.
    async fn find_by_similarity(
        &self,
        embedding: &[f32],
        min_similarity: f64,
    ) -> DomainResult<SimilarityLookup>;

    /// Persist a bundle under its fingerprint. Idempotent: an existing
    /// bundle is never overwritten.
    async fn store_bundle(&self, record: NewBundleRecord) -> DomainResult<StoreOutcome>;

    /// Bundle artifact of a requirement by id.
    async fn get_artifact(&self, requirement_id: i64) -> DomainResult<Option<CachedBundle>>;

    /// Row counts for `cache stats`.
    async fn stats(&self) -> DomainResult<CacheStats>;
}
