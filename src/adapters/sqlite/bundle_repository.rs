//! SQLite implementation of the BundleStore.

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use sqlx::SqlitePool;

use super::parse_datetime;
use super::vector::{bytes_to_embedding, cosine_distance, embedding_to_bytes, is_valid_similarity};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Bundle, CacheMetadata, CacheStats, CachedBundle, NewBundleRecord, SimilarMatch,
    SimilarityLookup, StoreOutcome, BUNDLE_OUTPUT_TYPE,
};
use crate::domain::ports::BundleStore;

const ARTIFACT_COLUMNS: &str = r#"r.id AS requirement_id, a.id AS artifact_id, r.fingerprint_hash,
    a.content, a.model, a.prompt_version, a.cache_metadata, a.created_at"#;

/// [`BundleStore`] over a `SQLite` pool.
#[derive(Clone)]
pub struct SqliteBundleStore {
    pool: SqlitePool,
}

impl SqliteBundleStore {
    /// Wrap an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Scan candidate embeddings in ascending requirement id order and return
    /// the closest valid one plus the first degenerate one seen.
    async fn nearest_neighbour(
        &self,
        embedding: &[f32],
    ) -> DomainResult<(Option<(i64, f64)>, Option<(i64, f64)>)> {
        let mut rows = sqlx::query_as::<_, (i64, Vec<u8>)>(
            r#"SELECT r.id, r.embedding
               FROM requirements r
               JOIN artifacts a ON a.requirement_id = r.id AND a.output_type = ?
               WHERE r.embedding IS NOT NULL
               ORDER BY r.id ASC"#,
        )
        .bind(BUNDLE_OUTPUT_TYPE)
        .fetch(&self.pool);

        let mut best: Option<(i64, f64)> = None;
        let mut invalid: Option<(i64, f64)> = None;
        let mut scanned = 0usize;

        while let Some((requirement_id, blob)) = rows.try_next().await? {
            scanned += 1;
            let stored = bytes_to_embedding(&blob)?;
            let Some(distance) = cosine_distance(embedding, &stored) else {
                tracing::debug!(
                    requirement_id,
                    stored_dim = stored.len(),
                    query_dim = embedding.len(),
                    "skipping incomparable embedding"
                );
                continue;
            };

            let similarity = 1.0 - distance;
            if !is_valid_similarity(similarity) {
                invalid.get_or_insert((requirement_id, similarity));
                continue;
            }
            // Strict comparison keeps the lowest id on exact ties.
            if best.map_or(true, |(_, current)| similarity > current) {
                best = Some((requirement_id, similarity));
            }
        }

        tracing::debug!(scanned, ?best, "similarity scan complete");
        Ok((best, invalid))
    }
}

#[async_trait]
impl BundleStore for SqliteBundleStore {
    async fn find_by_hash(&self, fingerprint_hash: &str) -> DomainResult<Option<CachedBundle>> {
        let row: Option<ArtifactRow> = sqlx::query_as(&format!(
            r#"SELECT {ARTIFACT_COLUMNS}
               FROM requirements r
               JOIN artifacts a ON a.requirement_id = r.id
               WHERE r.fingerprint_hash = ? AND a.output_type = ?"#
        ))
        .bind(fingerprint_hash)
        .bind(BUNDLE_OUTPUT_TYPE)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_similarity(
        &self,
        embedding: &[f32],
        min_similarity: f64,
    ) -> DomainResult<SimilarityLookup> {
        let (best, invalid) = self.nearest_neighbour(embedding).await?;

        match (best, invalid) {
            (Some((requirement_id, similarity)), _) if similarity >= min_similarity => {
                let cached = self.get_artifact(requirement_id).await?.ok_or_else(|| {
                    DomainError::DatabaseError(format!(
                        "artifact for requirement {requirement_id} disappeared during lookup"
                    ))
                })?;
                Ok(SimilarityLookup::Hit(SimilarMatch {
                    cached,
                    similarity,
                    source_requirement_id: requirement_id,
                }))
            }
            (None, Some((requirement_id, similarity))) => {
                tracing::warn!(requirement_id, similarity, "degenerate similarity in store");
                Ok(SimilarityLookup::Invalid {
                    similarity,
                    requirement_id,
                })
            }
            _ => Ok(SimilarityLookup::Miss),
        }
    }

    async fn store_bundle(&self, record: NewBundleRecord) -> DomainResult<StoreOutcome> {
        let content = serde_json::to_string(&record.bundle)?;
        let cache_metadata = serde_json::to_string(&record.cache_metadata)?;
        let embedding_blob = record.embedding.as_deref().map(embedding_to_bytes);
        let embedding_dim = record.embedding.as_ref().map(|e| e.len() as i64);
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let requirement_insert = sqlx::query(
            r#"INSERT INTO requirements
                   (raw_text, normalized_text, fingerprint_hash, embedding, embedding_dim, created_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(fingerprint_hash) DO NOTHING"#,
        )
        .bind(&record.raw_text)
        .bind(&record.normalized_text)
        .bind(&record.fingerprint_hash)
        .bind(embedding_blob)
        .bind(embedding_dim)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        let created_requirement = requirement_insert.rows_affected() == 1;

        let (requirement_id,): (i64,) =
            sqlx::query_as("SELECT id FROM requirements WHERE fingerprint_hash = ?")
                .bind(&record.fingerprint_hash)
                .fetch_one(&mut *tx)
                .await?;

        let artifact_insert = sqlx::query(
            r#"INSERT INTO artifacts
                   (requirement_id, output_type, content, model, prompt_version, cache_metadata, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(requirement_id, output_type) DO NOTHING"#,
        )
        .bind(requirement_id)
        .bind(BUNDLE_OUTPUT_TYPE)
        .bind(&content)
        .bind(&record.model)
        .bind(&record.prompt_version)
        .bind(&cache_metadata)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        let wrote_artifact = artifact_insert.rows_affected() == 1;

        tx.commit().await?;

        let cached = self.get_artifact(requirement_id).await?.ok_or_else(|| {
            DomainError::DatabaseError(format!(
                "bundle for requirement {requirement_id} missing after commit"
            ))
        })?;

        let outcome = match (created_requirement, wrote_artifact) {
            (true, true) => StoreOutcome::Created(cached),
            (false, true) => StoreOutcome::Attached(cached),
            (_, false) => {
                tracing::info!(
                    requirement_id,
                    fingerprint = %record.fingerprint_hash,
                    "bundle already cached, keeping first write"
                );
                StoreOutcome::AlreadyCached(cached)
            }
        };
        Ok(outcome)
    }

    async fn get_artifact(&self, requirement_id: i64) -> DomainResult<Option<CachedBundle>> {
        let row: Option<ArtifactRow> = sqlx::query_as(&format!(
            r#"SELECT {ARTIFACT_COLUMNS}
               FROM requirements r
               JOIN artifacts a ON a.requirement_id = r.id
               WHERE r.id = ? AND a.output_type = ?"#
        ))
        .bind(requirement_id)
        .bind(BUNDLE_OUTPUT_TYPE)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn stats(&self) -> DomainResult<CacheStats> {
        let (requirements, requirements_with_embedding): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(embedding) FROM requirements",
        )
        .fetch_one(&self.pool)
        .await?;

        let (artifacts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM artifacts")
            .fetch_one(&self.pool)
            .await?;

        let by_cache_hit: Vec<(String, i64)> = sqlx::query_as(
            r#"SELECT COALESCE(json_extract(cache_metadata, '$.cacheHit'), 'unknown') AS kind,
                      COUNT(*)
               FROM artifacts
               GROUP BY kind
               ORDER BY kind"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(CacheStats {
            requirements,
            requirements_with_embedding,
            artifacts,
            by_cache_hit,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ArtifactRow {
    requirement_id: i64,
    artifact_id: i64,
    fingerprint_hash: String,
    content: String,
    model: String,
    prompt_version: String,
    cache_metadata: String,
    created_at: String,
}

impl TryFrom<ArtifactRow> for CachedBundle {
    type Error = DomainError;

    fn try_from(row: ArtifactRow) -> Result<Self, Self::Error> {
        let bundle: Bundle = serde_json::from_str(&row.content)?;
        let metadata: serde_json::Value = serde_json::from_str(&row.cache_metadata)?;
        let cache_metadata = if metadata.as_object().is_some_and(|m| m.is_empty()) {
            None
        } else {
            Some(serde_json::from_value::<CacheMetadata>(metadata)?)
        };

        Ok(CachedBundle {
            requirement_id: row.requirement_id,
            artifact_id: row.artifact_id,
            fingerprint_hash: row.fingerprint_hash,
            bundle,
            model: row.model,
            prompt_version: row.prompt_version,
            cache_metadata,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
