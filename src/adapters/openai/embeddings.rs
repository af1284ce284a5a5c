//! OpenAI embedding provider adapter.
//!
//! Calls the `/embeddings` endpoint of any OpenAI-compatible API. Every
//! transport, HTTP or shape failure surfaces as
//! [`DomainError::EmbeddingUnavailable`] so the cache can report it cleanly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{OpenAiClientConfig, OpenAiHttp};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::EmbeddingConfig;
use crate::domain::ports::EmbeddingProvider;

/// OpenAI embedding provider.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingProvider {
    http: OpenAiHttp,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddingProvider {
    /// Fails when no API key is available.
    pub fn new(client: &OpenAiClientConfig, embedding: &EmbeddingConfig) -> DomainResult<Self> {
        Ok(Self {
            http: OpenAiHttp::new(client)?,
            model: embedding.model.clone(),
            dimension: embedding.dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
        let request = EmbeddingsRequest {
            model: &self.model,
            input: [text],
        };

        let response: EmbeddingsResponse = self
            .http
            .post_json("embeddings", &request)
            .await
            .map_err(|e| e.into_domain(DomainError::EmbeddingUnavailable))?;

        let vector = response
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .ok_or_else(|| {
                DomainError::EmbeddingUnavailable("Empty embedding response".to_string())
            })?;

        if vector.len() != self.dimension {
            return Err(DomainError::EmbeddingUnavailable(format!(
                "model {} returned {} dimensions, expected {}",
                self.model,
                vector.len(),
                self.dimension
            )));
        }
        Ok(vector)
    }
}

// -- OpenAI API request/response types --

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
