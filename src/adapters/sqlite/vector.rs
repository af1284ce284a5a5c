//! Embedding blob encoding and cosine math for the bundle store.

use crate::domain::errors::{DomainError, DomainResult};

/// Serialize an embedding as little-endian f32 bytes.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize a little-endian f32 blob.
pub fn bytes_to_embedding(bytes: &[u8]) -> DomainResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(DomainError::SerializationError(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Cosine distance (`1 - cosine similarity`) accumulated in f64.
///
/// `None` when the vectors differ in length, are empty, or either has zero
/// norm. Non-finite components propagate as NaN.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some(1.0 - dot / denom)
}

/// Whether a similarity is a number a cosine can actually produce.
pub fn is_valid_similarity(similarity: f64) -> bool {
    const SLACK: f64 = 1e-9;
    similarity.is_finite() && (-1.0 - SLACK..=1.0 + SLACK).contains(&similarity)
}
