//! Fingerprint domain model.
//!
//! A fingerprint is the stable cache key of an [`Epic`]: a SHA-256 digest of
//! its canonical text. Constraint and glossary order is part of the key, so
//! reordering the same items yields a different fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::epic::Epic;

/// Canonical cache input of an epic plus its normalized form and hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Cache input before normalization. Stored as the requirement's raw text.
    pub raw_text: String,
    /// Whitespace-collapsed, lowercased cache input. This is what gets embedded.
    pub normalized_text: String,
    /// Lowercase hex SHA-256 of `normalized_text`.
    pub hash: String,
}

impl Fingerprint {
    /// Compute the fingerprint of an epic.
    pub fn of(epic: &Epic) -> Self {
        let raw_text = cache_input(epic);
        let normalized_text = normalize(&raw_text);
        let hash = sha256_hex(&normalized_text);
        Self {
            raw_text,
            normalized_text,
            hash,
        }
    }

    /// First 12 characters of the hash, for log lines and tables.
    pub fn short_hash(&self) -> &str {
        self.hash.get(..12).unwrap_or(&self.hash)
    }
}

/// Render the fixed-order cache input for an epic.
pub fn cache_input(epic: &Epic) -> String {
    format!(
        "Epic ID: {}\n\n{}\n\nConstraints:\n{}\n\nGlossary:\n{}",
        epic.epic_id,
        epic.text.trim(),
        epic.constraints_block(),
        epic.glossary_block()
    )
}

/// Collapse whitespace runs to a single space, trim, and lowercase.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Hex-encoded SHA-256 over the UTF-8 bytes of `text`.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
