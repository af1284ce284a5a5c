//! CLI command implementations.

pub mod cache;
pub mod fingerprint;
pub mod generate;

use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::models::Epic;

/// Read and validate an epic JSON file.
pub(crate) async fn read_epic(path: &Path) -> Result<Epic> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read epic file {}", path.display()))?;
    Epic::from_json(&raw).with_context(|| format!("Invalid epic in {}", path.display()))
}
