//! `reqsmith generate`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::context::{build_semantic_cache, load_config};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Bundle, CacheMetadata};
use crate::services::CachedGeneration;

/// File written by `--out`.
pub const BUNDLE_FILE: &str = "bundle.json";

/// Arguments for `generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Epic JSON file
    #[arg(short, long)]
    pub epic: PathBuf,

    /// Directory to write bundle.json into
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Output of `generate`.
#[derive(Debug, Serialize)]
pub struct GenerateOutput {
    /// Epic id from the input file.
    pub epic_id: String,
    /// Fingerprint hash of the epic.
    pub fingerprint: String,
    /// User-facing cache decision message.
    pub message: String,
    /// Metadata of the decision.
    pub cache_metadata: CacheMetadata,
    /// Store write result; absent for cache hits.
    pub store_outcome: Option<String>,
    /// Stories in the served bundle.
    pub stories: usize,
    /// Scenarios in the served bundle.
    pub scenarios: usize,
    /// Path of `bundle.json` when `--out` was given.
    pub written_to: Option<PathBuf>,
}

impl CommandOutput for GenerateOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            self.message.clone(),
            String::new(),
            format!("Epic:        {}", self.epic_id),
            format!("Fingerprint: {}", self.fingerprint),
            format!("Cache hit:   {}", self.cache_metadata.cache_hit),
        ];
        if let Some(similarity) = self.cache_metadata.similarity {
            lines.push(format!("Similarity:  {similarity:.3}"));
        }
        if let Some(source) = self.cache_metadata.source_requirement_id {
            lines.push(format!("Source:      requirement #{source}"));
        }
        if let Some(ref outcome) = self.store_outcome {
            lines.push(format!("Stored:      {outcome}"));
        }
        lines.push(format!(
            "Bundle:      {} stories, {} scenarios",
            self.stories, self.scenarios
        ));
        if let Some(ref path) = self.written_to {
            lines.push(format!("Written to:  {}", path.display()));
        }
        lines.join("\n")
    }
}

/// Artifact JSON as persisted: the bundle fields plus a sibling
/// `cacheMetadata`.
pub fn artifact_json(bundle: &Bundle, metadata: &CacheMetadata) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(bundle)?;
    if let Some(map) = value.as_object_mut() {
        map.insert("cacheMetadata".to_string(), serde_json::to_value(metadata)?);
    }
    Ok(value)
}

async fn write_bundle(dir: &Path, generation: &CachedGeneration) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(BUNDLE_FILE);
    let body = serde_json::to_string_pretty(&artifact_json(
        &generation.bundle,
        &generation.metadata,
    )?)?;
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Serve a bundle for an epic file through the cache.
pub async fn execute(args: GenerateArgs, config_path: Option<&Path>, json_mode: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let epic = super::read_epic(&args.epic).await?;
    let cache = build_semantic_cache(&config).await?;

    let generation = cache.generate(&epic).await?;

    let written_to = match args.out {
        Some(ref dir) => Some(write_bundle(dir, &generation).await?),
        None => None,
    };

    output(
        &GenerateOutput {
            epic_id: epic.epic_id.clone(),
            fingerprint: generation.fingerprint.hash.clone(),
            message: generation.user_message(),
            cache_metadata: generation.metadata.clone(),
            store_outcome: generation
                .store_outcome
                .as_ref()
                .map(|o| o.as_str().to_string()),
            stories: generation.bundle.stories.len(),
            scenarios: generation.bundle.scenarios.len(),
            written_to,
        },
        json_mode,
    );
    Ok(())
}
