//! `reqsmith cache`

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::{load_config, open_store};
use crate::cli::output::{list_table, output, truncate, CommandOutput};
use crate::domain::models::{CacheStats, CachedBundle};
use crate::domain::ports::BundleStore;

/// Arguments for `cache`.
#[derive(Args, Debug)]
pub struct CacheArgs {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: CacheCommands,
}

/// `cache` subcommands.
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show the cached bundle stored under a fingerprint
    Show {
        /// Full fingerprint hash
        hash: String,
    },
    /// Requirement and artifact counts by cache-hit kind
    Stats,
}

/// Output of `cache show`.
#[derive(Debug, Serialize)]
pub struct CacheEntryOutput {
    /// The cached artifact.
    #[serde(flatten)]
    pub entry: CachedBundle,
}

impl CommandOutput for CacheEntryOutput {
    fn to_human(&self) -> String {
        let entry = &self.entry;
        let mut lines = vec![
            format!("Requirement:    #{}", entry.requirement_id),
            format!("Fingerprint:    {}", entry.fingerprint_hash),
            format!("Model:          {}", entry.model),
            format!("Prompt version: {}", entry.prompt_version),
            format!("Created:        {}", entry.created_at.to_rfc3339()),
        ];
        if let Some(ref metadata) = entry.cache_metadata {
            lines.push(format!("Cache hit:      {}", metadata.cache_hit));
            if let Some(similarity) = metadata.similarity {
                lines.push(format!("Similarity:     {similarity:.3}"));
            }
        }

        let mut table = list_table(&["story", "scenarios", "text"]);
        for story in &entry.bundle.stories {
            let scenarios = entry.bundle.scenarios_for(&story.story_id).count();
            table.add_row(vec![
                story.story_id.clone(),
                scenarios.to_string(),
                truncate(&story.story_text, 60),
            ]);
        }
        lines.push(String::new());
        lines.push(table.to_string());
        lines.join("\n")
    }
}

/// Output of `cache stats`.
#[derive(Debug, Serialize)]
pub struct CacheStatsOutput {
    /// Store counts.
    #[serde(flatten)]
    pub stats: CacheStats,
}

impl CommandOutput for CacheStatsOutput {
    fn to_human(&self) -> String {
        let stats = &self.stats;
        let mut lines = vec![
            format!(
                "Requirements: {} ({} with embedding)",
                stats.requirements, stats.requirements_with_embedding
            ),
            format!("Artifacts:    {}", stats.artifacts),
        ];
        if !stats.by_cache_hit.is_empty() {
            let mut table = list_table(&["cache hit", "artifacts"]);
            for (kind, count) in &stats.by_cache_hit {
                table.add_row(vec![kind.clone(), count.to_string()]);
            }
            lines.push(String::new());
            lines.push(table.to_string());
        }
        lines.join("\n")
    }
}

/// Run a `cache` subcommand.
pub async fn execute(args: CacheArgs, config_path: Option<&Path>, json_mode: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config).await?;

    match args.command {
        CacheCommands::Show { hash } => {
            let entry = store
                .find_by_hash(hash.trim())
                .await?
                .with_context(|| format!("No cached bundle for fingerprint {hash}"))?;
            output(&CacheEntryOutput { entry }, json_mode);
        }
        CacheCommands::Stats => {
            let stats = store.stats().await?;
            output(&CacheStatsOutput { stats }, json_mode);
        }
    }
    Ok(())
}
