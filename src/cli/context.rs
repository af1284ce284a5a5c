//! Wiring shared by the commands: config, store and adapters.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::adapters::openai::{
    OpenAiBundleGenerator, OpenAiChatClient, OpenAiClientConfig, OpenAiEmbeddingProvider,
};
use crate::adapters::sqlite::{initialize_database, PoolConfig, SqliteBundleStore};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::services::SemanticCache;

/// Load config from `path` when given, otherwise from the project files.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Open and migrate the configured database.
pub async fn open_store(config: &Config) -> Result<SqliteBundleStore> {
    let pool = initialize_database(
        &config.database.url(),
        Some(PoolConfig::from(&config.database)),
    )
    .await
    .with_context(|| format!("Failed to open database at {}", config.database.path))?;
    Ok(SqliteBundleStore::new(pool))
}

/// Cache-backed generation against the configured OpenAI-compatible service.
pub async fn build_semantic_cache(config: &Config) -> Result<SemanticCache> {
    let store = open_store(config).await?;

    let client = OpenAiClientConfig::from_config(&config.openai);
    let embedder = OpenAiEmbeddingProvider::new(&client, &config.embedding)
        .context("Failed to configure embedding provider")?;
    let chat = OpenAiChatClient::new(&client, &config.openai.model, config.openai.temperature)
        .context("Failed to configure chat client")?;
    let generator = OpenAiBundleGenerator::new(Arc::new(chat), config.generation.max_repairs);

    Ok(
        SemanticCache::new(Arc::new(store), Arc::new(embedder), Arc::new(generator))
            .with_call_timeout(config.generation.call_timeout()),
    )
}
