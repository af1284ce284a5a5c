//! Layered configuration loading: defaults, project files, then environment.

use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project config file, relative to the working directory.
pub const PROJECT_CONFIG_FILE: &str = ".reqsmith/config.yaml";
/// Optional local overrides, relative to the working directory.
pub const LOCAL_CONFIG_FILE: &str = ".reqsmith/local.yaml";
/// Prefix of environment overrides. Nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "REQSMITH_";

const MAX_ITERATIONS_LIMIT: u32 = 20;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `logging.level` is not a known level.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// `logging.format` is not `json` or `pretty`.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// `logging.rotation` is not `daily`, `hourly` or `never`.
    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    /// `database.path` is blank.
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    /// `database.max_connections` is 0.
    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    /// `embedding.dimension` is 0.
    #[error("Invalid embedding dimension: {0}. Must be at least 1")]
    InvalidEmbeddingDimension(usize),

    /// A required string setting is blank.
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    /// `refinement.target_score` is outside 1..=5.
    #[error("Invalid target_score: {0}. Must be between 1 and 5")]
    InvalidTargetScore(f64),

    /// `refinement.max_iterations` exceeds the limit.
    #[error("Invalid max_iterations: {0}. Must be at most {MAX_ITERATIONS_LIMIT}")]
    InvalidMaxIterations(u32),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `.reqsmith/config.yaml`
    /// 3. `.reqsmith/local.yaml`
    /// 4. Environment variables (`REQSMITH_*`, nested with `__`)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment(&[
            Path::new(PROJECT_CONFIG_FILE),
            Path::new(LOCAL_CONFIG_FILE),
        ])
        .extract()
        .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file. Environment overrides still
    /// apply on top of it.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Self::figment(&[path])
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(files: &[&Path]) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        for file in files {
            figment = figment.merge(Yaml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        if config.openai.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyField("openai.base_url"));
        }
        if config.openai.model.trim().is_empty() {
            return Err(ConfigError::EmptyField("openai.model"));
        }
        if config.embedding.model.trim().is_empty() {
            return Err(ConfigError::EmptyField("embedding.model"));
        }
        if config.embedding.dimension == 0 {
            return Err(ConfigError::InvalidEmbeddingDimension(
                config.embedding.dimension,
            ));
        }

        let target = config.refinement.target_score;
        if !(1.0..=5.0).contains(&target) {
            return Err(ConfigError::InvalidTargetScore(target));
        }
        if config.refinement.max_iterations > MAX_ITERATIONS_LIMIT {
            return Err(ConfigError::InvalidMaxIterations(
                config.refinement.max_iterations,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".reqsmith/reqsmith.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.generation.max_repairs, 2);
        assert_eq!(config.refinement.max_iterations, 3);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /custom/path.db
  max_connections: 2
logging:
  level: debug
  format: json
openai:
  model: gpt-4o
  temperature: 0.0
embedding:
  dimension: 3
refinement:
  max_iterations: 5
  target_score: 4.5
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.openai.model, "gpt-4o");
        assert_eq!(config.embedding.dimension, 3);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.refinement.max_iterations, 5);
        assert_eq!(config.refinement.force_min_iterations, 1);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "verbose"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogFormat(_)
        ));
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = "  ".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyDatabasePath
        ));
    }

    #[test]
    fn test_validate_zero_max_connections() {
        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxConnections(0)
        ));
    }

    #[test]
    fn test_validate_zero_embedding_dimension() {
        let mut config = Config::default();
        config.embedding.dimension = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidEmbeddingDimension(0)
        ));
    }

    #[test]
    fn test_validate_empty_model() {
        let mut config = Config::default();
        config.openai.model = String::new();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyField("openai.model")
        ));
    }

    #[test]
    fn test_validate_target_score_range() {
        let mut config = Config::default();
        config.refinement.target_score = 5.5;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidTargetScore(_)
        ));

        config.refinement.target_score = 0.5;
        assert!(ConfigLoader::validate(&config).is_err());

        config.refinement.target_score = 5.0;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_max_iterations_limit() {
        let mut config = Config::default();
        config.refinement.max_iterations = 21;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxIterations(21)
        ));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = ConfigLoader::load_from_file("/nonexistent/reqsmith.yaml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let file = yaml_file("refinement:\n  target_score: 9.0\n");
        let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn test_hierarchical_merging() {
        let base = yaml_file("logging:\n  level: info\n  format: json\ngeneration:\n  max_repairs: 4\n");
        let local = yaml_file("logging:\n  level: debug\n");

        let config: Config = temp_env::with_var_unset("REQSMITH_LOGGING__LEVEL", || {
            ConfigLoader::figment(&[base.path(), local.path()])
                .extract()
                .unwrap()
        });

        assert_eq!(config.logging.level, "debug", "Override should win");
        assert_eq!(config.logging.format, "json", "Base value should persist");
        assert_eq!(config.generation.max_repairs, 4);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = yaml_file("logging:\n  level: info\nrefinement:\n  max_iterations: 2\n");

        let config = temp_env::with_vars(
            [
                ("REQSMITH_LOGGING__LEVEL", Some("warn")),
                ("REQSMITH_REFINEMENT__MAX_ITERATIONS", Some("6")),
                ("REQSMITH_GENERATION__CALL_TIMEOUT_SECS", Some("30")),
            ],
            || ConfigLoader::load_from_file(file.path()).unwrap(),
        );

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.refinement.max_iterations, 6);
        assert_eq!(config.generation.call_timeout_secs, Some(30));
    }
}
