//! reqsmith CLI entry point.

use clap::Parser;

use reqsmith::cli::{commands, handle_error, Cli, Commands};
use reqsmith::infrastructure::logging::{LogConfig, LoggerImpl};
use reqsmith::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging follows the config when it loads; commands report config errors themselves.
    let log_config = match cli.config.as_deref() {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
    .ok()
    .and_then(|config| LogConfig::try_from(&config.logging).ok())
    .unwrap_or_default();
    let _logger = LoggerImpl::init(&log_config).ok();

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Fingerprint(args) => commands::fingerprint::execute(args, cli.json).await,
        Commands::Generate(args) => commands::generate::execute(args, config_path, cli.json).await,
        Commands::Cache(args) => commands::cache::execute(args, config_path, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
