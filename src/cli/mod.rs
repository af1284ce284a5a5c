//! Command-line front end.

pub mod commands;
pub mod context;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::cache::CacheArgs;
use commands::fingerprint::FingerprintArgs;
use commands::generate::GenerateArgs;

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(name = "reqsmith")]
#[command(about = "Turn epics into cached, scored requirement bundles", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Config file (defaults to .reqsmith/config.yaml + .reqsmith/local.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the normalized text and fingerprint of an epic
    Fingerprint(FingerprintArgs),
    /// Serve a requirements bundle for an epic through the semantic cache
    Generate(GenerateArgs),
    /// Inspect the bundle cache
    Cache(CacheArgs),
}

/// Print `err` and exit with a non-zero status.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "error": err.to_string(),
            "chain": err.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        });
        eprintln!("{body}");
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
