//! `reqsmith fingerprint`

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Fingerprint;

/// Arguments for `fingerprint`.
#[derive(Args, Debug)]
pub struct FingerprintArgs {
    /// Epic JSON file
    #[arg(short, long)]
    pub epic: PathBuf,
}

/// Output of `fingerprint`.
#[derive(Debug, Serialize)]
pub struct FingerprintOutput {
    /// Epic id from the input file.
    pub epic_id: String,
    /// Hex SHA-256 of `normalized_text`.
    pub fingerprint: String,
    /// Normalized cache input.
    pub normalized_text: String,
}

impl CommandOutput for FingerprintOutput {
    fn to_human(&self) -> String {
        format!(
            "Epic:        {}\nFingerprint: {}\n\n{}",
            self.epic_id, self.fingerprint, self.normalized_text
        )
    }
}

/// Print the fingerprint of an epic file.
pub async fn execute(args: FingerprintArgs, json_mode: bool) -> Result<()> {
    let epic = super::read_epic(&args.epic).await?;
    let fingerprint = Fingerprint::of(&epic);

    output(
        &FingerprintOutput {
            epic_id: epic.epic_id,
            fingerprint: fingerprint.hash,
            normalized_text: fingerprint.normalized_text,
        },
        json_mode,
    );
    Ok(())
}
