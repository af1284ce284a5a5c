//! Audit trail for refinement runs.
//!
//! Records are append-only and timestamped relative to the start of the run.
//! A finished run can be exported as `audit_log.jsonl`, `iteration_scores.csv`
//! and `bundle.json` under `<dir>/<epic_id>/<run_id>/`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AuditEvent, AuditRecord, IterationRecord, RefinementOutcome};

/// Audit records, one JSON object per line.
pub const AUDIT_LOG_FILE: &str = "audit_log.jsonl";
/// Per-iteration score table.
pub const ITERATION_SCORES_FILE: &str = "iteration_scores.csv";
/// Selected bundle.
pub const BUNDLE_FILE: &str = "bundle.json";

const ITERATION_SCORES_HEADER: &str = "iteration,avg_score,hard_ok,gherkin_ok,trace_ok,edits_count";

/// Round to three decimals for audit output.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Append-only recorder for one run.
#[derive(Debug)]
pub struct AuditTrail {
    started: Instant,
    records: Vec<AuditRecord>,
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditTrail {
    /// Start a trail; elapsed times are measured from now.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            records: Vec::new(),
        }
    }

    /// Append `event` with the current timestamp.
    pub fn record(&mut self, event: AuditEvent) {
        let elapsed_s = round3(self.started.elapsed().as_secs_f64());
        debug!(event = event.name(), iteration = event.iteration(), elapsed_s, "audit");
        self.records.push(AuditRecord {
            ts: Utc::now(),
            elapsed_s,
            event,
        });
    }

    /// Records so far, in order.
    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    /// Finish the trail.
    pub fn into_records(self) -> Vec<AuditRecord> {
        self.records
    }
}

/// One JSON object per line, each line newline-terminated.
pub fn to_jsonl(records: &[AuditRecord]) -> DomainResult<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Flat per-iteration score table.
pub fn iteration_scores_csv(iterations: &[IterationRecord]) -> String {
    let mut lines = Vec::with_capacity(iterations.len() + 1);
    lines.push(ITERATION_SCORES_HEADER.to_string());
    for it in iterations {
        lines.push(format!(
            "{},{},{},{},{},{}",
            it.iteration,
            round3(it.avg_score),
            it.hard_constraints_ok,
            it.structural_ok,
            it.traceability_ok,
            it.edits_applied
        ));
    }
    let mut csv = lines.join("\n");
    csv.push('\n');
    csv
}

/// Directory a run is exported to.
pub fn run_dir(base: &Path, outcome: &RefinementOutcome) -> PathBuf {
    base.join(&outcome.epic_id).join(outcome.run_id.to_string())
}

/// Write the audit log, score table and selected bundle of a finished run.
pub async fn export_run(base: &Path, outcome: &RefinementOutcome) -> DomainResult<PathBuf> {
    let dir = run_dir(base, outcome);
    let io_err = |e: std::io::Error| DomainError::ExportFailed(format!("{}: {e}", dir.display()));

    tokio::fs::create_dir_all(&dir).await.map_err(io_err)?;
    tokio::fs::write(dir.join(AUDIT_LOG_FILE), to_jsonl(&outcome.audit)?)
        .await
        .map_err(io_err)?;
    tokio::fs::write(
        dir.join(ITERATION_SCORES_FILE),
        iteration_scores_csv(&outcome.iterations),
    )
    .await
    .map_err(io_err)?;
    tokio::fs::write(
        dir.join(BUNDLE_FILE),
        serde_json::to_string_pretty(&outcome.bundle)?,
    )
    .await
    .map_err(io_err)?;

    info!(path = %dir.display(), records = outcome.audit.len(), "run exported");
    Ok(dir)
}
