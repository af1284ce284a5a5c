//! Audit trail records emitted by a refinement run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum hard violations copied into one `iteration_result` record.
pub const MAX_AUDITED_VIOLATIONS: usize = 20;

/// Orchestrator event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// An iteration was scored.
    IterationResult {
        /// Iteration number.
        iteration: u32,
        /// Rounded to three decimals.
        avg_score: f64,
        /// Hard constraints passed.
        hard_ok: bool,
        /// Gherkin structure check passed.
        gherkin_ok: bool,
        /// Traceability check passed.
        trace_ok: bool,
        /// At most [`MAX_AUDITED_VIOLATIONS`] entries.
        hard_violations: Vec<String>,
        /// Story count of the bundle.
        stories: usize,
        /// Scenario count of the bundle.
        scenarios: usize,
        /// Edits that produced this iteration.
        edits_count: usize,
        /// Summary of the critique that produced this iteration.
        critic_summary: Option<String>,
    },
    /// The critic reviewed the current bundle.
    Critique {
        /// Iteration being produced.
        iteration: u32,
        /// Critic verdict.
        should_iterate: bool,
        /// Critic summary.
        summary: String,
        /// Edits proposed.
        edits_count: usize,
    },
    /// A pass failed.
    Error {
        /// Iteration that failed.
        iteration: u32,
        /// Rendered error.
        error: String,
    },
}

impl AuditEvent {
    /// Event tag as serialized.
    pub fn name(&self) -> &'static str {
        match self {
            Self::IterationResult { .. } => "iteration_result",
            Self::Critique { .. } => "critique",
            Self::Error { .. } => "error",
        }
    }

    /// Iteration the event belongs to.
    pub fn iteration(&self) -> u32 {
        match self {
            Self::IterationResult { iteration, .. }
            | Self::Critique { iteration, .. }
            | Self::Error { iteration, .. } => *iteration,
        }
    }
}

/// One timestamped audit line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Wall-clock time of the event.
    pub ts: DateTime<Utc>,
    /// Seconds since the run started, rounded to milliseconds.
    pub elapsed_s: f64,
    /// Event payload, flattened into the record.
    #[serde(flatten)]
    pub event: AuditEvent,
}
