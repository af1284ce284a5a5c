//! Refinement loop domain model.
//!
//! Critique and edit instructions exchanged with the critic and refiner,
//! per-iteration records, the loop state machine, and the run outcome.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::audit::AuditRecord;
use super::bundle::Bundle;
use super::cache::CacheMetadata;
use super::quality::QualityReport;

/// Category of a problem the critic found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueType {
    /// Story depends on another story.
    #[serde(rename = "INVEST_Independent")]
    InvestIndependent,
    /// Story prescribes implementation.
    #[serde(rename = "INVEST_Negotiable")]
    InvestNegotiable,
    /// Benefit is missing or weak.
    #[serde(rename = "INVEST_Valuable")]
    InvestValuable,
    /// Too vague to size.
    #[serde(rename = "INVEST_Estimable")]
    InvestEstimable,
    /// Too large for one iteration.
    #[serde(rename = "INVEST_Small")]
    InvestSmall,
    /// No verifiable outcome.
    #[serde(rename = "INVEST_Testable")]
    InvestTestable,
    /// Malformed GIVEN/WHEN/THEN structure.
    #[serde(rename = "Gherkin_Structure")]
    GherkinStructure,
    /// Vague wording.
    Ambiguity,
    /// Story and scenario links are incomplete.
    Traceability,
    /// Anything else.
    Other,
}

/// What the refiner is asked to do to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditAction {
    /// Rewrite the story text.
    RewriteStory,
    /// Split the story into smaller ones.
    SplitStory,
    /// Rework an existing scenario.
    ReviseScenario,
    /// Add a scenario for the story.
    AddScenario,
    /// Make assumptions explicit.
    ClarifyAssumptions,
}

/// One actionable edit against an existing story or scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditInstruction {
    /// What is wrong.
    pub issue_type: IssueType,
    /// Existing story or scenario id.
    pub target_id: String,
    /// What to change.
    pub action: EditAction,
    /// Why the edit is needed.
    pub rationale: String,
    /// Concrete instructions for the refiner.
    pub patch_guidance: String,
}

/// Critic verdict on a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Critique {
    /// `false` ends the loop.
    pub should_iterate: bool,
    /// One-line verdict.
    pub summary: String,
    /// Edits to apply when iterating.
    #[serde(default)]
    pub edits: Vec<EditInstruction>,
}

impl Critique {
    /// A verdict that ends the loop.
    pub fn stop(summary: impl Into<String>) -> Self {
        Self {
            should_iterate: false,
            summary: summary.into(),
            edits: Vec::new(),
        }
    }

    /// A verdict asking for another pass with `edits`.
    pub fn iterate(summary: impl Into<String>, edits: Vec<EditInstruction>) -> Self {
        Self {
            should_iterate: true,
            summary: summary.into(),
            edits,
        }
    }

    /// Parse and check a critique produced by a generative model.
    pub fn from_json_str(raw: &str) -> Result<Self, String> {
        let critique: Self =
            serde_json::from_str(raw).map_err(|e| format!("invalid critique JSON: {e}"))?;
        for (idx, edit) in critique.edits.iter().enumerate() {
            if edit.target_id.trim().is_empty() {
                return Err(format!("edits[{idx}].target_id: must not be empty"));
            }
            if edit.patch_guidance.trim().is_empty() {
                return Err(format!("edits[{idx}].patch_guidance: must not be empty"));
            }
        }
        Ok(critique)
    }
}

/// Summary of one loop pass. Immutable once appended to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 0 is the initial generation.
    pub iteration: u32,
    /// Bundle score on the 1–5 scale.
    pub avg_score: f64,
    /// Gherkin and traceability checks both passed.
    pub hard_constraints_ok: bool,
    /// Gherkin structure check passed.
    pub structural_ok: bool,
    /// Traceability check passed.
    pub traceability_ok: bool,
    /// Edits the refiner was given to produce this iteration.
    pub edits_applied: usize,
}

impl IterationRecord {
    /// Summarize a quality report.
    pub fn from_report(iteration: u32, report: &QualityReport, edits_applied: usize) -> Self {
        Self {
            iteration,
            avg_score: report.avg_score,
            hard_constraints_ok: report.hard_constraints_ok,
            structural_ok: report.gherkin_ok,
            traceability_ok: report.traceability_ok,
            edits_applied,
        }
    }
}

/// Refinement loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementState {
    /// Initial bundle produced and scored.
    Generated,
    /// Critic has reviewed the current bundle.
    Critiqued,
    /// Refined bundle produced and scored.
    Refined,
    /// Target met, critic satisfied, or baseline done.
    Converged,
    /// Iteration budget used up.
    Exhausted,
    /// A pass failed; best result returned.
    Failed,
}

impl RefinementState {
    /// Whether a run in this state has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converged | Self::Exhausted | Self::Failed)
    }

    /// Name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Critiqued => "critiqued",
            Self::Refined => "refined",
            Self::Converged => "converged",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// Hard constraints held and the target score was reached.
    TargetMet,
    /// The critic reported no further iteration is needed.
    CriticSatisfied,
    /// `max_iterations` passes ran without meeting the target.
    Exhausted,
    /// A pass failed; the best-known result was returned.
    StepFailed {
        /// Pass that failed.
        iteration: u32,
        /// Rendered error.
        error: String,
    },
    /// Single-pass run without critique.
    Baseline,
}

impl StopReason {
    /// State a run ends in for this reason.
    pub fn final_state(&self) -> RefinementState {
        match self {
            Self::TargetMet | Self::CriticSatisfied | Self::Baseline => RefinementState::Converged,
            Self::Exhausted => RefinementState::Exhausted,
            Self::StepFailed { .. } => RefinementState::Failed,
        }
    }
}

/// Loop budget and target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Upper bound on critique/refine passes after the initial generation.
    pub max_iterations: u32,
    /// Average score the run aims for, on the 1–5 scale.
    pub target_score: f64,
    /// Passes that run even when iteration 0 already meets the target.
    pub force_min_iterations: u32,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            target_score: 4.2,
            force_min_iterations: 1,
        }
    }
}

/// Final result of a refinement run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementOutcome {
    /// Unique per run; names the export directory.
    pub run_id: Uuid,
    /// Epic the run refined.
    pub epic_id: String,
    /// The selected bundle.
    pub bundle: Bundle,
    /// Quality report of the selected bundle.
    pub report: QualityReport,
    /// Iteration that produced the selected bundle.
    pub selected_iteration: u32,
    /// Final state.
    pub state: RefinementState,
    /// Why the run stopped.
    pub stop_reason: StopReason,
    /// Metadata of the cache decision that produced iteration 0.
    pub cache_metadata: CacheMetadata,
    /// One record per scored iteration, in order.
    pub iterations: Vec<IterationRecord>,
    /// Audit trail of the run.
    pub audit: Vec<AuditRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_critique_with_original_enum_names() {
        let raw = r#"{
            "should_iterate": true,
            "summary": "Scenario SC-002 lacks a THEN step",
            "edits": [{
                "issue_type": "Gherkin_Structure",
                "target_id": "SC-002",
                "action": "revise_scenario",
                "rationale": "missing outcome",
                "patch_guidance": "Add a THEN step asserting the email is sent"
            }]
        }"#;
        let critique = Critique::from_json_str(raw).unwrap();
        assert!(critique.should_iterate);
        assert_eq!(critique.edits[0].issue_type, IssueType::GherkinStructure);
        assert_eq!(critique.edits[0].action, EditAction::ReviseScenario);
    }

    #[test]
    fn test_critique_rejects_blank_target() {
        let raw = r#"{"should_iterate": true, "summary": "x", "edits": [{
            "issue_type": "Other", "target_id": " ", "action": "rewrite_story",
            "rationale": "r", "patch_guidance": "g"}]}"#;
        assert_eq!(
            Critique::from_json_str(raw).unwrap_err(),
            "edits[0].target_id: must not be empty"
        );
    }

    #[test]
    fn test_critique_rejects_unknown_issue_type() {
        let raw = r#"{"should_iterate": false, "summary": "x", "edits": [{
            "issue_type": "Style", "target_id": "US-001", "action": "rewrite_story",
            "rationale": "r", "patch_guidance": "g"}]}"#;
        assert!(Critique::from_json_str(raw).is_err());
    }

    #[test]
    fn test_stop_reason_states() {
        assert_eq!(StopReason::TargetMet.final_state(), RefinementState::Converged);
        assert_eq!(StopReason::Exhausted.final_state(), RefinementState::Exhausted);
        let failed = StopReason::StepFailed {
            iteration: 2,
            error: "boom".into(),
        };
        assert_eq!(failed.final_state(), RefinementState::Failed);
        assert!(failed.final_state().is_terminal());
        assert!(!RefinementState::Critiqued.is_terminal());
    }

    #[test]
    fn test_config_defaults() {
        let config = RefinementConfig::default();
        assert_eq!(config.max_iterations, 3);
        assert!((config.target_score - 4.2).abs() < f64::EPSILON);
        assert_eq!(config.force_min_iterations, 1);
    }
}
