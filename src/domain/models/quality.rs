//! Quality report domain model.
//!
//! Reports produced by the quality gate. The scoring heuristics themselves
//! live behind the ports in [`crate::domain::ports::quality`].

use serde::{Deserialize, Serialize};

/// Six INVEST sub-scores, each on a 1–5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestScores {
    /// I
    #[serde(rename = "I")]
    pub independent: u8,
    /// N
    #[serde(rename = "N")]
    pub negotiable: u8,
    /// V
    #[serde(rename = "V")]
    pub valuable: u8,
    /// E
    #[serde(rename = "E")]
    pub estimable: u8,
    /// S
    #[serde(rename = "S")]
    pub small: u8,
    /// T
    #[serde(rename = "T")]
    pub testable: u8,
}

impl InvestScores {
    /// All six sub-scores set to `score`.
    pub const fn uniform(score: u8) -> Self {
        Self {
            independent: score,
            negotiable: score,
            valuable: score,
            estimable: score,
            small: score,
            testable: score,
        }
    }

    /// Sub-scores in INVEST order.
    pub const fn as_array(&self) -> [u8; 6] {
        [
            self.independent,
            self.negotiable,
            self.valuable,
            self.estimable,
            self.small,
            self.testable,
        ]
    }

    /// Fail if any sub-score is outside 1..=5.
    pub fn validate(&self) -> Result<(), String> {
        const NAMES: [&str; 6] = ["I", "N", "V", "E", "S", "T"];
        for (name, score) in NAMES.iter().zip(self.as_array()) {
            if !(1..=5).contains(&score) {
                return Err(format!("INVEST {name} score {score} is outside 1..=5"));
            }
        }
        Ok(())
    }

    /// Unweighted mean of the six sub-scores.
    pub fn mean(&self) -> f64 {
        f64::from(self.as_array().iter().map(|&s| u32::from(s)).sum::<u32>()) / 6.0
    }
}

/// Pass/fail result of a structural check plus its violations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// `true` when there are no violations.
    pub ok: bool,
    /// Human-readable problems, naming the offending ids.
    pub violations: Vec<String>,
}

impl CheckOutcome {
    /// A clean outcome.
    pub fn pass() -> Self {
        Self {
            ok: true,
            violations: Vec::new(),
        }
    }

    /// Outcome that passes iff `violations` is empty.
    pub fn from_violations(violations: Vec<String>) -> Self {
        Self {
            ok: violations.is_empty(),
            violations,
        }
    }
}

/// INVEST scores for one story plus the issues that lowered them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestAssessment {
    /// INVEST sub-scores.
    pub scores: InvestScores,
    /// Issues naming the story, one penalty each.
    pub issues: Vec<String>,
}

/// Per-story quality report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryQualityReport {
    /// Story the report covers.
    pub story_id: String,
    /// INVEST sub-scores.
    pub invest: InvestScores,
    /// Bundle-level Gherkin check result.
    pub gherkin_valid: bool,
    /// Bundle-level ambiguity findings.
    pub ambiguities: Vec<String>,
    /// INVEST issues followed by every hard violation of the bundle.
    pub violations: Vec<String>,
    /// Aggregate story score, clamped to [1, 5].
    pub overall_score: f64,
}

/// Run-level quality report for one bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// One report per story, in bundle order.
    pub stories: Vec<StoryQualityReport>,
    /// Structural Gherkin validity AND full traceability.
    pub hard_constraints_ok: bool,
    /// Gherkin structure check passed.
    pub gherkin_ok: bool,
    /// Traceability check passed.
    pub traceability_ok: bool,
    /// Gherkin violations followed by traceability violations.
    pub hard_violations: Vec<String>,
    /// Ambiguity findings across the bundle.
    pub ambiguities: Vec<String>,
    /// Mean of per-story scores; 0 for a bundle without stories.
    pub avg_score: f64,
}

impl QualityReport {
    /// Hard constraints hold and the score reaches `target_score`.
    pub fn meets(&self, target_score: f64) -> bool {
        self.hard_constraints_ok && self.avg_score >= target_score
    }
}
