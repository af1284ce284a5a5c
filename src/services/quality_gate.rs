//! Quality gate: aggregates the external scoring collaborators into one
//! report per bundle.
//!
//! Per-story score:
//! `clamp(1, 5, mean(INVEST) - 0.2*issues - 0.3*hard_violations_mentioning_story
//!  - 0.05*ambiguities_mentioning_story)`.
//! Run score: mean of story scores, or 0 when there are no stories.

use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Bundle, Epic, QualityReport, StoryQualityReport};
use crate::domain::ports::{AmbiguityDetector, GherkinValidator, InvestScorer, TraceChecker};

/// Deducted per INVEST issue.
pub const INVEST_ISSUE_PENALTY: f64 = 0.2;
/// Deducted per hard violation naming the story.
pub const HARD_VIOLATION_PENALTY: f64 = 0.3;
/// Deducted per ambiguity naming the story.
pub const AMBIGUITY_PENALTY: f64 = 0.05;
/// Lower clamp of a story score.
pub const MIN_STORY_SCORE: f64 = 1.0;
/// Upper clamp of a story score.
pub const MAX_STORY_SCORE: f64 = 5.0;

/// Aggregate score of one story.
pub fn story_score(
    invest_mean: f64,
    invest_issues: usize,
    hard_violations_mentioning: usize,
    ambiguities_mentioning: usize,
) -> f64 {
    let penalty = INVEST_ISSUE_PENALTY * invest_issues as f64
        + HARD_VIOLATION_PENALTY * hard_violations_mentioning as f64
        + AMBIGUITY_PENALTY * ambiguities_mentioning as f64;
    (invest_mean - penalty).clamp(MIN_STORY_SCORE, MAX_STORY_SCORE)
}

fn mentions(messages: &[String], story_id: &str) -> usize {
    messages.iter().filter(|m| m.contains(story_id)).count()
}

/// Runs the scorers and folds their output into a [`QualityReport`].
#[derive(Clone)]
pub struct QualityGate {
    invest: Arc<dyn InvestScorer>,
    gherkin: Arc<dyn GherkinValidator>,
    trace: Arc<dyn TraceChecker>,
    ambiguity: Arc<dyn AmbiguityDetector>,
}

impl QualityGate {
    /// Gate over the four scoring collaborators.
    pub fn new(
        invest: Arc<dyn InvestScorer>,
        gherkin: Arc<dyn GherkinValidator>,
        trace: Arc<dyn TraceChecker>,
        ambiguity: Arc<dyn AmbiguityDetector>,
    ) -> Self {
        Self {
            invest,
            gherkin,
            trace,
            ambiguity,
        }
    }

    /// Score `bundle` against `epic`.
    ///
    /// A bundle without stories fails hard constraints and scores 0.
    pub fn evaluate(&self, epic: &Epic, bundle: &Bundle) -> DomainResult<QualityReport> {
        let gherkin = self.gherkin.validate(&bundle.scenarios)?;
        let trace = self.trace.check(epic, bundle)?;
        let ambiguities = self.ambiguity.detect(epic, bundle)?;

        let mut hard_violations = gherkin.violations;
        hard_violations.extend(trace.violations);

        if bundle.stories.is_empty() {
            hard_violations.push("bundle contains no stories".to_string());
            return Ok(QualityReport {
                stories: Vec::new(),
                hard_constraints_ok: false,
                gherkin_ok: gherkin.ok,
                traceability_ok: trace.ok,
                hard_violations,
                ambiguities,
                avg_score: 0.0,
            });
        }

        let mut stories = Vec::with_capacity(bundle.stories.len());
        for story in &bundle.stories {
            let assessment = self.invest.score(story, &bundle.scenarios)?;
            assessment.scores.validate().map_err(|e| {
                DomainError::ScoringFailed(format!("story {}: {e}", story.story_id))
            })?;

            let overall_score = story_score(
                assessment.scores.mean(),
                assessment.issues.len(),
                mentions(&hard_violations, &story.story_id),
                mentions(&ambiguities, &story.story_id),
            );

            let mut violations = assessment.issues;
            violations.extend(hard_violations.iter().cloned());

            stories.push(StoryQualityReport {
                story_id: story.story_id.clone(),
                invest: assessment.scores,
                gherkin_valid: gherkin.ok,
                ambiguities: ambiguities.clone(),
                violations,
                overall_score,
            });
        }

        let avg_score =
            stories.iter().map(|s| s.overall_score).sum::<f64>() / stories.len() as f64;

        Ok(QualityReport {
            stories,
            hard_constraints_ok: gherkin.ok && trace.ok,
            gherkin_ok: gherkin.ok,
            traceability_ok: trace.ok,
            hard_violations,
            ambiguities,
            avg_score,
        })
    }
}
