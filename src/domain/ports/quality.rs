//! Quality scoring ports.
//!
//! The heuristics behind these traits are external collaborators; the
//! quality gate only aggregates their results.

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    Bundle, CheckOutcome, Epic, GherkinScenario, InvestAssessment, UserStory,
};

/// Rates one story on the six INVEST dimensions.
pub trait InvestScorer: Send + Sync {
    /// Score one story; `scenarios` is the whole bundle's scenario list.
    fn score(
        &self,
        story: &UserStory,
        scenarios: &[GherkinScenario],
    ) -> DomainResult<InvestAssessment>;
}

/// Structural Given/When/Then validation over all scenarios.
pub trait GherkinValidator: Send + Sync {
    /// Check GIVEN/WHEN/THEN structure.
    fn validate(&self, scenarios: &[GherkinScenario]) -> DomainResult<CheckOutcome>;
}

/// Story ↔ scenario traceability check.
pub trait TraceChecker: Send + Sync {
    /// Check that every story is traced to scenarios that exist.
    fn check(&self, epic: &Epic, bundle: &Bundle) -> DomainResult<CheckOutcome>;
}

/// Finds ambiguous wording. Each hit is a message naming where it occurred.
pub trait AmbiguityDetector: Send + Sync {
    /// List vague wording, naming the story or `epic` it occurs in.
    fn detect(&self, epic: &Epic, bundle: &Bundle) -> DomainResult<Vec<String>>;
}
