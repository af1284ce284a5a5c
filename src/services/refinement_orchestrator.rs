//! Agentic refinement loop.
//!
//! ```text
//! GENERATED(0) -> [target met and no forced passes left] -> CONVERGED
//!              -> critique -> [critic satisfied]        -> CONVERGED
//!                          -> refine -> score -> REFINED -> (loop)
//! budget spent                                           -> EXHAUSTED
//! critique/refine/score error                            -> FAILED (best result returned)
//! ```
//!
//! The best-result pointer starts at iteration 0 and only moves to an
//! iteration that satisfies hard constraints, so a bundle failing hard
//! constraints is never returned once an earlier one passed them.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::audit_trail::{round3, AuditTrail};
use super::call_deadline::with_deadline;
use super::quality_gate::QualityGate;
use super::semantic_cache::SemanticCache;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AuditEvent, Bundle, Critique, Epic, IterationRecord, QualityReport, RefinementConfig,
    RefinementOutcome, RefinementState, StopReason, MAX_AUDITED_VIOLATIONS,
};
use crate::domain::ports::{Critic, Refiner};

/// A scored bundle produced by one iteration.
#[derive(Debug, Clone)]
struct Candidate {
    iteration: u32,
    bundle: Bundle,
    report: QualityReport,
}

impl Candidate {
    fn hard_ok(&self) -> bool {
        self.report.hard_constraints_ok
    }

    fn score(&self) -> f64 {
        self.report.avg_score
    }
}

/// Whether `candidate` should replace `best` as the best-known result.
///
/// Only candidates that satisfy hard constraints qualify. A passing candidate
/// always replaces a failing best, and replaces a passing best on an equal or
/// higher score.
fn supersedes(candidate: &Candidate, best: &Candidate) -> bool {
    candidate.hard_ok() && (!best.hard_ok() || candidate.score() >= best.score())
}

/// Bundle returned when the critic stops the loop.
fn critic_stop_selection(current: Candidate, best: &Candidate) -> Candidate {
    if !current.hard_ok() && best.hard_ok() {
        best.clone()
    } else {
        current
    }
}

/// Outcome of one critique/refine pass.
enum Pass {
    Satisfied,
    Refined { candidate: Candidate, edits: usize },
}

/// Runs generate → score → critique → refine until the bundle converges or
/// the budget runs out.
pub struct RefinementOrchestrator {
    cache: Arc<SemanticCache>,
    gate: QualityGate,
    critic: Arc<dyn Critic>,
    refiner: Arc<dyn Refiner>,
    config: RefinementConfig,
    call_timeout: Option<Duration>,
}

impl RefinementOrchestrator {
    /// Orchestrator with no per-call deadline.
    pub fn new(
        cache: Arc<SemanticCache>,
        gate: QualityGate,
        critic: Arc<dyn Critic>,
        refiner: Arc<dyn Refiner>,
        config: RefinementConfig,
    ) -> Self {
        Self {
            cache,
            gate,
            critic,
            refiner,
            config,
            call_timeout: None,
        }
    }

    /// Bound every critique and refine call by `limit`.
    pub fn with_call_timeout(mut self, limit: Option<Duration>) -> Self {
        self.call_timeout = limit;
        self
    }

    /// Loop budget and target.
    pub fn config(&self) -> &RefinementConfig {
        &self.config
    }

    /// Run the loop to completion.
    pub async fn run(&self, epic: &Epic) -> DomainResult<RefinementOutcome> {
        self.run_loop(epic).await
    }

    /// Run the loop, aborting with [`DomainError::Cancelled`] as soon as
    /// `cancel` fires. Nothing from an aborted run is returned.
    pub async fn run_with_cancellation(
        &self,
        epic: &Epic,
        cancel: CancellationToken,
    ) -> DomainResult<RefinementOutcome> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                warn!(epic_id = %epic.epic_id, "refinement run cancelled");
                Err(DomainError::Cancelled)
            }
            result = self.run_loop(epic) => result,
        }
    }

    /// Cache-backed generation plus one quality evaluation, no critique.
    #[instrument(skip_all, fields(epic_id = %epic.epic_id))]
    pub async fn run_baseline(&self, epic: &Epic) -> DomainResult<RefinementOutcome> {
        let run_id = Uuid::new_v4();
        let mut trail = AuditTrail::new();

        let generation = self.cache.generate(epic).await?;
        let report = self.gate.evaluate(epic, &generation.bundle)?;
        trail.record(iteration_result(0, &generation.bundle, &report, 0, None));
        info!(%run_id, avg_score = report.avg_score, hard_ok = report.hard_constraints_ok, "baseline scored");

        let stop_reason = StopReason::Baseline;
        Ok(RefinementOutcome {
            run_id,
            epic_id: epic.epic_id.clone(),
            iterations: vec![IterationRecord::from_report(0, &report, 0)],
            bundle: generation.bundle,
            report,
            selected_iteration: 0,
            state: stop_reason.final_state(),
            stop_reason,
            cache_metadata: generation.metadata,
            audit: trail.into_records(),
        })
    }

    #[instrument(skip_all, fields(epic_id = %epic.epic_id))]
    async fn run_loop(&self, epic: &Epic) -> DomainResult<RefinementOutcome> {
        let run_id = Uuid::new_v4();
        let mut trail = AuditTrail::new();

        // Iteration 0 failures have no fallback and propagate.
        let generation = self.cache.generate(epic).await?;
        let report = self.gate.evaluate(epic, &generation.bundle)?;
        trail.record(iteration_result(0, &generation.bundle, &report, 0, None));
        info!(
            %run_id,
            iteration = 0,
            avg_score = report.avg_score,
            hard_ok = report.hard_constraints_ok,
            cache_hit = %generation.decision.kind(),
            "initial bundle scored"
        );

        let mut iterations = vec![IterationRecord::from_report(0, &report, 0)];
        let mut current = Candidate {
            iteration: 0,
            bundle: generation.bundle,
            report,
        };
        let mut best = current.clone();
        let mut forced_remaining = self.config.force_min_iterations;
        let mut iteration: u32 = 0;

        let (selected, stop_reason) = loop {
            if current.report.meets(self.config.target_score) && forced_remaining == 0 {
                break (best.clone(), StopReason::TargetMet);
            }
            if iteration >= self.config.max_iterations {
                break (best.clone(), StopReason::Exhausted);
            }
            iteration += 1;

            match self.pass(epic, &current, iteration, &mut trail).await {
                Ok(Pass::Satisfied) => {
                    break (critic_stop_selection(current, &best), StopReason::CriticSatisfied);
                }
                Ok(Pass::Refined { candidate, edits }) => {
                    iterations.push(IterationRecord::from_report(
                        iteration,
                        &candidate.report,
                        edits,
                    ));
                    if supersedes(&candidate, &best) {
                        best = candidate.clone();
                    }
                    current = candidate;
                    forced_remaining = forced_remaining.saturating_sub(1);
                }
                Err(err) if err.is_cancellation() => return Err(err),
                Err(err) => {
                    warn!(iteration, error = %err, best_iteration = best.iteration, "refinement pass failed, returning best result");
                    trail.record(AuditEvent::Error {
                        iteration,
                        error: err.to_string(),
                    });
                    break (
                        best.clone(),
                        StopReason::StepFailed {
                            iteration,
                            error: err.to_string(),
                        },
                    );
                }
            }
        };

        let state = stop_reason.final_state();
        info!(
            %run_id,
            state = state.as_str(),
            selected_iteration = selected.iteration,
            avg_score = selected.report.avg_score,
            hard_ok = selected.report.hard_constraints_ok,
            "refinement finished"
        );

        Ok(RefinementOutcome {
            run_id,
            epic_id: epic.epic_id.clone(),
            bundle: selected.bundle,
            report: selected.report,
            selected_iteration: selected.iteration,
            state,
            stop_reason,
            cache_metadata: generation.metadata,
            iterations,
            audit: trail.into_records(),
        })
    }

    /// Critique `current` and, unless the critic is satisfied, refine and
    /// re-score it as `iteration`.
    async fn pass(
        &self,
        epic: &Epic,
        current: &Candidate,
        iteration: u32,
        trail: &mut AuditTrail,
    ) -> DomainResult<Pass> {
        let critique = with_deadline(
            self.call_timeout,
            "critique",
            self.critic.critique(epic, &current.bundle, &current.report),
        )
        .await?;
        trail.record(AuditEvent::Critique {
            iteration,
            should_iterate: critique.should_iterate,
            summary: critique.summary.clone(),
            edits_count: critique.edits.len(),
        });

        if !critique.should_iterate {
            info!(iteration, state = RefinementState::Critiqued.as_str(), summary = %critique.summary, "critic satisfied");
            return Ok(Pass::Satisfied);
        }

        let bundle = with_deadline(
            self.call_timeout,
            "refine",
            self.refiner.refine(epic, &current.bundle, &critique),
        )
        .await?;
        let report = self.gate.evaluate(epic, &bundle)?;

        trail.record(iteration_result(
            iteration,
            &bundle,
            &report,
            critique.edits.len(),
            Some(&critique),
        ));
        info!(
            iteration,
            avg_score = report.avg_score,
            hard_ok = report.hard_constraints_ok,
            edits = critique.edits.len(),
            state = RefinementState::Refined.as_str(),
            "refined bundle scored"
        );

        Ok(Pass::Refined {
            candidate: Candidate {
                iteration,
                bundle,
                report,
            },
            edits: critique.edits.len(),
        })
    }
}

fn iteration_result(
    iteration: u32,
    bundle: &Bundle,
    report: &QualityReport,
    edits_count: usize,
    critique: Option<&Critique>,
) -> AuditEvent {
    AuditEvent::IterationResult {
        iteration,
        avg_score: round3(report.avg_score),
        hard_ok: report.hard_constraints_ok,
        gherkin_ok: report.gherkin_ok,
        trace_ok: report.traceability_ok,
        hard_violations: report
            .hard_violations
            .iter()
            .take(MAX_AUDITED_VIOLATIONS)
            .cloned()
            .collect(),
        stories: bundle.stories.len(),
        scenarios: bundle.scenarios.len(),
        edits_count,
        critic_summary: critique.map(|c| c.summary.clone()),
    }
}
