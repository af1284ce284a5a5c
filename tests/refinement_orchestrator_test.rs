//! Refinement loop behaviour with scripted collaborators.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use reqsmith::domain::models::{
    AuditEvent, Bundle, InvestScores, RefinementConfig, RefinementOutcome, RefinementState,
    StopReason,
};
use reqsmith::domain::ports::Refiner;
use reqsmith::services::audit_trail::{AUDIT_LOG_FILE, BUNDLE_FILE, ITERATION_SCORES_FILE};
use reqsmith::services::export_run;
use reqsmith::{DomainError, RefinementOrchestrator, SemanticCache};
use tokio_util::sync::CancellationToken;

struct Harness {
    orchestrator: RefinementOrchestrator,
    critic: Arc<ScriptedCritic>,
    refiner: Arc<ScriptedRefiner>,
}

fn config(max_iterations: u32, target_score: f64, force_min_iterations: u32) -> RefinementConfig {
    RefinementConfig {
        max_iterations,
        target_score,
        force_min_iterations,
    }
}

fn fresh_cache() -> Arc<SemanticCache> {
    Arc::new(SemanticCache::new(
        Arc::new(FixedSimilarityStore::new(0.0)),
        Arc::new(FixedEmbedder::new(vec![1.0, 0.0])),
        Arc::new(ScriptedGenerator::default()),
    ))
}

fn harness(quality: ScriptedQuality, critic: ScriptedCritic, config: RefinementConfig) -> Harness {
    let critic = Arc::new(critic);
    let refiner = Arc::new(ScriptedRefiner::default());
    let orchestrator = RefinementOrchestrator::new(
        fresh_cache(),
        scripted_gate(quality),
        critic.clone(),
        refiner.clone(),
        config,
    );
    Harness {
        orchestrator,
        critic,
        refiner,
    }
}

/// v0 fails hard constraints at 3.0, then 4.0, 3.5 and 4.5 all pass.
fn rising_then_dipping() -> ScriptedQuality {
    ScriptedQuality::default()
        .with(0, InvestScores::uniform(3), false)
        .with(1, InvestScores::uniform(4), true)
        .with(2, scores([4, 4, 4, 3, 3, 3]), true)
        .with(3, scores([5, 5, 5, 4, 4, 4]), true)
}

fn iteration_results(outcome: &RefinementOutcome) -> Vec<u32> {
    outcome
        .audit
        .iter()
        .filter_map(|r| match r.event {
            AuditEvent::IterationResult { iteration, .. } => Some(iteration),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_best_result_is_highest_passing_iteration() {
    setup_test_logging();
    let h = harness(rising_then_dipping(), ScriptedCritic::default(), config(3, 4.8, 1));

    let outcome = h.orchestrator.run(&reset_password_epic()).await.unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Exhausted);
    assert_eq!(outcome.state, RefinementState::Exhausted);
    assert_eq!(outcome.selected_iteration, 3);
    assert_eq!(bundle_version(&outcome.bundle), 3);
    assert!((outcome.report.avg_score - 4.5).abs() < 1e-12);

    let scores: Vec<f64> = outcome.iterations.iter().map(|i| i.avg_score).collect();
    assert_eq!(scores, vec![3.0, 4.0, 3.5, 4.5]);
    assert_eq!(h.critic.calls(), 3);
}

#[tokio::test]
async fn test_exhausted_run_returns_best_not_last() {
    let quality = ScriptedQuality::default()
        .with(0, InvestScores::uniform(3), false)
        .with(1, scores([5, 5, 5, 4, 4, 4]), true)
        .with(2, InvestScores::uniform(4), true)
        .with(3, scores([4, 4, 4, 3, 3, 3]), true);
    let h = harness(quality, ScriptedCritic::default(), config(3, 4.8, 1));

    let outcome = h.orchestrator.run(&reset_password_epic()).await.unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Exhausted);
    assert_eq!(outcome.selected_iteration, 1);
    assert_eq!(bundle_version(&outcome.bundle), 1);
    assert_eq!(outcome.iterations.len(), 4);
}

#[tokio::test]
async fn test_target_met_stops_early() {
    let h = harness(rising_then_dipping(), ScriptedCritic::default(), config(5, 4.2, 1));

    let outcome = h.orchestrator.run(&reset_password_epic()).await.unwrap();

    assert_eq!(outcome.stop_reason, StopReason::TargetMet);
    assert_eq!(outcome.state, RefinementState::Converged);
    assert_eq!(outcome.selected_iteration, 3);
    assert_eq!(h.refiner.calls.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_forced_minimum_runs_a_pass_even_when_target_met() {
    let quality = ScriptedQuality::default()
        .with(0, InvestScores::uniform(5), true)
        .with(1, InvestScores::uniform(5), true);
    let h = harness(quality, ScriptedCritic::default(), config(3, 4.2, 1));

    let outcome = h.orchestrator.run(&reset_password_epic()).await.unwrap();

    assert_eq!(h.critic.calls(), 1);
    assert_eq!(h.refiner.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(outcome.stop_reason, StopReason::TargetMet);
    assert_eq!(outcome.iterations.len(), 2);
    assert_eq!(outcome.selected_iteration, 1);
}

#[tokio::test]
async fn test_without_forced_passes_target_met_at_generation_skips_loop() {
    let quality = ScriptedQuality::default().with(0, InvestScores::uniform(5), true);
    let h = harness(quality, ScriptedCritic::default(), config(3, 4.2, 0));

    let outcome = h.orchestrator.run(&reset_password_epic()).await.unwrap();

    assert_eq!(h.critic.calls(), 0);
    assert_eq!(outcome.selected_iteration, 0);
    assert_eq!(outcome.stop_reason, StopReason::TargetMet);
    assert_eq!(outcome.audit.len(), 1);
}

#[tokio::test]
async fn test_critic_failure_returns_best_with_error_record() {
    let quality = ScriptedQuality::default()
        .with(0, InvestScores::uniform(3), false)
        .with(1, InvestScores::uniform(4), true);
    let h = harness(quality, ScriptedCritic::failing_on(2), config(3, 4.8, 1));

    let outcome = h.orchestrator.run(&reset_password_epic()).await.unwrap();

    assert_eq!(outcome.selected_iteration, 1);
    assert_eq!(bundle_version(&outcome.bundle), 1);
    assert_eq!(outcome.state, RefinementState::Failed);
    match &outcome.stop_reason {
        StopReason::StepFailed { iteration, error } => {
            assert_eq!(*iteration, 2);
            assert!(error.contains("critic unavailable"));
        }
        other => panic!("unexpected stop reason: {other:?}"),
    }

    assert_eq!(error_iterations(&outcome), vec![2]);
    assert_eq!(iteration_results(&outcome), vec![0, 1]);
    assert_eq!(outcome.iterations.len(), 2);
}

fn error_iterations(outcome: &RefinementOutcome) -> Vec<u32> {
    outcome
        .audit
        .iter()
        .filter_map(|r| match r.event {
            AuditEvent::Error { iteration, .. } => Some(iteration),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_scoring_failure_mid_run_returns_best_with_error_record() {
    let quality = ScriptedQuality::default()
        .with(0, InvestScores::uniform(3), false)
        .with(1, InvestScores::uniform(4), true)
        .failing_on(2);
    let h = harness(quality, ScriptedCritic::default(), config(4, 4.8, 0));

    let outcome = h.orchestrator.run(&reset_password_epic()).await.unwrap();

    assert_eq!(outcome.state, RefinementState::Failed);
    match &outcome.stop_reason {
        StopReason::StepFailed { iteration, error } => {
            assert_eq!(*iteration, 2);
            assert!(error.contains("invest scorer unavailable"));
        }
        other => panic!("unexpected stop reason: {other:?}"),
    }
    assert_eq!(outcome.selected_iteration, 1);
    assert_eq!(bundle_version(&outcome.bundle), 1);
    assert!(outcome.report.hard_constraints_ok);

    assert_eq!(error_iterations(&outcome), vec![2]);
    assert_eq!(iteration_results(&outcome), vec![0, 1]);
    assert_eq!(outcome.iterations.len(), 2);
    assert_eq!(h.refiner.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_out_of_range_scores_on_refined_bundle_stop_the_run() {
    let quality = ScriptedQuality::default()
        .with(0, InvestScores::uniform(4), true)
        .with(1, InvestScores::uniform(6), true);
    let h = harness(quality, ScriptedCritic::default(), config(3, 4.8, 0));

    let outcome = h.orchestrator.run(&reset_password_epic()).await.unwrap();

    assert!(matches!(
        outcome.stop_reason,
        StopReason::StepFailed { iteration: 1, .. }
    ));
    assert_eq!(outcome.selected_iteration, 0);
    assert_eq!(bundle_version(&outcome.bundle), 0);
    assert_eq!(error_iterations(&outcome), vec![1]);
    assert_eq!(iteration_results(&outcome), vec![0]);
}

#[tokio::test]
async fn test_critic_stop_returns_current_bundle() {
    let quality = ScriptedQuality::default()
        .with(0, InvestScores::uniform(3), true)
        .with(1, InvestScores::uniform(4), true);
    let h = harness(quality, ScriptedCritic::stopping_on(2), config(3, 4.8, 1));

    let outcome = h.orchestrator.run(&reset_password_epic()).await.unwrap();

    assert_eq!(outcome.stop_reason, StopReason::CriticSatisfied);
    assert_eq!(outcome.state, RefinementState::Converged);
    assert_eq!(outcome.selected_iteration, 1);
}

#[tokio::test]
async fn test_critic_stop_never_returns_failing_bundle_over_passing_one() {
    let quality = ScriptedQuality::default()
        .with(0, InvestScores::uniform(3), false)
        .with(1, InvestScores::uniform(4), true)
        .with(2, InvestScores::uniform(5), false);
    let h = harness(quality, ScriptedCritic::stopping_on(3), config(5, 4.8, 1));

    let outcome = h.orchestrator.run(&reset_password_epic()).await.unwrap();

    assert_eq!(outcome.stop_reason, StopReason::CriticSatisfied);
    assert_eq!(outcome.selected_iteration, 1);
    assert!(outcome.report.hard_constraints_ok);
}

#[tokio::test]
async fn test_no_passing_iteration_falls_back_to_generation() {
    let quality = ScriptedQuality::default()
        .with(0, InvestScores::uniform(3), false)
        .with(1, InvestScores::uniform(5), false)
        .with(2, InvestScores::uniform(4), false);
    let h = harness(quality, ScriptedCritic::default(), config(2, 4.2, 1));

    let outcome = h.orchestrator.run(&reset_password_epic()).await.unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Exhausted);
    assert_eq!(outcome.selected_iteration, 0);
}

#[tokio::test]
async fn test_audit_trail_order_and_fields() {
    let h = harness(rising_then_dipping(), ScriptedCritic::default(), config(1, 4.8, 1));

    let outcome = h.orchestrator.run(&reset_password_epic()).await.unwrap();

    let names: Vec<&str> = outcome.audit.iter().map(|r| r.event.name()).collect();
    assert_eq!(names, vec!["iteration_result", "critique", "iteration_result"]);
    assert!(outcome
        .audit
        .windows(2)
        .all(|w| w[0].elapsed_s <= w[1].elapsed_s));

    match &outcome.audit[0].event {
        AuditEvent::IterationResult {
            hard_ok,
            hard_violations,
            critic_summary,
            edits_count,
            ..
        } => {
            assert!(!hard_ok);
            assert_eq!(hard_violations.len(), 1);
            assert!(critic_summary.is_none());
            assert_eq!(*edits_count, 0);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    match &outcome.audit[2].event {
        AuditEvent::IterationResult {
            iteration,
            edits_count,
            critic_summary,
            ..
        } => {
            assert_eq!(*iteration, 1);
            assert_eq!(*edits_count, 1);
            assert_eq!(critic_summary.as_deref(), Some("improve version 0"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_generation_failure_propagates() {
    let cache = Arc::new(SemanticCache::new(
        Arc::new(FixedSimilarityStore::new(0.0)),
        Arc::new(FixedEmbedder::new(vec![1.0, 0.0])),
        Arc::new(FailingGenerator),
    ));
    let orchestrator = RefinementOrchestrator::new(
        cache,
        scripted_gate(ScriptedQuality::default()),
        Arc::new(ScriptedCritic::default()),
        Arc::new(ScriptedRefiner::default()),
        RefinementConfig::default(),
    );

    let err = orchestrator.run(&reset_password_epic()).await.unwrap_err();
    assert!(matches!(err, DomainError::SchemaValidation { .. }));
}

#[tokio::test]
async fn test_cancellation_aborts_run() {
    let refiner: Arc<dyn Refiner> = Arc::new(HangingRefiner);
    let orchestrator = RefinementOrchestrator::new(
        fresh_cache(),
        scripted_gate(ScriptedQuality::default()),
        Arc::new(ScriptedCritic::default()),
        refiner,
        config(3, 4.8, 1),
    );

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = orchestrator
        .run_with_cancellation(&reset_password_epic(), token)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Cancelled));
}

#[tokio::test]
async fn test_call_deadline_failure_is_recovered_as_step_failure() {
    let refiner: Arc<dyn Refiner> = Arc::new(HangingRefiner);
    let quality = ScriptedQuality::default().with(0, InvestScores::uniform(4), true);
    let orchestrator = RefinementOrchestrator::new(
        fresh_cache(),
        scripted_gate(quality),
        Arc::new(ScriptedCritic::default()),
        refiner,
        config(3, 4.8, 1),
    )
    .with_call_timeout(Some(Duration::from_millis(50)));

    let outcome = orchestrator.run(&reset_password_epic()).await.unwrap();

    assert_eq!(outcome.selected_iteration, 0);
    assert!(matches!(
        outcome.stop_reason,
        StopReason::StepFailed { iteration: 1, .. }
    ));
}

#[tokio::test]
async fn test_baseline_scores_once_without_critique() {
    let h = harness(rising_then_dipping(), ScriptedCritic::default(), config(3, 4.2, 1));

    let outcome = h
        .orchestrator
        .run_baseline(&reset_password_epic())
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Baseline);
    assert_eq!(outcome.state, RefinementState::Converged);
    assert_eq!(outcome.iterations.len(), 1);
    assert_eq!(h.critic.calls(), 0);
    assert_eq!(iteration_results(&outcome), vec![0]);
}

#[tokio::test]
async fn test_export_writes_run_directory() {
    let h = harness(rising_then_dipping(), ScriptedCritic::default(), config(3, 4.8, 1));
    let outcome = h.orchestrator.run(&reset_password_epic()).await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let run_dir = export_run(dir.path(), &outcome).await.unwrap();

    assert_eq!(
        run_dir,
        dir.path().join("E-1").join(outcome.run_id.to_string())
    );

    let jsonl = std::fs::read_to_string(run_dir.join(AUDIT_LOG_FILE)).unwrap();
    assert_eq!(jsonl.lines().count(), outcome.audit.len());
    for line in jsonl.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value["event"].is_string());
        assert!(value["elapsed_s"].is_number());
    }

    let csv = std::fs::read_to_string(run_dir.join(ITERATION_SCORES_FILE)).unwrap();
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(rows[0], "iteration,avg_score,hard_ok,gherkin_ok,trace_ok,edits_count");
    assert_eq!(rows[1], "0,3,false,false,true,0");
    assert_eq!(rows[4], "3,4.5,true,true,true,1");

    let bundle: Bundle =
        serde_json::from_str(&std::fs::read_to_string(run_dir.join(BUNDLE_FILE)).unwrap())
            .unwrap();
    assert_eq!(bundle_version(&bundle), 3);
}
