//! Shared fakes for integration tests.
//!
//! Bundles produced here carry a version number in their story text and
//! scenario title so scripted scorers can tell iterations apart.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use reqsmith::domain::models::{
    Bundle, CacheStats, CachedBundle, CheckOutcome, Critique, EditAction, EditInstruction, Epic,
    GherkinScenario, InvestAssessment, InvestScores, IssueType, NewBundleRecord, QualityReport,
    SimilarMatch, SimilarityLookup, StoreOutcome, TraceMap, UserStory,
};
use reqsmith::domain::ports::{
    AmbiguityDetector, BundleGenerator, BundleStore, Critic, EmbeddingProvider, GenerationMode,
    GherkinValidator, InvestScorer, Refiner, TraceChecker,
};
use reqsmith::{DomainError, DomainResult, QualityGate};

pub const RESET_PASSWORD: &str =
    "As a user, I want to reset my password so that I can regain access.";

/// Initialize tracing output for a test. Safe to call repeatedly.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn reset_password_epic() -> Epic {
    Epic::new("E-1", RESET_PASSWORD)
}

/// One story, one scenario, fully traced, tagged with `version`.
pub fn versioned_bundle(epic_id: &str, version: u32) -> Bundle {
    let mut trace_map = TraceMap::new();
    trace_map.insert("US-001".to_string(), vec!["SC-001".to_string()]);
    Bundle {
        stories: vec![UserStory {
            story_id: "US-001".to_string(),
            epic_id: epic_id.to_string(),
            role: "user".to_string(),
            goal: "reset my password".to_string(),
            benefit: "I can regain access".to_string(),
            story_text: format!("version {version}"),
            assumptions: vec![],
            open_questions: vec![],
        }],
        scenarios: vec![GherkinScenario {
            scenario_id: "SC-001".to_string(),
            story_id: "US-001".to_string(),
            title: format!("version {version}"),
            given: vec!["a registered user".to_string()],
            when: vec!["they request a reset link".to_string()],
            then: vec!["an email is sent".to_string()],
        }],
        trace_map,
    }
}

fn version_of(text: &str) -> u32 {
    text.strip_prefix("version ")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

pub fn bundle_version(bundle: &Bundle) -> u32 {
    bundle.stories.first().map_or(0, |s| version_of(&s.story_text))
}

// ---------------------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------------------

/// Returns the vector of the first needle contained in the text.
pub struct FixedEmbedder {
    vectors: Vec<(String, Vec<f32>)>,
    default: Vec<f32>,
    pub calls: AtomicUsize,
}

impl FixedEmbedder {
    pub fn new(default: Vec<f32>) -> Self {
        Self {
            vectors: Vec::new(),
            default,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, needle: &str, vector: Vec<f32>) -> Self {
        self.vectors.push((needle.to_lowercase(), vector));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn dimension(&self) -> usize {
        self.default.len()
    }

    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .vectors
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map_or_else(|| self.default.clone(), |(_, v)| v.clone()))
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Fresh generation yields version 0; adaptation yields version 100.
#[derive(Default)]
pub struct ScriptedGenerator {
    pub calls: AtomicUsize,
    pub modes: Mutex<Vec<String>>,
    pub drafts: Mutex<Vec<Bundle>>,
}

pub const ADAPTED_VERSION: u32 = 100;

impl ScriptedGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn modes(&self) -> Vec<String> {
        self.modes.lock().unwrap().clone()
    }
}

#[async_trait]
impl BundleGenerator for ScriptedGenerator {
    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn generate(&self, epic: &Epic, mode: GenerationMode<'_>) -> DomainResult<Bundle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.modes.lock().unwrap().push(mode.as_str().to_string());
        match mode {
            GenerationMode::Fresh => Ok(versioned_bundle(&epic.epic_id, 0)),
            GenerationMode::Adapt { draft, .. } => {
                self.drafts.lock().unwrap().push(draft.clone());
                Ok(versioned_bundle(&epic.epic_id, ADAPTED_VERSION))
            }
        }
    }
}

/// Generator that always fails, for propagation tests.
pub struct FailingGenerator;

#[async_trait]
impl BundleGenerator for FailingGenerator {
    fn model(&self) -> &str {
        "failing-model"
    }

    async fn generate(&self, _: &Epic, _: GenerationMode<'_>) -> DomainResult<Bundle> {
        Err(DomainError::SchemaValidation {
            attempts: 3,
            message: "stories: must contain at least one story".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Critique and refinement
// ---------------------------------------------------------------------------

/// Asks for one edit on every call unless told to stop or fail on a call
/// (1-based).
#[derive(Default)]
pub struct ScriptedCritic {
    pub stop_on_call: Option<usize>,
    pub fail_on_call: Option<usize>,
    pub calls: AtomicUsize,
}

impl ScriptedCritic {
    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn stopping_on(call: usize) -> Self {
        Self {
            stop_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Critic for ScriptedCritic {
    async fn critique(
        &self,
        _: &Epic,
        bundle: &Bundle,
        _: &QualityReport,
    ) -> DomainResult<Critique> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(DomainError::GenerationFailed("critic unavailable".to_string()));
        }
        if self.stop_on_call == Some(call) {
            return Ok(Critique::stop("good enough"));
        }
        Ok(Critique::iterate(
            format!("improve version {}", bundle_version(bundle)),
            vec![EditInstruction {
                issue_type: IssueType::InvestTestable,
                target_id: "US-001".to_string(),
                action: EditAction::RewriteStory,
                rationale: "benefit is vague".to_string(),
                patch_guidance: "state a measurable outcome".to_string(),
            }],
        ))
    }
}

/// Returns the input bundle with its version incremented.
#[derive(Default)]
pub struct ScriptedRefiner {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Refiner for ScriptedRefiner {
    async fn refine(&self, epic: &Epic, bundle: &Bundle, _: &Critique) -> DomainResult<Bundle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(versioned_bundle(&epic.epic_id, bundle_version(bundle) + 1))
    }
}

/// Refiner that never returns.
pub struct HangingRefiner;

#[async_trait]
impl Refiner for HangingRefiner {
    async fn refine(&self, _: &Epic, _: &Bundle, _: &Critique) -> DomainResult<Bundle> {
        std::future::pending().await
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Per-version INVEST scores and hard-constraint result.
///
/// Versions without an entry score a uniform 3 and pass. Versions marked
/// with `failing_on` make the INVEST scorer return an error.
#[derive(Default)]
pub struct ScriptedQuality {
    script: HashMap<u32, (InvestScores, bool)>,
    failing: HashSet<u32>,
}

impl ScriptedQuality {
    pub fn with(mut self, version: u32, scores: InvestScores, hard_ok: bool) -> Self {
        self.script.insert(version, (scores, hard_ok));
        self
    }

    pub fn failing_on(mut self, version: u32) -> Self {
        self.failing.insert(version);
        self
    }

    fn lookup(&self, version: u32) -> (InvestScores, bool) {
        self.script
            .get(&version)
            .copied()
            .unwrap_or((InvestScores::uniform(3), true))
    }
}

impl InvestScorer for ScriptedQuality {
    fn score(&self, story: &UserStory, _: &[GherkinScenario]) -> DomainResult<InvestAssessment> {
        let version = version_of(&story.story_text);
        if self.failing.contains(&version) {
            return Err(DomainError::ScoringFailed(format!(
                "invest scorer unavailable for version {version}"
            )));
        }
        Ok(InvestAssessment {
            scores: self.lookup(version).0,
            issues: Vec::new(),
        })
    }
}

impl GherkinValidator for ScriptedQuality {
    fn validate(&self, scenarios: &[GherkinScenario]) -> DomainResult<CheckOutcome> {
        let version = scenarios.first().map_or(0, |s| version_of(&s.title));
        if self.lookup(version).1 {
            Ok(CheckOutcome::pass())
        } else {
            Ok(CheckOutcome::from_violations(vec![
                "SC-001: missing THEN step(s).".to_string(),
            ]))
        }
    }
}

pub struct PassingTrace;

impl TraceChecker for PassingTrace {
    fn check(&self, _: &Epic, _: &Bundle) -> DomainResult<CheckOutcome> {
        Ok(CheckOutcome::pass())
    }
}

pub struct NoAmbiguity;

impl AmbiguityDetector for NoAmbiguity {
    fn detect(&self, _: &Epic, _: &Bundle) -> DomainResult<Vec<String>> {
        Ok(Vec::new())
    }
}

pub fn scripted_gate(quality: ScriptedQuality) -> QualityGate {
    let quality = Arc::new(quality);
    QualityGate::new(
        quality.clone(),
        quality,
        Arc::new(PassingTrace),
        Arc::new(NoAmbiguity),
    )
}

/// Scores with the given mean, built from six integer sub-scores.
pub fn scores(values: [u8; 6]) -> InvestScores {
    InvestScores {
        independent: values[0],
        negotiable: values[1],
        valuable: values[2],
        estimable: values[3],
        small: values[4],
        testable: values[5],
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// In-memory store whose nearest neighbour is a fixed record at a fixed
/// similarity. The neighbour is reported only at or above the requested
/// minimum, as a real store would.
pub struct FixedSimilarityStore {
    neighbour: CachedBundle,
    similarity: f64,
    by_hash: Mutex<HashMap<String, CachedBundle>>,
    pub writes: Mutex<Vec<NewBundleRecord>>,
}

pub const NEIGHBOUR_REQUIREMENT_ID: i64 = 41;

impl FixedSimilarityStore {
    pub fn new(similarity: f64) -> Self {
        Self {
            neighbour: cached(NEIGHBOUR_REQUIREMENT_ID, "neighbour-hash", versioned_bundle("E-0", 7)),
            similarity,
            by_hash: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

pub fn cached(requirement_id: i64, hash: &str, bundle: Bundle) -> CachedBundle {
    CachedBundle {
        requirement_id,
        artifact_id: requirement_id,
        fingerprint_hash: hash.to_string(),
        bundle,
        model: "scripted-model".to_string(),
        prompt_version: "v1".to_string(),
        cache_metadata: None,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl BundleStore for FixedSimilarityStore {
    async fn find_by_hash(&self, fingerprint_hash: &str) -> DomainResult<Option<CachedBundle>> {
        Ok(self.by_hash.lock().unwrap().get(fingerprint_hash).cloned())
    }

    async fn find_by_similarity(
        &self,
        _: &[f32],
        min_similarity: f64,
    ) -> DomainResult<SimilarityLookup> {
        if !self.similarity.is_finite() {
            return Ok(SimilarityLookup::Invalid {
                similarity: self.similarity,
                requirement_id: self.neighbour.requirement_id,
            });
        }
        if self.similarity < min_similarity {
            return Ok(SimilarityLookup::Miss);
        }
        Ok(SimilarityLookup::Hit(SimilarMatch {
            cached: self.neighbour.clone(),
            similarity: self.similarity,
            source_requirement_id: self.neighbour.requirement_id,
        }))
    }

    async fn store_bundle(&self, record: NewBundleRecord) -> DomainResult<StoreOutcome> {
        let mut by_hash = self.by_hash.lock().unwrap();
        if let Some(existing) = by_hash.get(&record.fingerprint_hash) {
            return Ok(StoreOutcome::AlreadyCached(existing.clone()));
        }
        let id = i64::try_from(by_hash.len()).unwrap_or(0) + 100;
        let mut entry = cached(id, &record.fingerprint_hash, record.bundle.clone());
        entry.cache_metadata = Some(record.cache_metadata.clone());
        by_hash.insert(record.fingerprint_hash.clone(), entry.clone());
        self.writes.lock().unwrap().push(record);
        Ok(StoreOutcome::Created(entry))
    }

    async fn get_artifact(&self, requirement_id: i64) -> DomainResult<Option<CachedBundle>> {
        if requirement_id == self.neighbour.requirement_id {
            return Ok(Some(self.neighbour.clone()));
        }
        Ok(self
            .by_hash
            .lock()
            .unwrap()
            .values()
            .find(|c| c.requirement_id == requirement_id)
            .cloned())
    }

    async fn stats(&self) -> DomainResult<CacheStats> {
        Ok(CacheStats::default())
    }
}
