//! Prompt text for the generator, critic, refiner and JSON repair calls.

use serde::Serialize;

use super::chat::ChatMessage;
use crate::domain::errors::DomainResult;
use crate::domain::models::{Bundle, Critique, Epic, QualityReport};

/// System prompt for fresh generation.
pub const GENERATOR_SYSTEM: &str = "You are a requirements engineering assistant.
Turn the epic into user stories and Gherkin acceptance scenarios.

Hard rules:
- Respond with a single JSON object and nothing else.
- Top-level keys: stories, scenarios, trace_map.
- Story ids are US-001, US-002, ...; scenario ids are SC-001, SC-002, ...
- Every story carries the input epic_id verbatim.
- Every scenario has at least one given, one when and one then step.
- Record uncertainty as assumptions or open_questions instead of guessing.";

/// System prompt for adapting a cached bundle.
pub const ADAPT_SYSTEM: &str = "You are a requirements engineering assistant.
You receive an epic and a draft bundle that was generated for a similar epic.
Adapt the draft so it fits the new epic exactly: keep what still applies,
rewrite what differs, drop what no longer applies, add what is missing.

Hard rules:
- Respond with a single JSON object and nothing else.
- Top-level keys: stories, scenarios, trace_map.
- Every story carries the new epic_id verbatim.
- Every scenario has at least one given, one when and one then step.";

/// System prompt for the critic.
pub const CRITIC_SYSTEM: &str = "You are a requirements engineering critic.
You do not rewrite stories; you find problems and describe edits.

Rules:
- Respond with a single JSON object: should_iterate, summary, edits.
- issue_type is one of INVEST_Independent, INVEST_Negotiable, INVEST_Valuable,
  INVEST_Estimable, INVEST_Small, INVEST_Testable, Gherkin_Structure,
  Ambiguity, Traceability, Other.
- action is one of rewrite_story, split_story, revise_scenario, add_scenario,
  clarify_assumptions.
- target_id must be an existing story or scenario id.
- patch_guidance must be concrete enough to apply without further context.";

/// System prompt for the refiner.
pub const REFINER_SYSTEM: &str = "You are a requirements engineering refiner.
Apply the critique's edit instructions to the bundle.

Rules:
- Respond with a single JSON object: stories, scenarios, trace_map.
- Keep existing ids where possible; continue numbering for new items.
- Every scenario has at least one given, one when and one then step.
- Stay within the epic's scope; add open_questions instead of inventing scope.";

const REPAIR_SYSTEM: &str = "You are a JSON repair tool. Respond with corrected JSON only.";

/// JSON shape a bundle response must follow.
pub const BUNDLE_SHAPE: &str = r#"{
  "stories": [{"story_id": "US-001", "epic_id": "...", "role": "...", "goal": "...",
               "benefit": "...", "story_text": "...", "assumptions": [], "open_questions": []}],
  "scenarios": [{"scenario_id": "SC-001", "story_id": "US-001", "title": "...",
                 "given": ["..."], "when": ["..."], "then": ["..."]}],
  "trace_map": {"US-001": ["SC-001"]}
}"#;

/// JSON shape a critique response must follow.
pub const CRITIQUE_SHAPE: &str = r#"{
  "should_iterate": true,
  "summary": "...",
  "edits": [{"issue_type": "INVEST_Testable", "target_id": "US-001", "action": "rewrite_story",
             "rationale": "...", "patch_guidance": "..."}]
}"#;

/// Messages asking for a bundle from the epic alone.
pub fn fresh_messages(epic: &Epic) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(GENERATOR_SYSTEM),
        ChatMessage::user(format!(
            "Epic ID: {}\n\nEpic text:\n{}\n\nConstraints:\n{}\n\nGlossary:\n{}\n\n\
             Return JSON shaped like:\n{BUNDLE_SHAPE}",
            epic.epic_id,
            epic.text.trim(),
            epic.constraints_block(),
            epic.glossary_block(),
        )),
    ]
}

/// Messages asking the model to adapt `draft` to `epic`.
pub fn adapt_messages(epic: &Epic, draft: &Bundle, similarity: f64) -> DomainResult<Vec<ChatMessage>> {
    Ok(vec![
        ChatMessage::system(ADAPT_SYSTEM),
        ChatMessage::user(format!(
            "Epic ID: {}\n\nEpic text:\n{}\n\nConstraints:\n{}\n\nGlossary:\n{}\n\n\
             Draft bundle (similarity {similarity:.2} to this epic):\n{}\n\n\
             Return JSON shaped like:\n{BUNDLE_SHAPE}",
            epic.epic_id,
            epic.text.trim(),
            epic.constraints_block(),
            epic.glossary_block(),
            serde_json::to_string_pretty(draft)?,
        )),
    ])
}

#[derive(Serialize)]
struct CritiquePayload<'a> {
    epic: &'a Epic,
    bundle: &'a Bundle,
    avg_score: f64,
    hard_constraints_ok: bool,
    hard_violations: &'a [String],
    ambiguities: &'a [String],
}

/// Messages asking for a critique of `bundle`.
pub fn critique_messages(
    epic: &Epic,
    bundle: &Bundle,
    report: &QualityReport,
) -> DomainResult<Vec<ChatMessage>> {
    let payload = CritiquePayload {
        epic,
        bundle,
        avg_score: report.avg_score,
        hard_constraints_ok: report.hard_constraints_ok,
        hard_violations: &report.hard_violations,
        ambiguities: &report.ambiguities,
    };
    Ok(vec![
        ChatMessage::system(CRITIC_SYSTEM),
        ChatMessage::user(format!(
            "Critique this requirement bundle:\n{}\n\nReturn JSON shaped like:\n{CRITIQUE_SHAPE}",
            serde_json::to_string_pretty(&payload)?
        )),
    ])
}

#[derive(Serialize)]
struct RefinePayload<'a> {
    epic: &'a Epic,
    bundle: &'a Bundle,
    critique: &'a Critique,
}

/// Messages asking for `bundle` revised per `critique`.
pub fn refine_messages(
    epic: &Epic,
    bundle: &Bundle,
    critique: &Critique,
) -> DomainResult<Vec<ChatMessage>> {
    let payload = RefinePayload {
        epic,
        bundle,
        critique,
    };
    Ok(vec![
        ChatMessage::system(REFINER_SYSTEM),
        ChatMessage::user(format!(
            "Apply the edits to this JSON:\n{}\n\nReturn JSON shaped like:\n{BUNDLE_SHAPE}",
            serde_json::to_string_pretty(&payload)?
        )),
    ])
}

/// Ask the model to fix `bad_json` given the validation error.
pub fn repair_messages(shape: &str, error: &str, bad_json: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(REPAIR_SYSTEM),
        ChatMessage::user(format!(
            "Fix the JSON so it matches the required shape.\n\nShape:\n{shape}\n\n\
             Validation error:\n{error}\n\nBad JSON:\n{bad_json}\n\nReturn only the corrected JSON."
        )),
    ]
}
