//! Requirement bundle domain model.
//!
//! A bundle is the generated artifact set for an epic: user stories, Gherkin
//! acceptance scenarios and a story → scenario trace map. The persisted JSON
//! shape is `{stories, scenarios, traceMap}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Story id → ordered scenario ids. Sorted keys keep serialized bundles stable.
pub type TraceMap = BTreeMap<String, Vec<String>>;

/// A single user story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserStory {
    /// Unique within the bundle, e.g. `US-001`.
    pub story_id: String,
    /// Epic the story was generated for.
    pub epic_id: String,
    /// The "As a" part.
    pub role: String,
    /// The "I want" part.
    pub goal: String,
    /// The "so that" part.
    pub benefit: String,
    /// Full rendered story sentence.
    pub story_text: String,
    /// Assumptions the story relies on.
    #[serde(default)]
    pub assumptions: Vec<String>,
    /// Questions for the product owner.
    #[serde(default)]
    pub open_questions: Vec<String>,
}

/// A Gherkin acceptance scenario attached to one story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GherkinScenario {
    /// Unique within the bundle, e.g. `SC-001`.
    pub scenario_id: String,
    /// Story this scenario accepts.
    pub story_id: String,
    /// Scenario title.
    pub title: String,
    /// GIVEN steps.
    #[serde(default)]
    pub given: Vec<String>,
    /// WHEN steps.
    #[serde(default)]
    pub when: Vec<String>,
    /// THEN steps.
    #[serde(default)]
    pub then: Vec<String>,
}

/// Generated artifact set. Opaque to the cache; validated by generators.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Bundle {
    /// User stories.
    pub stories: Vec<UserStory>,
    /// Acceptance scenarios.
    pub scenarios: Vec<GherkinScenario>,
    /// Serialized as `traceMap`.
    #[serde(alias = "trace_map", default)]
    pub trace_map: TraceMap,
}

impl Bundle {
    /// Parse and schema-check a bundle produced by a generative model.
    ///
    /// Errors are plain strings so they can be fed back into a repair prompt.
    pub fn from_json_str(raw: &str) -> Result<Self, String> {
        let bundle: Self =
            serde_json::from_str(raw).map_err(|e| format!("invalid bundle JSON: {e}"))?;
        bundle.validate_schema()?;
        Ok(bundle)
    }

    /// Structural checks a generated bundle must pass before it is accepted.
    ///
    /// This is not the quality gate: traceability and Gherkin completeness
    /// are scored later, this only rejects output that is not a bundle at all.
    pub fn validate_schema(&self) -> Result<(), String> {
        if self.stories.is_empty() {
            return Err("stories: must contain at least one story".to_string());
        }
        if self.scenarios.is_empty() {
            return Err("scenarios: must contain at least one scenario".to_string());
        }

        for (idx, story) in self.stories.iter().enumerate() {
            for (field, value) in [
                ("story_id", &story.story_id),
                ("epic_id", &story.epic_id),
                ("role", &story.role),
                ("goal", &story.goal),
                ("benefit", &story.benefit),
                ("story_text", &story.story_text),
            ] {
                if value.trim().is_empty() {
                    return Err(format!("stories[{idx}].{field}: must not be empty"));
                }
            }
        }

        for (idx, scenario) in self.scenarios.iter().enumerate() {
            for (field, value) in [
                ("scenario_id", &scenario.scenario_id),
                ("story_id", &scenario.story_id),
                ("title", &scenario.title),
            ] {
                if value.trim().is_empty() {
                    return Err(format!("scenarios[{idx}].{field}: must not be empty"));
                }
            }
        }

        Ok(())
    }

    /// Story ids in bundle order.
    pub fn story_ids(&self) -> impl Iterator<Item = &str> {
        self.stories.iter().map(|s| s.story_id.as_str())
    }

    /// Scenarios attached to `story_id`.
    pub fn scenarios_for<'a>(
        &'a self,
        story_id: &'a str,
    ) -> impl Iterator<Item = &'a GherkinScenario> + 'a {
        self.scenarios.iter().filter(move |sc| sc.story_id == story_id)
    }
}
