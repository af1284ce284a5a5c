//! Epic domain model.
//!
//! An Epic is the high-level feature description the pipeline turns into
//! stories, acceptance scenarios and a trace map.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Marker rendered in place of an empty constraint or glossary block.
pub const EMPTY_BLOCK_MARKER: &str = "(none)";

/// A glossary term with its definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlossaryTerm {
    /// The term as written in the epic.
    pub term: String,
    /// Its meaning in this domain.
    pub definition: String,
}

impl GlossaryTerm {
    /// Build a glossary entry.
    pub fn new(term: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            definition: definition.into(),
        }
    }
}

/// Input feature description.
///
/// Constraint and glossary order is significant: it is preserved in prompts
/// and in the cache fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Epic {
    /// Caller-assigned id, e.g. `E-1`.
    #[serde(alias = "epic_id")]
    pub epic_id: String,
    /// Free-text feature description.
    pub text: String,
    /// Non-functional or business constraints, in order.
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Domain terms, in order.
    #[serde(default)]
    pub glossary: Vec<GlossaryTerm>,
}

impl Epic {
    /// Epic with no constraints or glossary.
    pub fn new(epic_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            epic_id: epic_id.into(),
            text: text.into(),
            constraints: Vec::new(),
            glossary: Vec::new(),
        }
    }

    /// Append a constraint.
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    /// Append a glossary term.
    pub fn with_glossary_term(
        mut self,
        term: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        self.glossary.push(GlossaryTerm::new(term, definition));
        self
    }

    /// Reject epics without an id or text.
    pub fn validate(&self) -> DomainResult<()> {
        if self.epic_id.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "epic id cannot be empty".to_string(),
            ));
        }
        if self.text.trim().is_empty() {
            return Err(DomainError::ValidationFailed(format!(
                "epic {} has no text",
                self.epic_id
            )));
        }
        Ok(())
    }

    /// Constraints rendered as a bulleted block, or [`EMPTY_BLOCK_MARKER`].
    pub fn constraints_block(&self) -> String {
        render_block(self.constraints.iter().map(|c| format!("- {c}")))
    }

    /// Glossary rendered as a bulleted `term: definition` block, or
    /// [`EMPTY_BLOCK_MARKER`].
    pub fn glossary_block(&self) -> String {
        render_block(
            self.glossary
                .iter()
                .map(|g| format!("- {}: {}", g.term, g.definition)),
        )
    }

    /// Parse an epic from its JSON representation.
    pub fn from_json(raw: &str) -> DomainResult<Self> {
        let epic: Self = serde_json::from_str(raw)?;
        epic.validate()?;
        Ok(epic)
    }
}

fn render_block(lines: impl Iterator<Item = String>) -> String {
    let block = lines.collect::<Vec<_>>().join("\n");
    if block.is_empty() {
        EMPTY_BLOCK_MARKER.to_string()
    } else {
        block
    }
}
