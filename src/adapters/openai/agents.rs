//! Generator, critic and refiner backed by JSON-mode chat completions.
//!
//! Each agent validates the model's output and, when it is malformed, asks
//! the model to repair it through [`with_repair`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::chat::OpenAiChatClient;
use super::prompts::{self, BUNDLE_SHAPE, CRITIQUE_SHAPE};
use crate::domain::errors::DomainResult;
use crate::domain::models::{Bundle, Critique, Epic, QualityReport};
use crate::domain::ports::{BundleGenerator, Critic, GenerationMode, Refiner};
use crate::services::repair::with_repair;

/// Default number of repair sub-calls per agent call.
pub const DEFAULT_MAX_REPAIRS: u32 = 2;

/// Generates fresh bundles and adapts cached ones.
#[derive(Debug, Clone)]
pub struct OpenAiBundleGenerator {
    chat: Arc<OpenAiChatClient>,
    max_repairs: u32,
}

impl OpenAiBundleGenerator {
    /// `max_repairs` bounds the repair sub-calls per generation.
    pub fn new(chat: Arc<OpenAiChatClient>, max_repairs: u32) -> Self {
        Self { chat, max_repairs }
    }
}

#[async_trait]
impl BundleGenerator for OpenAiBundleGenerator {
    fn model(&self) -> &str {
        self.chat.model()
    }

    #[instrument(skip_all, fields(epic_id = %epic.epic_id, mode = mode.as_str()))]
    async fn generate(&self, epic: &Epic, mode: GenerationMode<'_>) -> DomainResult<Bundle> {
        let messages = match mode {
            GenerationMode::Fresh => prompts::fresh_messages(epic),
            GenerationMode::Adapt { draft, similarity } => {
                prompts::adapt_messages(epic, draft, similarity)?
            }
        };

        let bundle = with_repair(
            self.max_repairs,
            || self.chat.complete_json(messages),
            Bundle::from_json_str,
            |raw, error| {
                self.chat
                    .complete_json(prompts::repair_messages(BUNDLE_SHAPE, &error, &raw))
            },
        )
        .await?;

        debug!(
            stories = bundle.stories.len(),
            scenarios = bundle.scenarios.len(),
            "bundle generated"
        );
        Ok(bundle)
    }
}

/// [`Critic`] backed by a chat model.
#[derive(Debug, Clone)]
pub struct OpenAiCritic {
    chat: Arc<OpenAiChatClient>,
    max_repairs: u32,
}

impl OpenAiCritic {
    /// `max_repairs` bounds the repair sub-calls per call.
    pub fn new(chat: Arc<OpenAiChatClient>, max_repairs: u32) -> Self {
        Self { chat, max_repairs }
    }
}

#[async_trait]
impl Critic for OpenAiCritic {
    #[instrument(skip_all, fields(epic_id = %epic.epic_id))]
    async fn critique(
        &self,
        epic: &Epic,
        bundle: &Bundle,
        report: &QualityReport,
    ) -> DomainResult<Critique> {
        let messages = prompts::critique_messages(epic, bundle, report)?;
        with_repair(
            self.max_repairs,
            || self.chat.complete_json(messages),
            Critique::from_json_str,
            |raw, error| {
                self.chat
                    .complete_json(prompts::repair_messages(CRITIQUE_SHAPE, &error, &raw))
            },
        )
        .await
    }
}

/// [`Refiner`] backed by a chat model.
#[derive(Debug, Clone)]
pub struct OpenAiRefiner {
    chat: Arc<OpenAiChatClient>,
    max_repairs: u32,
}

impl OpenAiRefiner {
    /// `max_repairs` bounds the repair sub-calls per call.
    pub fn new(chat: Arc<OpenAiChatClient>, max_repairs: u32) -> Self {
        Self { chat, max_repairs }
    }
}

#[async_trait]
impl Refiner for OpenAiRefiner {
    #[instrument(skip_all, fields(epic_id = %epic.epic_id, edits = critique.edits.len()))]
    async fn refine(
        &self,
        epic: &Epic,
        bundle: &Bundle,
        critique: &Critique,
    ) -> DomainResult<Bundle> {
        let messages = prompts::refine_messages(epic, bundle, critique)?;
        with_repair(
            self.max_repairs,
            || self.chat.complete_json(messages),
            Bundle::from_json_str,
            |raw, error| {
                self.chat
                    .complete_json(prompts::repair_messages(BUNDLE_SHAPE, &error, &raw))
            },
        )
        .await
    }
}
