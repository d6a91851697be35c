//! Orchestrator capabilities backed by a [`ChatModel`]

use crate::chat::ChatModel;
use crate::prompts;
use async_trait::async_trait;
use std::sync::Arc;
use ywt_core::{
    Analyzer, Capabilities, CapabilityError, Entity, EntityGenerator, EntityPhaseResult, Phase,
    PhaseResult, PhaseSummary, Summarizer,
};

/// Persona generator
#[derive(Clone)]
pub struct ChatEntityGenerator {
    model: Arc<dyn ChatModel>,
}

impl ChatEntityGenerator {
    /// Create generator over `model`
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl EntityGenerator for ChatEntityGenerator {
    async fn generate(&self, topic: &str, count: usize) -> Result<Vec<Entity>, CapabilityError> {
        let reply = self
            .model
            .complete(&prompts::persona_system(count), &prompts::persona_user(topic))
            .await?;
        let personas = prompts::parse_personas(&reply, count);
        tracing::debug!(requested = count, parsed = personas.len(), "personas parsed");
        Ok(personas)
    }
}

/// Per-persona phase analyst
#[derive(Clone)]
pub struct ChatAnalyzer {
    model: Arc<dyn ChatModel>,
}

impl ChatAnalyzer {
    /// Create analyzer over `model`
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Analyzer for ChatAnalyzer {
    async fn analyze(
        &self,
        phase: Phase,
        topic: &str,
        entity: &Entity,
        priors: &[PhaseResult],
    ) -> Result<PhaseResult, CapabilityError> {
        let reply = self
            .model
            .complete(
                &prompts::analysis_system(entity),
                &prompts::analysis_user(phase, topic, priors),
            )
            .await?;
        let text = reply.trim();
        if text.is_empty() {
            return Err(CapabilityError::malformed(format!(
                "empty {phase} analysis for {}",
                entity.id
            )));
        }
        Ok(PhaseResult::new(phase, text))
    }
}

/// Cross-persona phase summarizer
#[derive(Clone)]
pub struct ChatSummarizer {
    model: Arc<dyn ChatModel>,
}

impl ChatSummarizer {
    /// Create summarizer over `model`
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(
        &self,
        phase: Phase,
        topic: &str,
        results: &[EntityPhaseResult],
        prior_summaries: &[PhaseSummary],
    ) -> Result<PhaseSummary, CapabilityError> {
        let reply = self
            .model
            .complete(
                prompts::summary_system(),
                &prompts::summary_user(phase, topic, results, prior_summaries),
            )
            .await?;
        let text = reply.trim();
        if text.is_empty() {
            return Err(CapabilityError::malformed(format!("empty {phase} summary")));
        }
        Ok(PhaseSummary::new(phase, text))
    }
}

/// All three capabilities sharing one model
#[must_use]
pub fn chat_capabilities(model: Arc<dyn ChatModel>) -> Capabilities {
    Capabilities::new(
        Arc::new(ChatEntityGenerator::new(Arc::clone(&model))),
        Arc::new(ChatAnalyzer::new(Arc::clone(&model))),
        Arc::new(ChatSummarizer::new(model)),
    )
}
