//! Capability boundaries
//!
//! The orchestrator never produces entities, analyses or summaries itself.
//! It calls three opaque capabilities through these traits and applies the
//! values they return. Retry policy, if any, belongs to the implementation.

use crate::types::{Entity, Phase, PhaseResult, PhaseSummary};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Capability failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// Call did not finish in time
    #[error("capability timed out after {duration_secs}s")]
    Timeout {
        /// Elapsed budget
        duration_secs: u64,
    },

    /// Transport or upstream service failure
    #[error("transport failure: {message}")]
    Transport {
        /// Failure detail
        message: String,
        /// Whether the upstream marked the failure as temporary
        transient: bool,
    },

    /// Output could not be interpreted
    #[error("malformed output: {0}")]
    MalformedOutput(String),

    /// Upstream refused the request (auth, quota, policy)
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl CapabilityError {
    /// Transport failure
    #[inline]
    pub fn transport(message: impl Into<String>, transient: bool) -> Self {
        Self::Transport {
            message: message.into(),
            transient,
        }
    }

    /// Malformed output
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedOutput(message.into())
    }

    /// Whether a caller may reasonably retry the run
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport { transient, .. } => *transient,
            Self::MalformedOutput(_) | Self::Rejected(_) => false,
        }
    }
}

/// Which capability failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityKind {
    /// Entity generator
    Generation,
    /// Per-entity analysis
    Analysis,
    /// Cross-entity summarization
    Summarization,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Generation => "generation",
            Self::Analysis => "analysis",
            Self::Summarization => "summarization",
        };
        f.write_str(name)
    }
}

/// One entity's result for a phase, as handed to the summarizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityPhaseResult {
    /// Analyzed entity
    pub entity: Arc<Entity>,
    /// Its result for the summarized phase
    pub result: PhaseResult,
}

/// Produces the entity set of a run
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityGenerator: Send + Sync {
    /// Generate up to `count` entities for `topic`, in a stable order
    async fn generate(&self, topic: &str, count: usize) -> Result<Vec<Entity>, CapabilityError>;
}

/// Analyzes one entity for one phase
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Produce `phase`'s result for `entity`
    ///
    /// `priors` holds exactly the entity's own results for the phases
    /// preceding `phase` (empty for `Y`).
    async fn analyze(
        &self,
        phase: Phase,
        topic: &str,
        entity: &Entity,
        priors: &[PhaseResult],
    ) -> Result<PhaseResult, CapabilityError>;
}

/// Summarizes one phase across all entities
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produce the summary of `phase`
    ///
    /// `results` holds one entry per entity in generation order;
    /// `prior_summaries` holds the summaries of all earlier phases.
    async fn summarize(
        &self,
        phase: Phase,
        topic: &str,
        results: &[EntityPhaseResult],
        prior_summaries: &[PhaseSummary],
    ) -> Result<PhaseSummary, CapabilityError>;
}

/// The three capabilities a run needs
#[derive(Clone)]
pub struct Capabilities {
    /// Entity generator
    pub generator: Arc<dyn EntityGenerator>,
    /// Per-entity analyzer
    pub analyzer: Arc<dyn Analyzer>,
    /// Phase summarizer
    pub summarizer: Arc<dyn Summarizer>,
}

impl Capabilities {
    /// Bundle capability implementations
    #[inline]
    pub fn new(
        generator: Arc<dyn EntityGenerator>,
        analyzer: Arc<dyn Analyzer>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            generator,
            analyzer,
            summarizer,
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(CapabilityError::Timeout { duration_secs: 5 }.is_transient());
        assert!(CapabilityError::transport("503", true).is_transient());
        assert!(!CapabilityError::transport("bad host", false).is_transient());
        assert!(!CapabilityError::malformed("no blocks").is_transient());
        assert!(!CapabilityError::Rejected("401".into()).is_transient());
    }

    #[test]
    fn error_display() {
        let err = CapabilityError::Timeout { duration_secs: 30 };
        assert!(err.to_string().contains("30s"));
    }
}
