//! Result of a completed run

use crate::record::EntityRecord;
use crate::types::{EntityId, Phase, PhaseSummary, RunId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Execution metrics of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// State transitions consumed
    pub steps: usize,
    /// Analysis capability calls issued
    pub analysis_calls: usize,
    /// Summarization capability calls issued
    pub summary_calls: usize,
    /// Wall-clock duration in milliseconds
    pub elapsed_ms: u64,
}

/// Final result set of a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Run identifier
    pub run_id: RunId,
    /// Analyzed topic
    pub topic: String,
    /// Complete records keyed by entity, in generation order
    pub records: IndexMap<EntityId, EntityRecord>,
    /// Summary of phase Y
    pub y_summary: PhaseSummary,
    /// Summary of phase W
    pub w_summary: PhaseSummary,
    /// Summary of phase T
    pub t_summary: PhaseSummary,
    /// Execution metrics
    pub stats: RunStats,
}

impl RunOutcome {
    /// Summary of a phase
    #[inline]
    #[must_use]
    pub fn summary(&self, phase: Phase) -> &PhaseSummary {
        match phase {
            Phase::Y => &self.y_summary,
            Phase::W => &self.w_summary,
            Phase::T => &self.t_summary,
        }
    }

    /// Record of one entity
    #[inline]
    #[must_use]
    pub fn record(&self, id: &str) -> Option<&EntityRecord> {
        self.records.get(id)
    }
}
