//! Error types for YWT Core
//!
//! Every fatal outcome of a run is one [`WorkflowError`] value that names
//! its class and the [`Location`] (phase and entity index) where the run
//! stopped, so a caller can report or resume without replaying the run.

use crate::capability::{CapabilityError, CapabilityKind};
use crate::types::{EntityId, Phase};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Position of the orchestrator when a run stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Current phase, `None` before the entity set exists
    pub phase: Option<Phase>,
    /// Entity cursor, `None` outside per-entity work
    pub entity_index: Option<usize>,
}

impl Location {
    /// Before entity generation
    #[inline]
    #[must_use]
    pub fn start() -> Self {
        Self::default()
    }

    /// Phase-level location
    #[inline]
    #[must_use]
    pub fn phase(phase: Phase) -> Self {
        Self {
            phase: Some(phase),
            entity_index: None,
        }
    }

    /// Entity-level location
    #[inline]
    #[must_use]
    pub fn entity(phase: Phase, index: usize) -> Self {
        Self {
            phase: Some(phase),
            entity_index: Some(index),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.phase, self.entity_index) {
            (None, _) => f.write_str("entity generation"),
            (Some(phase), None) => write!(f, "phase {phase}"),
            (Some(phase), Some(index)) => write!(f, "phase {phase}, entity #{index}"),
        }
    }
}

/// Why a run was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    /// Caller fired the cancellation token
    Requested,
    /// Run timeout elapsed
    Deadline {
        /// Configured run timeout
        timeout: Duration,
    },
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("cancellation requested"),
            Self::Deadline { timeout } => {
                write!(f, "run timeout of {}s elapsed", timeout.as_secs())
            }
        }
    }
}

/// Main workflow error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    /// Generator produced no entities
    #[error("entity generator returned no entities")]
    EmptyEntitySet,

    /// Generator output violates its contract
    #[error("malformed entity set: {0}")]
    MalformedEntitySet(String),

    /// Analysis requested before the entity's earlier results exist
    #[error("entity {entity} has no {missing} result, required by phase {phase} (at {location})")]
    PrecursorMissing {
        /// Entity being analyzed
        entity: EntityId,
        /// Phase being analyzed
        phase: Phase,
        /// Absent precursor phase
        missing: Phase,
        /// Where the run stopped
        location: Location,
    },

    /// Summarization requested before an earlier summary exists
    #[error("summary of phase {missing} is required by phase {phase} but absent")]
    MissingPhaseSummary {
        /// Phase being summarized
        phase: Phase,
        /// Absent earlier summary
        missing: Phase,
    },

    /// A capability call failed
    #[error("{capability} capability failed at {location}: {source}")]
    Capability {
        /// Failing capability
        capability: CapabilityKind,
        /// Where the run stopped
        location: Location,
        /// Underlying failure
        #[source]
        source: CapabilityError,
    },

    /// Transition budget exhausted
    #[error("step limit of {limit} exceeded at {location}")]
    StepLimitExceeded {
        /// Configured limit
        limit: usize,
        /// Where the run stopped
        location: Location,
    },

    /// Run cancelled before completion
    #[error("run cancelled at {location}: {reason}")]
    Cancelled {
        /// Cancellation cause
        reason: CancelReason,
        /// Where the run stopped
        location: Location,
    },

    /// Run configuration or input rejected
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Orchestrator bookkeeping broke an invariant
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl WorkflowError {
    /// Location the run stopped at, when the class records one
    #[must_use]
    pub fn location(&self) -> Option<Location> {
        match self {
            Self::EmptyEntitySet | Self::MalformedEntitySet(_) => Some(Location::start()),
            Self::PrecursorMissing { location, .. }
            | Self::Capability { location, .. }
            | Self::StepLimitExceeded { location, .. }
            | Self::Cancelled { location, .. } => Some(*location),
            Self::MissingPhaseSummary { phase, .. } => Some(Location::phase(*phase)),
            Self::InvalidConfig(_) | Self::InvariantViolation(_) => None,
        }
    }

    /// Whether the error signals an orchestrator logic bug
    #[inline]
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::PrecursorMissing { .. }
                | Self::MissingPhaseSummary { .. }
                | Self::InvariantViolation(_)
        )
    }

    /// Whether re-running may succeed without changes
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Capability { source, .. } if source.is_transient())
    }

    /// Whether the run was cancelled rather than failed
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Stable short name of the error class
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyEntitySet => "empty_entity_set",
            Self::MalformedEntitySet(_) => "malformed_entity_set",
            Self::PrecursorMissing { .. } => "precursor_missing",
            Self::MissingPhaseSummary { .. } => "missing_phase_summary",
            Self::Capability { .. } => "capability",
            Self::StepLimitExceeded { .. } => "step_limit_exceeded",
            Self::Cancelled { .. } => "cancelled",
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvariantViolation(_) => "invariant_violation",
        }
    }
}
