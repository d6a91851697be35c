//! Core types for YWT
//!
//! Defines the data model shared by the orchestrator and the capabilities:
//! - Entities (generated personas) and their identifiers
//! - The three analysis phases and their transition order
//! - Per-entity phase results and cross-entity phase summaries
//! - Run identifiers

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Unique run identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a generated entity, unique within one run
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create new entity ID
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A generated persona. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Identifier, unique within the run
    pub id: EntityId,
    /// Free-text persona background
    pub descriptor: String,
}

impl Entity {
    /// Create new entity
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<EntityId>, descriptor: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Whether the descriptor carries any text
    #[inline]
    #[must_use]
    pub fn has_descriptor(&self) -> bool {
        !self.descriptor.trim().is_empty()
    }
}

/// Analysis phase
///
/// Phases are strictly ordered: `Y` (what was done), `W` (what was learned),
/// `T` (what to do next). `T` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// What was done
    Y,
    /// What was learned
    W,
    /// What to do next
    T,
}

impl Phase {
    /// All phases in execution order
    pub const ALL: [Phase; 3] = [Phase::Y, Phase::W, Phase::T];

    /// Successor phase, `None` for the terminal phase
    #[inline]
    #[must_use]
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Y => Some(Phase::W),
            Phase::W => Some(Phase::T),
            Phase::T => None,
        }
    }

    /// Phases whose results this phase depends on
    #[inline]
    #[must_use]
    pub fn predecessors(self) -> &'static [Phase] {
        match self {
            Phase::Y => &[],
            Phase::W => &[Phase::Y],
            Phase::T => &[Phase::Y, Phase::W],
        }
    }

    /// Whether this is the last phase
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// Zero-based position in execution order
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Phase::Y => 0,
            Phase::W => 1,
            Phase::T => 2,
        }
    }

    /// Human-readable heading
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Phase::Y => "What was done (Y)",
            Phase::W => "What was learned (W)",
            Phase::T => "What to do next (T)",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Phase::Y => "Y",
            Phase::W => "W",
            Phase::T => "T",
        };
        f.write_str(tag)
    }
}

/// Error parsing a phase tag
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase: {0}")]
pub struct ParsePhaseError(pub String);

impl FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "y" => Ok(Phase::Y),
            "w" => Ok(Phase::W),
            "t" => Ok(Phase::T),
            other => Err(ParsePhaseError(other.to_string())),
        }
    }
}

/// Output of one phase for one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseResult {
    /// Phase that produced this result
    pub phase: Phase,
    /// Opaque analysis text
    pub payload: String,
}

impl PhaseResult {
    /// Create new phase result
    #[inline]
    #[must_use]
    pub fn new(phase: Phase, payload: impl Into<String>) -> Self {
        Self {
            phase,
            payload: payload.into(),
        }
    }
}

/// Cross-entity summary of one phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSummary {
    /// Summarized phase
    pub phase: Phase,
    /// Opaque summary text
    pub payload: String,
}

impl PhaseSummary {
    /// Create new phase summary
    #[inline]
    #[must_use]
    pub fn new(phase: Phase, payload: impl Into<String>) -> Self {
        Self {
            phase,
            payload: payload.into(),
        }
    }
}

/// One phase slot of an entity record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "result", rename_all = "snake_case")]
pub enum PhaseSlot {
    /// Phase not yet analyzed for this entity
    #[default]
    Absent,
    /// Phase result recorded
    Present(PhaseResult),
}

impl PhaseSlot {
    /// Whether a result is recorded
    #[inline]
    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, PhaseSlot::Present(_))
    }

    /// Borrow the recorded result
    #[inline]
    #[must_use]
    pub fn result(&self) -> Option<&PhaseResult> {
        match self {
            PhaseSlot::Present(result) => Some(result),
            PhaseSlot::Absent => None,
        }
    }
}
