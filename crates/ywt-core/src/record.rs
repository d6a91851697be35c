//! Per-entity phase records
//!
//! An [`EntityRecord`] accumulates one entity's Y, W and T results. Every
//! write goes through [`EntityRecord::record`], which rejects double writes
//! and writes whose precursor phases are still absent, so a record can never
//! hold `T` without `Y` and `W`.

use crate::types::{Entity, Phase, PhaseResult, PhaseSlot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Rejected record mutation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Slot already holds a result
    #[error("phase {0} already recorded")]
    AlreadyRecorded(Phase),

    /// A required earlier phase is absent
    #[error("phase {phase} requires phase {missing}, which is absent")]
    PrecursorMissing {
        /// Phase being written or read for
        phase: Phase,
        /// First absent precursor
        missing: Phase,
    },
}

/// Accumulated results of one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    entity: Arc<Entity>,
    y: PhaseSlot,
    w: PhaseSlot,
    t: PhaseSlot,
}

impl EntityRecord {
    /// Create record with all phase slots absent
    #[inline]
    #[must_use]
    pub fn new(entity: Arc<Entity>) -> Self {
        Self {
            entity,
            y: PhaseSlot::Absent,
            w: PhaseSlot::Absent,
            t: PhaseSlot::Absent,
        }
    }

    /// The analyzed entity
    #[inline]
    #[must_use]
    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    /// Slot for a phase
    #[inline]
    #[must_use]
    pub fn slot(&self, phase: Phase) -> &PhaseSlot {
        match phase {
            Phase::Y => &self.y,
            Phase::W => &self.w,
            Phase::T => &self.t,
        }
    }

    /// Recorded result for a phase
    #[inline]
    #[must_use]
    pub fn get(&self, phase: Phase) -> Option<&PhaseResult> {
        self.slot(phase).result()
    }

    /// Whether all three phases are recorded
    #[must_use]
    pub fn is_complete(&self) -> bool {
        Phase::ALL.iter().all(|p| self.slot(*p).is_present())
    }

    /// Prior results required to analyze `phase`, in phase order
    ///
    /// # Errors
    /// `RecordError::PrecursorMissing` naming the first absent precursor.
    pub fn priors(&self, phase: Phase) -> Result<Vec<PhaseResult>, RecordError> {
        phase
            .predecessors()
            .iter()
            .map(|&p| {
                self.get(p)
                    .cloned()
                    .ok_or(RecordError::PrecursorMissing { phase, missing: p })
            })
            .collect()
    }

    /// Store a result into the slot of its phase
    ///
    /// # Errors
    /// - `RecordError::AlreadyRecorded` if the slot is occupied
    /// - `RecordError::PrecursorMissing` if an earlier phase is absent
    pub fn record(&mut self, result: PhaseResult) -> Result<(), RecordError> {
        let phase = result.phase;
        if self.slot(phase).is_present() {
            return Err(RecordError::AlreadyRecorded(phase));
        }
        if let Some(&missing) = phase
            .predecessors()
            .iter()
            .find(|p| !self.slot(**p).is_present())
        {
            return Err(RecordError::PrecursorMissing { phase, missing });
        }

        let slot = match phase {
            Phase::Y => &mut self.y,
            Phase::W => &mut self.w,
            Phase::T => &mut self.t,
        };
        *slot = PhaseSlot::Present(result);
        Ok(())
    }
}
