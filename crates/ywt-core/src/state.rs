//! Workflow state
//!
//! [`WorkflowState`] is owned by exactly one orchestrator run. Capabilities
//! never touch it; the orchestrator applies their return values through the
//! transition methods here, each of which preserves the invariants checked
//! by [`WorkflowState::check_invariants`]:
//!
//! 1. `0 <= cursor <= entities.len()`
//! 2. exactly one record per entity, created with the entity set
//! 3. a phase result exists only behind the cursor of its phase (or for an
//!    earlier phase), and only after every earlier phase summary exists
//! 4. `done` iff the phase is `T` and the `T` summary exists

use crate::capability::EntityPhaseResult;
use crate::error::{Location, WorkflowError};
use crate::record::{EntityRecord, RecordError};
use crate::types::{Entity, EntityId, Phase, PhaseResult, PhaseSummary};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Write-once summaries, one slot per phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSummaries {
    y: Option<PhaseSummary>,
    w: Option<PhaseSummary>,
    t: Option<PhaseSummary>,
}

impl PhaseSummaries {
    /// Summary of a phase, if computed
    #[inline]
    #[must_use]
    pub fn get(&self, phase: Phase) -> Option<&PhaseSummary> {
        match phase {
            Phase::Y => self.y.as_ref(),
            Phase::W => self.w.as_ref(),
            Phase::T => self.t.as_ref(),
        }
    }

    /// Whether the phase has a summary
    #[inline]
    #[must_use]
    pub fn contains(&self, phase: Phase) -> bool {
        self.get(phase).is_some()
    }

    /// Number of computed summaries
    #[must_use]
    pub fn len(&self) -> usize {
        Phase::ALL.iter().filter(|p| self.contains(**p)).count()
    }

    /// Whether no summary is computed yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summaries of every phase before `phase`, in phase order
    ///
    /// # Errors
    /// The first earlier phase without a summary.
    pub fn priors_for(&self, phase: Phase) -> Result<Vec<PhaseSummary>, Phase> {
        phase
            .predecessors()
            .iter()
            .map(|&p| self.get(p).cloned().ok_or(p))
            .collect()
    }

    fn insert(&mut self, summary: PhaseSummary) -> Result<(), WorkflowError> {
        let slot = match summary.phase {
            Phase::Y => &mut self.y,
            Phase::W => &mut self.w,
            Phase::T => &mut self.t,
        };
        if slot.is_some() {
            return Err(WorkflowError::InvariantViolation(format!(
                "summary of phase {} computed twice",
                summary.phase
            )));
        }
        *slot = Some(summary);
        Ok(())
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Option<PhaseSummary>,
        Option<PhaseSummary>,
        Option<PhaseSummary>,
    ) {
        (self.y, self.w, self.t)
    }
}

/// Progress snapshot for logs and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Current phase
    pub phase: Phase,
    /// Entity cursor within the phase
    pub cursor: usize,
    /// Size of the entity set
    pub entity_count: usize,
    /// Number of computed phase summaries
    pub summaries_present: usize,
    /// Whether the run reached its terminal state
    pub done: bool,
}

/// Aggregate state of one run
#[derive(Debug, Clone)]
pub struct WorkflowState {
    topic: String,
    entities: Vec<Arc<Entity>>,
    records: IndexMap<EntityId, EntityRecord>,
    current_phase: Phase,
    cursor: usize,
    summaries: PhaseSummaries,
    done: bool,
}

impl WorkflowState {
    /// Create state from a freshly generated entity set
    ///
    /// Records are created for every entity in the same step, with all
    /// phase slots absent. The run starts at phase `Y`, cursor 0.
    ///
    /// # Errors
    /// - `WorkflowError::EmptyEntitySet` for an empty set
    /// - `WorkflowError::MalformedEntitySet` for duplicate ids or blank descriptors
    pub fn new(topic: impl Into<String>, entities: Vec<Entity>) -> Result<Self, WorkflowError> {
        if entities.is_empty() {
            return Err(WorkflowError::EmptyEntitySet);
        }

        let mut seen = HashSet::with_capacity(entities.len());
        for entity in &entities {
            if !seen.insert(entity.id.clone()) {
                return Err(WorkflowError::MalformedEntitySet(format!(
                    "duplicate entity id {}",
                    entity.id
                )));
            }
            if !entity.has_descriptor() {
                return Err(WorkflowError::MalformedEntitySet(format!(
                    "entity {} has an empty descriptor",
                    entity.id
                )));
            }
        }

        let entities: Vec<Arc<Entity>> = entities.into_iter().map(Arc::new).collect();
        let records = entities
            .iter()
            .map(|e| (e.id.clone(), EntityRecord::new(Arc::clone(e))))
            .collect();

        Ok(Self {
            topic: topic.into(),
            entities,
            records,
            current_phase: Phase::Y,
            cursor: 0,
            summaries: PhaseSummaries::default(),
            done: false,
        })
    }

    /// Analysis topic
    #[inline]
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Entities in generation order
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Arc<Entity>] {
        &self.entities
    }

    /// Records keyed by entity id, in generation order
    #[inline]
    #[must_use]
    pub fn records(&self) -> &IndexMap<EntityId, EntityRecord> {
        &self.records
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn current_phase(&self) -> Phase {
        self.current_phase
    }

    /// Entity cursor within the current phase
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Computed phase summaries
    #[inline]
    #[must_use]
    pub fn summaries(&self) -> &PhaseSummaries {
        &self.summaries
    }

    /// Whether the run is complete
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Whether every entity has been analyzed in the current phase
    #[inline]
    #[must_use]
    pub fn phase_complete(&self) -> bool {
        self.cursor >= self.entities.len()
    }

    /// Location of the cursor
    #[inline]
    #[must_use]
    pub fn location(&self) -> Location {
        if self.phase_complete() {
            Location::phase(self.current_phase)
        } else {
            Location::entity(self.current_phase, self.cursor)
        }
    }

    /// Progress snapshot
    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress {
            phase: self.current_phase,
            cursor: self.cursor,
            entity_count: self.entities.len(),
            summaries_present: self.summaries.len(),
            done: self.done,
        }
    }

    /// Entity at `index` and its priors for the current phase
    ///
    /// # Errors
    /// - `WorkflowError::InvariantViolation` if `index` is outside the set
    /// - `WorkflowError::PrecursorMissing` if a required prior result is absent
    pub fn analysis_input(
        &self,
        index: usize,
    ) -> Result<(Arc<Entity>, Vec<PhaseResult>), WorkflowError> {
        let entity = self.entities.get(index).ok_or_else(|| {
            WorkflowError::InvariantViolation(format!(
                "entity index {index} outside entity set of {}",
                self.entities.len()
            ))
        })?;
        let record = self.record(&entity.id)?;
        let priors = record
            .priors(self.current_phase)
            .map_err(|e| self.record_error(&entity.id, index, e))?;
        Ok((Arc::clone(entity), priors))
    }

    /// Store the cursor entity's result and advance the cursor
    ///
    /// # Errors
    /// `WorkflowError::InvariantViolation` if the result belongs to another
    /// phase or the slot is occupied; `WorkflowError::PrecursorMissing` if a
    /// precursor is absent. State is unchanged on error.
    pub fn apply_analysis(&mut self, result: PhaseResult) -> Result<(), WorkflowError> {
        let index = self.cursor;
        if result.phase != self.current_phase {
            return Err(WorkflowError::InvariantViolation(format!(
                "result for phase {} applied during phase {}",
                result.phase, self.current_phase
            )));
        }
        let id = self
            .entities
            .get(index)
            .map(|e| e.id.clone())
            .ok_or_else(|| {
                WorkflowError::InvariantViolation(format!(
                    "cursor {index} already past the last entity"
                ))
            })?;

        let outcome = match self.records.get_mut(&id) {
            Some(record) => record.record(result),
            None => {
                return Err(WorkflowError::InvariantViolation(format!(
                    "no record for entity {id}"
                )))
            }
        };
        outcome.map_err(|e| self.record_error(&id, index, e))?;
        self.cursor += 1;
        Ok(())
    }

    /// Inputs of the current phase's summary
    ///
    /// # Errors
    /// - `WorkflowError::InvariantViolation` if any entity lacks its result
    /// - `WorkflowError::MissingPhaseSummary` if an earlier summary is absent
    pub fn summary_input(
        &self,
    ) -> Result<(Vec<EntityPhaseResult>, Vec<PhaseSummary>), WorkflowError> {
        let phase = self.current_phase;
        let results = self
            .entities
            .iter()
            .map(|entity| {
                self.record(&entity.id)?
                    .get(phase)
                    .cloned()
                    .map(|result| EntityPhaseResult {
                        entity: Arc::clone(entity),
                        result,
                    })
                    .ok_or_else(|| {
                        WorkflowError::InvariantViolation(format!(
                            "entity {} has no {phase} result at summarization",
                            entity.id
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let priors = self
            .summaries
            .priors_for(phase)
            .map_err(|missing| WorkflowError::MissingPhaseSummary { phase, missing })?;

        Ok((results, priors))
    }

    /// Store the current phase's summary
    ///
    /// Storing the T summary marks the run done in the same step.
    ///
    /// # Errors
    /// `WorkflowError::InvariantViolation` if the phase is unfinished, the
    /// summary belongs to another phase, or it was already stored.
    pub fn apply_summary(&mut self, summary: PhaseSummary) -> Result<(), WorkflowError> {
        if summary.phase != self.current_phase {
            return Err(WorkflowError::InvariantViolation(format!(
                "summary for phase {} applied during phase {}",
                summary.phase, self.current_phase
            )));
        }
        if !self.phase_complete() {
            return Err(WorkflowError::InvariantViolation(format!(
                "phase {} summarized with {} of {} entities analyzed",
                self.current_phase,
                self.cursor,
                self.entities.len()
            )));
        }
        self.summaries.insert(summary)?;
        self.done = self.current_phase.is_terminal() && self.summaries.contains(Phase::T);
        Ok(())
    }

    /// Move to the next phase and rewind the cursor
    ///
    /// Returns `false` and leaves the state untouched in the terminal phase.
    ///
    /// # Errors
    /// `WorkflowError::InvariantViolation` if the current phase has no summary.
    pub fn advance_phase(&mut self) -> Result<bool, WorkflowError> {
        if !self.summaries.contains(self.current_phase) {
            return Err(WorkflowError::InvariantViolation(format!(
                "advancing past phase {} before its summary",
                self.current_phase
            )));
        }
        match self.current_phase.next() {
            Some(next) => {
                self.current_phase = next;
                self.cursor = 0;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Verify cursor, record and summary consistency
    ///
    /// # Errors
    /// `WorkflowError::InvariantViolation` describing the first breach.
    pub fn check_invariants(&self) -> Result<(), WorkflowError> {
        let violation = |msg: String| Err(WorkflowError::InvariantViolation(msg));

        if self.cursor > self.entities.len() {
            return violation(format!(
                "cursor {} beyond {} entities",
                self.cursor,
                self.entities.len()
            ));
        }

        if self.records.len() != self.entities.len() {
            return violation(format!(
                "{} records for {} entities",
                self.records.len(),
                self.entities.len()
            ));
        }

        for (index, entity) in self.entities.iter().enumerate() {
            let Some(record) = self.records.get_index(index).map(|(_, r)| r) else {
                return violation(format!("no record at index {index}"));
            };
            if record.entity().id != entity.id {
                return violation(format!(
                    "record order differs from entity order at index {index}"
                ));
            }

            for phase in Phase::ALL {
                if !record.slot(phase).is_present() {
                    continue;
                }
                let behind_cursor = phase < self.current_phase
                    || (phase == self.current_phase && index < self.cursor);
                if !behind_cursor {
                    return violation(format!(
                        "entity {} has a {phase} result ahead of the cursor",
                        entity.id
                    ));
                }
                if let Err(missing) = self.summaries.priors_for(phase) {
                    return violation(format!(
                        "entity {} has a {phase} result before the {missing} summary",
                        entity.id
                    ));
                }
            }
        }

        for phase in Phase::ALL {
            if self.summaries.contains(phase)
                && (phase > self.current_phase
                    || (phase == self.current_phase && !self.phase_complete()))
            {
                return violation(format!("summary of phase {phase} before the phase finished"));
            }
        }

        let expect_done = self.current_phase.is_terminal() && self.summaries.contains(Phase::T);
        if self.done != expect_done {
            return violation(format!(
                "done flag {} but phase {} with T summary {}",
                self.done,
                self.current_phase,
                self.summaries.contains(Phase::T)
            ));
        }

        Ok(())
    }

    pub(crate) fn into_parts(self) -> (IndexMap<EntityId, EntityRecord>, PhaseSummaries) {
        (self.records, self.summaries)
    }

    fn record(&self, id: &EntityId) -> Result<&EntityRecord, WorkflowError> {
        self.records
            .get(id)
            .ok_or_else(|| WorkflowError::InvariantViolation(format!("no record for entity {id}")))
    }

    fn record_error(&self, id: &EntityId, index: usize, err: RecordError) -> WorkflowError {
        match err {
            RecordError::PrecursorMissing { phase, missing } => WorkflowError::PrecursorMissing {
                entity: id.clone(),
                phase,
                missing,
                location: Location::entity(self.current_phase, index),
            },
            RecordError::AlreadyRecorded(phase) => WorkflowError::InvariantViolation(format!(
                "entity {id} analyzed twice for phase {phase}"
            )),
        }
    }
}
