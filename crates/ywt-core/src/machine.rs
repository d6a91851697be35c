//! Orchestrator state machine
//!
//! The transition table is explicit data: the orchestrator validates every
//! move through [`validate_transition`] and pays for it from a [`StepBudget`].

use crate::error::{Location, WorkflowError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    /// Initial: calling the entity generator
    GeneratingEntities,
    /// Analyzing the entity at the cursor
    AnalyzingEntity,
    /// Deciding whether the phase still has entities to analyze
    CheckingEntityCompletion,
    /// Running the phase's fan-in summary
    SummarizingPhase,
    /// Moving to the next phase
    AdvancingPhase,
    /// Deciding whether the run is finished
    CheckingPhaseCompletion,
    /// Terminal
    Done,
}

impl Step {
    /// Whether no transition leaves this state
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Step::Done)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// States reachable in one transition from `from`
#[must_use]
pub fn allowed_transitions(from: Step) -> &'static [Step] {
    use Step::*;
    match from {
        GeneratingEntities => &[AnalyzingEntity],
        AnalyzingEntity => &[CheckingEntityCompletion],
        CheckingEntityCompletion => &[AnalyzingEntity, SummarizingPhase],
        SummarizingPhase => &[AdvancingPhase],
        AdvancingPhase => &[CheckingPhaseCompletion],
        CheckingPhaseCompletion => &[AnalyzingEntity, Done],
        Done => &[],
    }
}

/// Validates a state transition.
///
/// # Errors
/// `WorkflowError::InvariantViolation` if the edge is not in the table.
pub fn validate_transition(from: Step, to: Step) -> Result<(), WorkflowError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(WorkflowError::InvariantViolation(format!(
            "illegal transition {from} -> {to}"
        )))
    }
}

/// Explicit transition counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepBudget {
    limit: usize,
    used: usize,
}

impl StepBudget {
    /// Create budget of `limit` steps
    #[inline]
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    /// Steps consumed so far
    #[inline]
    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Steps still available
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.limit - self.used
    }

    /// Consume `steps` transitions
    ///
    /// # Errors
    /// `WorkflowError::StepLimitExceeded` if fewer than `steps` remain;
    /// nothing is consumed in that case.
    pub fn charge(&mut self, steps: usize, location: Location) -> Result<(), WorkflowError> {
        if steps > self.remaining() {
            return Err(WorkflowError::StepLimitExceeded {
                limit: self.limit,
                location,
            });
        }
        self.used += steps;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phase;

    #[test]
    fn generation_only_leads_to_analysis() {
        assert!(validate_transition(Step::GeneratingEntities, Step::AnalyzingEntity).is_ok());
        assert!(validate_transition(Step::GeneratingEntities, Step::SummarizingPhase).is_err());
    }

    #[test]
    fn summary_cannot_be_skipped() {
        assert!(validate_transition(Step::CheckingEntityCompletion, Step::AdvancingPhase).is_err());
        assert!(validate_transition(Step::AnalyzingEntity, Step::SummarizingPhase).is_err());
    }

    #[test]
    fn done_is_terminal() {
        assert!(Step::Done.is_terminal());
        assert!(allowed_transitions(Step::Done).is_empty());
    }

    #[test]
    fn budget_charges_until_exhausted() {
        let mut budget = StepBudget::new(3);
        budget.charge(2, Location::start()).unwrap();
        assert_eq!(budget.remaining(), 1);

        let err = budget.charge(2, Location::phase(Phase::Y)).unwrap_err();
        assert!(matches!(err, WorkflowError::StepLimitExceeded { limit: 3, .. }));
        assert_eq!(budget.used(), 2);

        budget.charge(1, Location::start()).unwrap();
        assert_eq!(budget.remaining(), 0);
    }
}
