//! Phased multi-entity orchestrator
//!
//! Drives one run through the [`Step`] state machine:
//! - Generates the entity set once
//! - Analyzes every entity for phase Y, W and T in turn, in generation order
//! - Summarizes each phase once all its analyses are recorded (barrier)
//! - Stops at the T summary, a fatal error, the step limit, or cancellation
//!
//! The orchestrator owns the [`WorkflowState`] for the duration of `run` and
//! is the only writer. Capability calls are the only suspension points.

use crate::capability::{Capabilities, CapabilityError, CapabilityKind};
use crate::config::RunConfig;
use crate::error::{CancelReason, Location, WorkflowError};
use crate::machine::{validate_transition, Step, StepBudget};
use crate::outcome::{RunOutcome, RunStats};
use crate::state::WorkflowState;
use crate::types::{Phase, RunId};
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Per-run bookkeeping
struct Run {
    run_id: RunId,
    topic: String,
    state: Option<WorkflowState>,
    budget: StepBudget,
    deadline: Option<(Instant, Duration)>,
    stats: RunStats,
}

impl Run {
    fn state(&mut self) -> Result<&mut WorkflowState, WorkflowError> {
        self.state
            .as_mut()
            .ok_or_else(|| WorkflowError::InvariantViolation("no entity set yet".to_string()))
    }

    fn state_ref(&self) -> Result<&WorkflowState, WorkflowError> {
        self.state
            .as_ref()
            .ok_or_else(|| WorkflowError::InvariantViolation("no entity set yet".to_string()))
    }

    fn location(&self) -> Location {
        self.state
            .as_ref()
            .map_or_else(Location::start, WorkflowState::location)
    }
}

/// The run driver
#[derive(Debug, Clone)]
pub struct Orchestrator {
    capabilities: Capabilities,
    config: RunConfig,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Create new orchestrator
    #[inline]
    #[must_use]
    pub fn new(capabilities: Capabilities, config: RunConfig) -> Self {
        Self {
            capabilities,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// With external cancellation token
    #[inline]
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels runs of this orchestrator
    #[inline]
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run the full Y → W → T workflow for `topic`
    ///
    /// # Errors
    /// A single [`WorkflowError`] naming the failure class and where the run
    /// stopped. State is never advanced past the failing transition.
    pub async fn run(&self, topic: &str) -> Result<RunOutcome, WorkflowError> {
        let run_id = RunId::new();
        let span = tracing::info_span!("ywt_run", %run_id, topic = %topic);
        self.run_inner(run_id, topic).instrument(span).await
    }

    async fn run_inner(&self, run_id: RunId, topic: &str) -> Result<RunOutcome, WorkflowError> {
        self.config.validate()?;
        if topic.trim().is_empty() {
            return Err(WorkflowError::InvalidConfig("topic is empty".to_string()));
        }

        let started = Instant::now();
        let mut run = Run {
            run_id,
            topic: topic.to_string(),
            state: None,
            budget: StepBudget::new(self.config.step_limit),
            deadline: self.config.timeout().map(|t| (started + t, t)),
            stats: RunStats::default(),
        };

        tracing::info!(
            entities = self.config.target_entity_count,
            step_limit = self.config.step_limit,
            "starting run"
        );

        match self.drive(&mut run).await {
            Ok(()) => {
                run.stats.steps = run.budget.used();
                run.stats.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                let outcome = Self::finish(run)?;
                tracing::info!(
                    steps = outcome.stats.steps,
                    analysis_calls = outcome.stats.analysis_calls,
                    elapsed_ms = outcome.stats.elapsed_ms,
                    "run completed"
                );
                Ok(outcome)
            }
            Err(err) if err.is_cancelled() => {
                tracing::warn!(location = %run.location(), "{err}");
                Err(err)
            }
            Err(err) => {
                tracing::error!(kind = err.kind(), location = %run.location(), "run aborted: {err}");
                Err(err)
            }
        }
    }

    /// State machine loop
    async fn drive(&self, run: &mut Run) -> Result<(), WorkflowError> {
        let mut step = Step::GeneratingEntities;

        while !step.is_terminal() {
            self.check_interrupt(run)?;

            let next = match step {
                Step::GeneratingEntities => self.generate_entities(run).await?,
                Step::AnalyzingEntity => self.analyze_entities(run).await?,
                Step::CheckingEntityCompletion => {
                    let location = run.location();
                    run.budget.charge(1, location)?;
                    if run.state_ref()?.phase_complete() {
                        Step::SummarizingPhase
                    } else {
                        Step::AnalyzingEntity
                    }
                }
                Step::SummarizingPhase => self.summarize_phase(run).await?,
                Step::AdvancingPhase => {
                    let location = run.location();
                    run.budget.charge(1, location)?;
                    let state = run.state()?;
                    let from = state.current_phase();
                    if state.advance_phase()? {
                        tracing::info!(from = %from, to = %state.current_phase(), "phase advanced");
                    }
                    Step::CheckingPhaseCompletion
                }
                Step::CheckingPhaseCompletion => {
                    let location = run.location();
                    run.budget.charge(1, location)?;
                    if run.state_ref()?.is_done() {
                        Step::Done
                    } else {
                        Step::AnalyzingEntity
                    }
                }
                Step::Done => break,
            };

            validate_transition(step, next)?;
            if cfg!(debug_assertions) {
                run.state_ref()?.check_invariants()?;
            }
            tracing::debug!(from = %step, to = %next, steps = run.budget.used(), "transition");
            step = next;
        }

        Ok(())
    }

    /// GeneratingEntities: one generator call, then the records
    async fn generate_entities(&self, run: &mut Run) -> Result<Step, WorkflowError> {
        let location = Location::start();
        run.budget.charge(1, location)?;

        let target = self.config.target_entity_count;
        let call = self.capabilities.generator.generate(&run.topic, target);
        let mut entities = self
            .guard(run, location, call)
            .await?
            .map_err(|source| capability_error(CapabilityKind::Generation, location, source))?;

        if entities.len() > target {
            tracing::warn!(
                generated = entities.len(),
                target,
                "generator returned extra entities, keeping the first {target}"
            );
            entities.truncate(target);
        } else if !entities.is_empty() && entities.len() < target {
            tracing::warn!(generated = entities.len(), target, "generator returned fewer entities than requested");
        }

        let state = WorkflowState::new(run.topic.clone(), entities)?;
        tracing::info!(entities = state.entities().len(), "entity set generated");
        run.state = Some(state);
        Ok(Step::AnalyzingEntity)
    }

    /// AnalyzingEntity: analyze a wave of entities starting at the cursor
    ///
    /// With `max_concurrency == 1` the wave is exactly the cursor entity.
    /// Results are applied in generation order; the first failure stops the
    /// run and leaves the failing entity and everything after it unwritten.
    async fn analyze_entities(&self, run: &mut Run) -> Result<Step, WorkflowError> {
        let budget_left = run.budget.remaining();
        let (phase, start, inputs) = {
            let state = run.state_ref()?;
            let phase = state.current_phase();
            let start = state.cursor();
            let remaining_entities = state.entities().len().saturating_sub(start);
            let wave = self
                .config
                .max_concurrency
                .min(remaining_entities)
                .min(budget_left)
                .max(1);
            let inputs = (start..start + wave)
                .map(|index| state.analysis_input(index))
                .collect::<Result<Vec<_>, _>>()?;
            (phase, start, inputs)
        };
        run.budget.charge(inputs.len(), Location::entity(phase, start))?;

        let analyzer = &self.capabilities.analyzer;
        let topic = run.topic.as_str();
        let calls = inputs
            .iter()
            .map(|(entity, priors)| analyzer.analyze(phase, topic, entity, priors));
        run.stats.analysis_calls += inputs.len();
        let results = self
            .guard(run, Location::entity(phase, start), join_all(calls))
            .await?;

        let state = run.state()?;
        for ((entity, _), (offset, result)) in inputs.iter().zip(results.into_iter().enumerate()) {
            let location = Location::entity(phase, start + offset);
            let result =
                result.map_err(|source| capability_error(CapabilityKind::Analysis, location, source))?;
            if result.phase != phase {
                return Err(capability_error(
                    CapabilityKind::Analysis,
                    location,
                    CapabilityError::malformed(format!(
                        "analyzer returned a {} result during phase {phase}",
                        result.phase
                    )),
                ));
            }
            state.apply_analysis(result)?;
            tracing::debug!(entity = %entity.id, index = start + offset, phase = %phase, "analysis recorded");
        }

        Ok(Step::CheckingEntityCompletion)
    }

    /// SummarizingPhase: one fan-in call over every entity's result
    async fn summarize_phase(&self, run: &mut Run) -> Result<Step, WorkflowError> {
        let (phase, results, priors) = {
            let state = run.state_ref()?;
            let (results, priors) = state.summary_input()?;
            (state.current_phase(), results, priors)
        };
        let location = Location::phase(phase);
        run.budget.charge(1, location)?;

        let call = self
            .capabilities
            .summarizer
            .summarize(phase, &run.topic, &results, &priors);
        run.stats.summary_calls += 1;
        let summary = self
            .guard(run, location, call)
            .await?
            .map_err(|source| capability_error(CapabilityKind::Summarization, location, source))?;

        if summary.phase != phase {
            return Err(capability_error(
                CapabilityKind::Summarization,
                location,
                CapabilityError::malformed(format!(
                    "summarizer returned a {} summary during phase {phase}",
                    summary.phase
                )),
            ));
        }

        run.state()?.apply_summary(summary)?;
        tracing::info!(phase = %phase, entities = results.len(), "phase summarized");
        Ok(Step::AdvancingPhase)
    }

    /// Transition boundary check for cancellation and deadline
    fn check_interrupt(&self, run: &Run) -> Result<(), WorkflowError> {
        if self.cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled {
                reason: CancelReason::Requested,
                location: run.location(),
            });
        }
        if let Some((at, timeout)) = run.deadline {
            if Instant::now() >= at {
                return Err(WorkflowError::Cancelled {
                    reason: CancelReason::Deadline { timeout },
                    location: run.location(),
                });
            }
        }
        Ok(())
    }

    /// Race a capability call against cancellation and the deadline
    ///
    /// An interrupted call is dropped; its result is never applied.
    async fn guard<F: Future>(
        &self,
        run: &Run,
        location: Location,
        call: F,
    ) -> Result<F::Output, WorkflowError> {
        let deadline = run.deadline;
        let expired = async move {
            match deadline {
                Some((at, _)) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(WorkflowError::Cancelled {
                reason: CancelReason::Requested,
                location,
            }),
            () = expired => Err(WorkflowError::Cancelled {
                reason: CancelReason::Deadline {
                    timeout: deadline.map(|(_, t)| t).unwrap_or_default(),
                },
                location,
            }),
            output = call => Ok(output),
        }
    }

    /// Done: assemble the result set
    fn finish(run: Run) -> Result<RunOutcome, WorkflowError> {
        let state = run
            .state
            .ok_or_else(|| WorkflowError::InvariantViolation("finished without entities".to_string()))?;
        if !state.is_done() {
            return Err(WorkflowError::InvariantViolation(
                "finished before the T summary".to_string(),
            ));
        }

        let (records, summaries) = state.into_parts();
        let (y, w, t) = summaries.into_parts();
        let missing = |phase: Phase| WorkflowError::MissingPhaseSummary {
            phase: Phase::T,
            missing: phase,
        };

        Ok(RunOutcome {
            run_id: run.run_id,
            topic: run.topic,
            records,
            y_summary: y.ok_or_else(|| missing(Phase::Y))?,
            w_summary: w.ok_or_else(|| missing(Phase::W))?,
            t_summary: t.ok_or_else(|| missing(Phase::T))?,
            stats: run.stats,
        })
    }
}

fn capability_error(
    capability: CapabilityKind,
    location: Location,
    source: CapabilityError,
) -> WorkflowError {
    WorkflowError::Capability {
        capability,
        location,
        source,
    }
}
