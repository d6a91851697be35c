//! Testing utilities for YWT workspace
//!
//! Deterministic stub capabilities that record every call into a shared
//! [`CallLog`], with optional fault injection and artificial latency.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use ywt_core::{
    Analyzer, Capabilities, CapabilityError, Entity, EntityGenerator, EntityId, EntityPhaseResult,
    Phase, PhaseResult, PhaseSummary, Summarizer,
};

/// One recorded capability call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Generate {
        topic: String,
        count: usize,
    },
    Analyze {
        phase: Phase,
        entity: EntityId,
        priors: Vec<PhaseResult>,
    },
    Summarize {
        phase: Phase,
        results: Vec<(EntityId, PhaseResult)>,
        prior_summaries: Vec<PhaseSummary>,
    },
}

/// Shared, ordered record of capability calls
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: Call) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn analysis_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Analyze { .. }))
            .collect()
    }

    pub fn summary_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Summarize { .. }))
            .collect()
    }

    /// Compact trace such as `["gen", "Y:A", "Y:B", "sum:Y", ...]`
    pub fn trace(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| match call {
                Call::Generate { .. } => "gen".to_string(),
                Call::Analyze { phase, entity, .. } => format!("{phase}:{entity}"),
                Call::Summarize { phase, .. } => format!("sum:{phase}"),
            })
            .collect()
    }
}

/// Generator returning a fixed entity list
#[derive(Debug, Clone)]
pub struct StubGenerator {
    entities: Vec<Entity>,
    failure: Option<CapabilityError>,
    log: CallLog,
}

impl StubGenerator {
    pub fn new<I, S>(ids: I, log: CallLog) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entities = ids
            .into_iter()
            .map(|id| {
                let id = id.into();
                let descriptor = format!("persona {id}");
                Entity::new(id, descriptor)
            })
            .collect();
        Self {
            entities,
            failure: None,
            log,
        }
    }

    /// Entities `P1..Pn`
    pub fn numbered(count: usize, log: CallLog) -> Self {
        Self::new((1..=count).map(|i| format!("P{i}")), log)
    }

    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = entities;
        self
    }

    pub fn failing(mut self, error: CapabilityError) -> Self {
        self.failure = Some(error);
        self
    }
}

#[async_trait]
impl EntityGenerator for StubGenerator {
    async fn generate(&self, topic: &str, count: usize) -> Result<Vec<Entity>, CapabilityError> {
        self.log.push(Call::Generate {
            topic: topic.to_string(),
            count,
        });
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.entities.clone()),
        }
    }
}

/// Analyzer answering `"<phase>:<id>"`
#[derive(Debug, Clone)]
pub struct StubAnalyzer {
    log: CallLog,
    failure: Option<(Phase, EntityId, CapabilityError)>,
    wrong_phase: bool,
    delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl StubAnalyzer {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failure: None,
            wrong_phase: false,
            delay: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail when analyzing `entity` in `phase`
    pub fn failing_on(mut self, phase: Phase, entity: &str, error: CapabilityError) -> Self {
        self.failure = Some((phase, EntityId::new(entity), error));
        self
    }

    /// Tag every result with phase T regardless of the requested phase
    pub fn with_wrong_phase(mut self) -> Self {
        self.wrong_phase = true;
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Highest number of overlapping calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for StubAnalyzer {
    async fn analyze(
        &self,
        phase: Phase,
        _topic: &str,
        entity: &Entity,
        priors: &[PhaseResult],
    ) -> Result<PhaseResult, CapabilityError> {
        self.log.push(Call::Analyze {
            phase,
            entity: entity.id.clone(),
            priors: priors.to_vec(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some((fail_phase, fail_id, err)) = &self.failure {
            if *fail_phase == phase && *fail_id == entity.id {
                return Err(err.clone());
            }
        }

        let phase = if self.wrong_phase { Phase::T } else { phase };
        Ok(PhaseResult::new(phase, format!("{phase}:{}", entity.id)))
    }
}

/// Summarizer answering `"summary:<phase>"`
#[derive(Debug, Clone)]
pub struct StubSummarizer {
    log: CallLog,
    failure: Option<(Phase, CapabilityError)>,
}

impl StubSummarizer {
    pub fn new(log: CallLog) -> Self {
        Self { log, failure: None }
    }

    pub fn failing_on(mut self, phase: Phase, error: CapabilityError) -> Self {
        self.failure = Some((phase, error));
        self
    }
}

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(
        &self,
        phase: Phase,
        _topic: &str,
        results: &[EntityPhaseResult],
        prior_summaries: &[PhaseSummary],
    ) -> Result<PhaseSummary, CapabilityError> {
        self.log.push(Call::Summarize {
            phase,
            results: results
                .iter()
                .map(|r| (r.entity.id.clone(), r.result.clone()))
                .collect(),
            prior_summaries: prior_summaries.to_vec(),
        });

        match &self.failure {
            Some((fail_phase, err)) if *fail_phase == phase => Err(err.clone()),
            _ => Ok(PhaseSummary::new(phase, format!("summary:{phase}"))),
        }
    }
}

/// Bundle stubs into [`Capabilities`]
pub fn capabilities(
    generator: StubGenerator,
    analyzer: StubAnalyzer,
    summarizer: StubSummarizer,
) -> Capabilities {
    Capabilities::new(Arc::new(generator), Arc::new(analyzer), Arc::new(summarizer))
}

/// Stub capabilities over entities `ids`, all logging into one [`CallLog`]
pub fn setup_stub_capabilities(ids: &[&str]) -> (Capabilities, CallLog) {
    let log = CallLog::new();
    let caps = capabilities(
        StubGenerator::new(ids.iter().copied(), log.clone()),
        StubAnalyzer::new(log.clone()),
        StubSummarizer::new(log.clone()),
    );
    (caps, log)
}
