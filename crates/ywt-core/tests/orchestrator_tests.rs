//! End-to-end runs of the orchestrator against recording stub capabilities.
//!
//! Ordering guarantees checked here:
//! - Every entity is analyzed for a phase before that phase is summarized.
//! - Phases run strictly Y, then W, then T.
//! - Each analysis sees only the same entity's earlier results.
//! - Each summary sees every entity's result plus all earlier summaries.

use pretty_assertions::assert_eq;
use ywt_core::{
    CapabilityError, CapabilityKind, Entity, Location, Orchestrator, Phase, PhaseResult,
    PhaseSummary, RunConfig, WorkflowError,
};
use ywt_test_utils::{
    capabilities, setup_stub_capabilities, Call, CallLog, StubAnalyzer, StubGenerator,
    StubSummarizer,
};

fn config(entities: usize) -> RunConfig {
    RunConfig::new().with_target_entity_count(entities)
}

#[tokio::test]
async fn three_entities_run_in_phase_order() {
    let (caps, log) = setup_stub_capabilities(&["A", "B", "C"]);
    let outcome = Orchestrator::new(caps, config(3))
        .run("improve onboarding")
        .await
        .unwrap();

    assert_eq!(
        log.trace(),
        vec![
            "gen", "Y:A", "Y:B", "Y:C", "sum:Y", "W:A", "W:B", "W:C", "sum:W", "T:A", "T:B",
            "T:C", "sum:T",
        ]
    );

    let b = outcome.record("B").unwrap();
    assert_eq!(b.get(Phase::Y).unwrap().payload, "Y:B");
    assert_eq!(b.get(Phase::W).unwrap().payload, "W:B");
    assert_eq!(b.get(Phase::T).unwrap().payload, "T:B");
    assert!(outcome.records.values().all(|r| r.is_complete()));

    assert_eq!(outcome.y_summary.payload, "summary:Y");
    assert_eq!(outcome.w_summary.payload, "summary:W");
    assert_eq!(outcome.summary(Phase::T).payload, "summary:T");
    assert_eq!(outcome.topic, "improve onboarding");
}

#[tokio::test]
async fn records_keep_generation_order() {
    let (caps, _log) = setup_stub_capabilities(&["zeta", "alpha", "mid"]);
    let outcome = Orchestrator::new(caps, config(3)).run("retro").await.unwrap();

    let ids: Vec<&str> = outcome.records.keys().map(|id| id.as_str()).collect();
    assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
}

#[tokio::test]
async fn analysis_sees_only_own_earlier_results() {
    let (caps, log) = setup_stub_capabilities(&["A", "B"]);
    Orchestrator::new(caps, config(2)).run("retro").await.unwrap();

    for call in log.analysis_calls() {
        let Call::Analyze {
            phase,
            entity,
            priors,
        } = call
        else {
            unreachable!()
        };
        let expected: Vec<PhaseResult> = phase
            .predecessors()
            .iter()
            .map(|p| PhaseResult::new(*p, format!("{p}:{entity}")))
            .collect();
        assert_eq!(priors, expected, "priors of {entity} in phase {phase}");
    }
}

#[tokio::test]
async fn summaries_chain_and_see_every_entity() {
    let (caps, log) = setup_stub_capabilities(&["A", "B", "C"]);
    Orchestrator::new(caps, config(3)).run("retro").await.unwrap();

    let summaries = log.summary_calls();
    assert_eq!(summaries.len(), 3);

    for (call, phase) in summaries.into_iter().zip(Phase::ALL) {
        let Call::Summarize {
            phase: called,
            results,
            prior_summaries,
        } = call
        else {
            unreachable!()
        };
        assert_eq!(called, phase);

        let ids: Vec<String> = results.iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert!(results.iter().all(|(_, r)| r.phase == phase));

        let expected: Vec<PhaseSummary> = phase
            .predecessors()
            .iter()
            .map(|p| PhaseSummary::new(*p, format!("summary:{p}")))
            .collect();
        assert_eq!(prior_summaries, expected);
    }
}

#[tokio::test]
async fn empty_entity_set_fails_after_one_call() {
    let (caps, log) = setup_stub_capabilities(&[]);
    let err = Orchestrator::new(caps, config(3)).run("retro").await.unwrap_err();

    assert_eq!(err, WorkflowError::EmptyEntitySet);
    assert_eq!(log.trace(), vec!["gen"]);
}

#[tokio::test]
async fn generator_gets_topic_and_target_count() {
    let (caps, log) = setup_stub_capabilities(&["A"]);
    Orchestrator::new(caps, config(4)).run("ship faster").await.unwrap();

    assert_eq!(
        log.calls()[0],
        Call::Generate {
            topic: "ship faster".to_string(),
            count: 4
        }
    );
}

#[tokio::test]
async fn extra_entities_are_truncated_to_target() {
    let (caps, log) = setup_stub_capabilities(&["A", "B", "C", "D"]);
    let outcome = Orchestrator::new(caps, config(2)).run("retro").await.unwrap();

    let ids: Vec<&str> = outcome.records.keys().map(|id| id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
    assert_eq!(log.analysis_calls().len(), 6);
}

#[tokio::test]
async fn duplicate_entity_ids_are_malformed() {
    let log = CallLog::new();
    let generator = StubGenerator::new(Vec::<String>::new(), log.clone()).with_entities(vec![
        Entity::new("A", "nurse"),
        Entity::new("A", "pilot"),
    ]);
    let caps = capabilities(
        generator,
        StubAnalyzer::new(log.clone()),
        StubSummarizer::new(log.clone()),
    );

    let err = Orchestrator::new(caps, config(2)).run("retro").await.unwrap_err();
    assert!(matches!(err, WorkflowError::MalformedEntitySet(_)));
    assert_eq!(log.trace(), vec!["gen"]);
}

#[tokio::test]
async fn analysis_failure_stops_at_failing_entity() {
    let log = CallLog::new();
    let caps = capabilities(
        StubGenerator::numbered(5, log.clone()),
        StubAnalyzer::new(log.clone()).failing_on(
            Phase::Y,
            "P2",
            CapabilityError::transport("connection reset", true),
        ),
        StubSummarizer::new(log.clone()),
    );

    let err = Orchestrator::new(caps, config(5)).run("retro").await.unwrap_err();

    match &err {
        WorkflowError::Capability {
            capability: CapabilityKind::Analysis,
            location,
            source,
        } => {
            assert_eq!(*location, Location::entity(Phase::Y, 1));
            assert!(source.is_transient());
        }
        other => panic!("expected analysis failure, got {other:?}"),
    }
    assert!(err.is_retryable());
    assert_eq!(log.trace(), vec!["gen", "Y:P1", "Y:P2"]);
}

#[tokio::test]
async fn summary_failure_blocks_next_phase() {
    let log = CallLog::new();
    let caps = capabilities(
        StubGenerator::numbered(2, log.clone()),
        StubAnalyzer::new(log.clone()),
        StubSummarizer::new(log.clone())
            .failing_on(Phase::W, CapabilityError::Rejected("content policy".into())),
    );

    let err = Orchestrator::new(caps, config(2)).run("retro").await.unwrap_err();

    assert_eq!(err.location(), Some(Location::phase(Phase::W)));
    assert!(!err.is_retryable());
    assert_eq!(
        log.trace(),
        vec!["gen", "Y:P1", "Y:P2", "sum:Y", "W:P1", "W:P2", "sum:W"]
    );
}

#[tokio::test]
async fn wrong_phase_result_is_malformed_output() {
    let log = CallLog::new();
    let caps = capabilities(
        StubGenerator::numbered(1, log.clone()),
        StubAnalyzer::new(log.clone()).with_wrong_phase(),
        StubSummarizer::new(log.clone()),
    );

    let err = Orchestrator::new(caps, config(1)).run("retro").await.unwrap_err();
    assert_eq!(err.kind(), "capability");
    assert!(log.summary_calls().is_empty());
}

#[tokio::test]
async fn repeated_runs_produce_identical_results() {
    let (caps, _log) = setup_stub_capabilities(&["A", "B"]);
    let orchestrator = Orchestrator::new(caps, config(2));

    let first = orchestrator.run("retro").await.unwrap();
    let second = orchestrator.run("retro").await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.records, second.records);
    assert_eq!(first.t_summary, second.t_summary);
    assert_eq!(first.stats.steps, second.stats.steps);
}

#[tokio::test]
async fn outcome_serializes_to_json() {
    let (caps, _log) = setup_stub_capabilities(&["A"]);
    let outcome = Orchestrator::new(caps, config(1)).run("retro").await.unwrap();

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["topic"], "retro");
    assert_eq!(json["t_summary"]["payload"], "summary:T");
    assert_eq!(json["records"]["A"]["y"]["state"], "present");
}
