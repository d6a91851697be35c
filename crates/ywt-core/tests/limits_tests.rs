//! Step limit, cancellation, deadline and bounded concurrency.

use std::time::Duration;
use ywt_core::{
    CancelReason, CancellationToken, Location, Orchestrator, Phase, RunConfig, WorkflowError,
};
use ywt_test_utils::{
    capabilities, setup_stub_capabilities, CallLog, StubAnalyzer, StubGenerator, StubSummarizer,
};

fn slow_capabilities(entities: usize, delay: Duration) -> (ywt_core::Capabilities, CallLog, StubAnalyzer) {
    let log = CallLog::new();
    let analyzer = StubAnalyzer::new(log.clone()).with_delay(delay);
    let caps = capabilities(
        StubGenerator::numbered(entities, log.clone()),
        analyzer.clone(),
        StubSummarizer::new(log.clone()),
    );
    (caps, log, analyzer)
}

#[tokio::test]
async fn exact_step_budget_is_enough() {
    for n in 1..=4 {
        let ids: Vec<String> = (1..=n).map(|i| format!("P{i}")).collect();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (caps, _log) = setup_stub_capabilities(&ids);
        let config = RunConfig::new()
            .with_target_entity_count(n)
            .with_step_limit(RunConfig::required_steps(n));

        let outcome = Orchestrator::new(caps, config).run("retro").await.unwrap();
        assert_eq!(outcome.stats.steps, RunConfig::required_steps(n));
    }
}

#[tokio::test]
async fn one_step_short_exceeds_limit() {
    let (caps, log) = setup_stub_capabilities(&["A", "B", "C"]);
    let limit = RunConfig::required_steps(3) - 1;
    let config = RunConfig::new()
        .with_target_entity_count(3)
        .with_step_limit(limit);

    let err = Orchestrator::new(caps, config).run("retro").await.unwrap_err();

    assert!(matches!(err, WorkflowError::StepLimitExceeded { limit: l, .. } if l == limit));
    // Every capability call still happened; only the final completion check was refused.
    assert_eq!(log.summary_calls().len(), 3);
}

#[tokio::test]
async fn tiny_step_limit_stops_before_analysis() {
    let (caps, log) = setup_stub_capabilities(&["A", "B"]);
    let config = RunConfig::new()
        .with_target_entity_count(2)
        .with_step_limit(1);

    let err = Orchestrator::new(caps, config).run("retro").await.unwrap_err();

    assert_eq!(
        err,
        WorkflowError::StepLimitExceeded {
            limit: 1,
            location: Location::entity(Phase::Y, 0),
        }
    );
    assert_eq!(log.trace(), vec!["gen"]);
}

#[tokio::test]
async fn cancelled_token_stops_before_any_call() {
    let (caps, log) = setup_stub_capabilities(&["A"]);
    let token = CancellationToken::new();
    token.cancel();

    let err = Orchestrator::new(caps, RunConfig::new().with_target_entity_count(1))
        .with_cancellation(token)
        .run("retro")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        WorkflowError::Cancelled {
            reason: CancelReason::Requested,
            location: Location::start(),
        }
    );
    assert!(log.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_in_flight_analysis() {
    let (caps, log, _analyzer) = slow_capabilities(2, Duration::from_secs(10));
    let orchestrator = Orchestrator::new(caps, RunConfig::new().with_target_entity_count(2));
    let token = orchestrator.cancellation_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        token.cancel();
    });

    let err = orchestrator.run("retro").await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.location(), Some(Location::entity(Phase::Y, 0)));
    assert_eq!(log.trace(), vec!["gen", "Y:P1"]);
}

#[tokio::test(start_paused = true)]
async fn deadline_cancels_slow_run() {
    let (caps, log, _analyzer) = slow_capabilities(3, Duration::from_secs(10));
    let config = RunConfig::new()
        .with_target_entity_count(3)
        .with_timeout(Some(Duration::from_secs(15)));

    let err = Orchestrator::new(caps, config).run("retro").await.unwrap_err();

    match err {
        WorkflowError::Cancelled {
            reason: CancelReason::Deadline { timeout },
            location,
        } => {
            assert_eq!(timeout, Duration::from_secs(15));
            assert_eq!(location, Location::entity(Phase::Y, 1));
        }
        other => panic!("expected deadline cancellation, got {other:?}"),
    }
    assert_eq!(log.trace(), vec!["gen", "Y:P1", "Y:P2"]);
}

#[tokio::test(start_paused = true)]
async fn sub_second_deadline_is_honored() {
    let (caps, log, _analyzer) = slow_capabilities(2, Duration::from_secs(1));
    let config = RunConfig::new()
        .with_target_entity_count(2)
        .with_timeout(Some(Duration::from_millis(500)));

    let err = Orchestrator::new(caps, config).run("retro").await.unwrap_err();

    match err {
        WorkflowError::Cancelled {
            reason: CancelReason::Deadline { timeout },
            location,
        } => {
            assert_eq!(timeout, Duration::from_millis(500));
            assert_eq!(location, Location::entity(Phase::Y, 0));
        }
        other => panic!("expected deadline cancellation, got {other:?}"),
    }
    assert_eq!(log.trace(), vec!["gen", "Y:P1"]);
}

#[tokio::test(start_paused = true)]
async fn no_timeout_lets_slow_run_finish() {
    let (caps, _log, _analyzer) = slow_capabilities(2, Duration::from_secs(3600));
    let config = RunConfig::new()
        .with_target_entity_count(2)
        .with_timeout(None);

    let outcome = Orchestrator::new(caps, config).run("retro").await.unwrap();
    assert_eq!(outcome.records.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_waves_respect_bound_and_order() {
    let (caps, log, analyzer) = slow_capabilities(5, Duration::from_secs(1));
    let config = RunConfig::new()
        .with_target_entity_count(5)
        .with_max_concurrency(2);

    let outcome = Orchestrator::new(caps, config).run("retro").await.unwrap();

    assert_eq!(analyzer.max_in_flight(), 2);
    let ids: Vec<&str> = outcome.records.keys().map(|id| id.as_str()).collect();
    assert_eq!(ids, vec!["P1", "P2", "P3", "P4", "P5"]);
    assert_eq!(
        &log.trace()[..7],
        &["gen", "Y:P1", "Y:P2", "Y:P3", "Y:P4", "Y:P5", "sum:Y"]
    );
    assert!(outcome.stats.steps < RunConfig::required_steps(5));
}

#[tokio::test]
async fn invalid_config_is_rejected_before_generation() {
    let (caps, log) = setup_stub_capabilities(&["A"]);
    let config = RunConfig::new().with_max_concurrency(0);

    let err = Orchestrator::new(caps, config).run("retro").await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidConfig(_)));
    assert!(log.calls().is_empty());
}
