//! Architectural Contract Test: Retry Policy
//!
//! This test verifies that the orchestrator owns retry for the fetch and
//! write stages, and that a failed fetch never touches the configuration.
//!
//! Constraints verified:
//! - Transient fetch failures are retried until success
//! - Bounded policies stop and skip write and reload
//! - Structural failures fail fast when configured to
//! - Write failures are retried, reload failures are not
//!
//! If this test fails, someone has:
//! - Moved retry into a fetcher or writer
//! - Written or reloaded after the registry could not be fetched
//! - Allowed an empty registry to replace the configuration

mod common;

use common::*;
use sinkhole_core::{
    Error, FetchError, FileConfigWriter, ShutdownSignal, Stage, SyncEvent, SyncOrchestrator,
    Trigger,
};

#[tokio::test]
async fn transient_fetch_failures_are_retried() {
    let log = CallLog::new();
    let fetcher = ScriptedFetcher::scripted(
        vec![
            Err(FetchError::Transport("connection refused".into())),
            Err(FetchError::Status { status: 503 }),
        ],
        Ok(registry(&["a.example"])),
        &log,
    );
    let writer = MemoryWriter::new(&log);
    let reloader = MockReloader::succeeding(&log);

    let (orchestrator, mut events) = SyncOrchestrator::new(
        Box::new(fetcher.clone()),
        Box::new(writer.clone()),
        Box::new(reloader.clone()),
        minimal_config(),
    )
    .unwrap();

    let report = orchestrator
        .run_cycle(Trigger::Manual, &ShutdownSignal::never())
        .await
        .expect("cycle succeeds after retries");

    assert_eq!(fetcher.call_count(), 3);
    assert_eq!(report.fetch_attempts, 3);
    assert_eq!(writer.call_count(), 1, "Write must run once after the fetch succeeds");
    assert_eq!(reloader.call_count(), 1);
    assert_eq!(log.calls(), vec!["fetch", "fetch", "fetch", "write", "reload"]);

    let failures: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SyncEvent::AttemptFailed { stage, attempt, retry_in, .. } => Some((stage, attempt, retry_in)),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|(stage, _, retry_in)| *stage == Stage::Fetch && retry_in.is_some()));
    assert_eq!(failures[0].1, 1);
    assert_eq!(failures[1].1, 2);
}

#[tokio::test]
async fn exhausted_fetch_skips_write_and_reload() {
    let log = CallLog::new();
    let fetcher = ScriptedFetcher::failing(FetchError::Transport("timed out".into()), &log);
    let writer = MemoryWriter::new(&log);
    let reloader = MockReloader::succeeding(&log);

    let mut config = minimal_config();
    config.retry.max_attempts = Some(3);

    let (orchestrator, _events) = SyncOrchestrator::new(
        Box::new(fetcher.clone()),
        Box::new(writer.clone()),
        Box::new(reloader.clone()),
        config,
    )
    .unwrap();

    let result = orchestrator
        .run_cycle(Trigger::Manual, &ShutdownSignal::never())
        .await;

    match result {
        Err(Error::Fetch { attempts, source }) => {
            assert_eq!(attempts, 3);
            assert_eq!(source, FetchError::Transport("timed out".into()));
        }
        other => panic!("expected fetch failure, got {:?}", other),
    }
    assert_eq!(fetcher.call_count(), 3);
    assert_eq!(writer.call_count(), 0, "Failed fetch must not write");
    assert_eq!(reloader.call_count(), 0, "Failed fetch must not reload");
}

#[tokio::test]
async fn structural_failure_fails_fast_when_not_retried() {
    let log = CallLog::new();
    let fetcher = ScriptedFetcher::failing(FetchError::ParseFailure("unexpected root".into()), &log);
    let writer = MemoryWriter::new(&log);

    let mut config = minimal_config();
    config.retry.retry_structural = false;

    let (orchestrator, mut events) = SyncOrchestrator::new(
        Box::new(fetcher.clone()),
        Box::new(writer.clone()),
        Box::new(MockReloader::succeeding(&log)),
        config,
    )
    .unwrap();

    let result = orchestrator
        .run_cycle(Trigger::Manual, &ShutdownSignal::never())
        .await;

    assert!(matches!(result, Err(Error::Fetch { attempts: 1, .. })));
    assert_eq!(fetcher.call_count(), 1);
    assert_eq!(writer.call_count(), 0);

    let events = drain_events(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        SyncEvent::CycleFailed { stage: Some(Stage::Fetch), .. }
    )));
}

#[tokio::test]
async fn structural_failure_is_retried_by_default() {
    let log = CallLog::new();
    let fetcher = ScriptedFetcher::scripted(
        vec![Err(FetchError::ParseFailure("truncated document".into()))],
        Ok(registry(&["a.example"])),
        &log,
    );

    let (orchestrator, _events) = SyncOrchestrator::new(
        Box::new(fetcher.clone()),
        Box::new(MemoryWriter::new(&log)),
        Box::new(MockReloader::succeeding(&log)),
        minimal_config(),
    )
    .unwrap();

    let report = orchestrator
        .run_cycle(Trigger::Manual, &ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(report.fetch_attempts, 2);
    assert_eq!(fetcher.call_count(), 2);
}

#[tokio::test]
async fn empty_registry_never_replaces_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rsh.conf");
    let previous = "local-zone: \"old.example\" redirect\n";
    std::fs::write(&path, previous).unwrap();

    let log = CallLog::new();
    let fetcher = ScriptedFetcher::failing(FetchError::EmptyResult, &log);
    let reloader = MockReloader::succeeding(&log);

    let mut config = minimal_config();
    config.retry.max_attempts = Some(2);

    let (orchestrator, _events) = SyncOrchestrator::new(
        Box::new(fetcher),
        Box::new(FileConfigWriter::new(&path)),
        Box::new(reloader.clone()),
        config,
    )
    .unwrap();

    let result = orchestrator
        .run_cycle(Trigger::Manual, &ShutdownSignal::never())
        .await;

    assert!(matches!(
        result,
        Err(Error::Fetch { source: FetchError::EmptyResult, .. })
    ));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), previous);
    assert_eq!(reloader.call_count(), 0);
}

#[tokio::test]
async fn write_failures_are_retried() {
    let log = CallLog::new();
    let writer = MemoryWriter::failing_times(2, &log);
    let reloader = MockReloader::succeeding(&log);

    let (orchestrator, _events) = SyncOrchestrator::new(
        Box::new(ScriptedFetcher::succeeding(registry(&["a.example"]), &log)),
        Box::new(writer.clone()),
        Box::new(reloader.clone()),
        minimal_config(),
    )
    .unwrap();

    let report = orchestrator
        .run_cycle(Trigger::Manual, &ShutdownSignal::never())
        .await
        .expect("cycle succeeds once the write goes through");

    assert_eq!(report.fetch_attempts, 1, "Fetch must not be repeated for write retries");
    assert_eq!(report.write_attempts, 3);
    assert_eq!(writer.call_count(), 3);
    assert!(writer.content().is_some());
    assert_eq!(reloader.call_count(), 1);
    assert_eq!(log.calls(), vec!["fetch", "write", "write", "write", "reload"]);
}

#[tokio::test]
async fn exhausted_write_skips_reload() {
    let log = CallLog::new();
    let writer = MemoryWriter::failing_times(usize::MAX, &log);
    let reloader = MockReloader::succeeding(&log);

    let mut config = minimal_config();
    config.retry.max_attempts = Some(2);

    let (orchestrator, _events) = SyncOrchestrator::new(
        Box::new(ScriptedFetcher::succeeding(registry(&["a.example"]), &log)),
        Box::new(writer.clone()),
        Box::new(reloader.clone()),
        config,
    )
    .unwrap();

    let result = orchestrator
        .run_cycle(Trigger::Manual, &ShutdownSignal::never())
        .await;

    match result {
        Err(e @ Error::Write { attempts: 2, .. }) => assert_eq!(e.stage(), Some(Stage::Write)),
        other => panic!("expected write failure, got {:?}", other),
    }
    assert_eq!(reloader.call_count(), 0);
}

#[tokio::test]
async fn empty_list_from_fetcher_is_rejected() {
    let log = CallLog::new();
    let writer = MemoryWriter::new(&log);

    let mut config = minimal_config();
    config.retry.max_attempts = Some(1);

    let (orchestrator, _events) = SyncOrchestrator::new(
        Box::new(ScriptedFetcher::succeeding(registry(&[]), &log)),
        Box::new(writer.clone()),
        Box::new(MockReloader::succeeding(&log)),
        config,
    )
    .unwrap();

    let result = orchestrator
        .run_cycle(Trigger::Manual, &ShutdownSignal::never())
        .await;

    assert!(matches!(
        result,
        Err(Error::Fetch { source: FetchError::EmptyResult, .. })
    ));
    assert_eq!(writer.call_count(), 0);
}

#[tokio::test]
async fn unrenderable_only_registry_counts_as_empty() {
    let log = CallLog::new();
    let writer = MemoryWriter::new(&log);

    let mut config = minimal_config();
    config.retry.max_attempts = Some(2);

    let (orchestrator, _events) = SyncOrchestrator::new(
        Box::new(ScriptedFetcher::succeeding(
            registry(&["a\nlocal-zone: \"evil.example\" static", "q\"x.example"]),
            &log,
        )),
        Box::new(writer.clone()),
        Box::new(MockReloader::succeeding(&log)),
        config,
    )
    .unwrap();

    let result = orchestrator
        .run_cycle(Trigger::Manual, &ShutdownSignal::never())
        .await;

    assert!(matches!(
        result,
        Err(Error::Fetch { attempts: 2, source: FetchError::EmptyResult })
    ));
    assert_eq!(writer.call_count(), 0, "Nothing renderable must not be written");
}
