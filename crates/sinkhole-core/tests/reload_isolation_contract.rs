//! Architectural Contract Test: Reload Isolation
//!
//! This test verifies that a failed resolver reload never undoes or fails
//! the configuration write that preceded it.
//!
//! Constraints verified:
//! - The written file stays in place when reload fails
//! - The cycle still succeeds and reports the reload failure
//! - Reload is attempted exactly once per cycle
//!
//! If this test fails, someone has:
//! - Rolled back the file on reload failure
//! - Added retries around the reload command
//! - Turned reload failure into a cycle failure

mod common;

use common::*;
use sinkhole_core::{
    FileConfigWriter, ReloadOutcome, ShutdownSignal, SyncEvent, SyncOrchestrator, Trigger,
};

#[tokio::test]
async fn failed_reload_keeps_written_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rsh.conf");

    let log = CallLog::new();
    let reloader = MockReloader::failing(&log);

    let (orchestrator, mut events) = SyncOrchestrator::new(
        Box::new(ScriptedFetcher::succeeding(registry(&["a.example"]), &log)),
        Box::new(FileConfigWriter::new(&path)),
        Box::new(reloader.clone()),
        minimal_config(),
    )
    .unwrap();

    let report = orchestrator
        .run_cycle(Trigger::Manual, &ShutdownSignal::never())
        .await
        .expect("reload failure does not fail the cycle");

    assert!(matches!(report.reload, ReloadOutcome::Failed { .. }));
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "local-zone: \"a.example\" redirect\nlocal-data: \"a.example A 10.0.0.1\"\n"
    );
    assert_eq!(reloader.call_count(), 1, "Reload must not be retried");

    let events = drain_events(&mut events);
    assert!(events.iter().any(|e| matches!(e, SyncEvent::ReloadFailed { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, SyncEvent::CycleCompleted { domains: 1, .. })));
}

#[tokio::test]
async fn next_cycle_runs_after_failed_reload() {
    let log = CallLog::new();
    let fetcher = ScriptedFetcher::succeeding(registry(&["a.example"]), &log);
    let reloader = MockReloader::failing(&log);

    let (orchestrator, _events) = SyncOrchestrator::new(
        Box::new(fetcher.clone()),
        Box::new(MemoryWriter::new(&log)),
        Box::new(reloader.clone()),
        minimal_config(),
    )
    .unwrap();

    for _ in 0..2 {
        orchestrator
            .run_cycle(Trigger::Manual, &ShutdownSignal::never())
            .await
            .unwrap();
    }

    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(reloader.call_count(), 2);
    assert_eq!(
        log.calls(),
        vec!["fetch", "write", "reload", "fetch", "write", "reload"]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn failing_reload_command_is_reported() {
    use sinkhole_core::CommandReloader;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rsh.conf");
    let log = CallLog::new();

    let reloader = CommandReloader::new(
        "sh",
        vec!["-c".to_string(), "echo 'unbound not running' >&2; exit 3".to_string()],
    );

    let (orchestrator, _events) = SyncOrchestrator::new(
        Box::new(ScriptedFetcher::succeeding(registry(&["a.example"]), &log)),
        Box::new(FileConfigWriter::new(&path)),
        Box::new(reloader),
        minimal_config(),
    )
    .unwrap();

    let report = orchestrator
        .run_cycle(Trigger::Manual, &ShutdownSignal::never())
        .await
        .unwrap();

    match report.reload {
        ReloadOutcome::Failed { error } => {
            assert!(error.contains("unbound not running"), "{}", error);
        }
        ReloadOutcome::Reloaded => panic!("expected reload failure"),
    }
    assert!(path.exists());
}
