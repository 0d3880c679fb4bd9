//! Test doubles and common utilities for orchestrator contract tests
//!
//! The doubles are cheap to clone; clones share their counters, so a test
//! keeps one copy for assertions and hands another to the orchestrator.

#![allow(dead_code)]

use sinkhole_core::{
    ConfigWriter, FetchError, RegistryEntry, RegistryFetcher, RegistryList, ReloadError,
    RenderedConfig, ResolverReloader, RetryPolicy, ShutdownSignal, SyncConfig, SyncEvent,
    WriteError,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Order in which the stages were called, shared by all doubles of a test
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, stage: &'static str) {
        self.calls.lock().unwrap().push(stage);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

/// Build a registry list from addresses
pub fn registry(addresses: &[&str]) -> RegistryList {
    addresses.iter().map(|a| RegistryEntry::new(*a)).collect()
}

/// A RegistryFetcher that replays scripted responses
///
/// Once the script is used up, the fallback response is returned forever.
#[derive(Clone)]
pub struct ScriptedFetcher {
    script: Arc<Mutex<VecDeque<Result<RegistryList, FetchError>>>>,
    fallback: Result<RegistryList, FetchError>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    log: CallLog,
}

impl ScriptedFetcher {
    /// Always succeed with `list`
    pub fn succeeding(list: RegistryList, log: &CallLog) -> Self {
        Self::scripted(Vec::new(), Ok(list), log)
    }

    /// Always fail with `error`
    pub fn failing(error: FetchError, log: &CallLog) -> Self {
        Self::scripted(Vec::new(), Err(error), log)
    }

    /// Replay `script`, then `fallback`
    pub fn scripted(
        script: Vec<Result<RegistryList, FetchError>>,
        fallback: Result<RegistryList, FetchError>,
        log: &CallLog,
    ) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            fallback,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            log: log.clone(),
        }
    }

    /// Make every call take `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Get the number of times fetch() was called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent fetch() calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RegistryFetcher for ScriptedFetcher {
    async fn fetch(&self) -> Result<RegistryList, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.record("fetch");

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        next.unwrap_or_else(|| self.fallback.clone())
    }

    fn endpoint(&self) -> &str {
        "scripted://registry"
    }
}

/// A ConfigWriter that keeps the last written config in memory
#[derive(Clone)]
pub struct MemoryWriter {
    content: Arc<Mutex<Option<String>>>,
    failures_left: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    log: CallLog,
}

impl MemoryWriter {
    pub fn new(log: &CallLog) -> Self {
        Self::failing_times(0, log)
    }

    /// Fail the first `failures` writes with an I/O error
    pub fn failing_times(failures: usize, log: &CallLog) -> Self {
        Self {
            content: Arc::new(Mutex::new(None)),
            failures_left: Arc::new(AtomicUsize::new(failures)),
            calls: Arc::new(AtomicUsize::new(0)),
            log: log.clone(),
        }
    }

    /// Get the number of times write() was called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Last successfully written content
    pub fn content(&self) -> Option<String> {
        self.content.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ConfigWriter for MemoryWriter {
    async fn write(&self, config: &RenderedConfig) -> Result<(), WriteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.record("write");

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(WriteError::from_io(
                "memory://config",
                std::io::Error::other("disk full"),
            ));
        }

        *self.content.lock().unwrap() = Some(config.as_str().to_string());
        Ok(())
    }

    fn destination(&self) -> String {
        "memory://config".to_string()
    }
}

/// A ResolverReloader that tracks calls and succeeds or fails on demand
#[derive(Clone)]
pub struct MockReloader {
    fail: bool,
    calls: Arc<AtomicUsize>,
    log: CallLog,
}

impl MockReloader {
    pub fn succeeding(log: &CallLog) -> Self {
        Self {
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
            log: log.clone(),
        }
    }

    pub fn failing(log: &CallLog) -> Self {
        Self {
            fail: true,
            ..Self::succeeding(log)
        }
    }

    /// Get the number of times reload() was called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ResolverReloader for MockReloader {
    async fn reload(&self, _shutdown: &ShutdownSignal) -> Result<(), ReloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.record("reload");

        if self.fail {
            Err(ReloadError::ProcessFailure {
                command: "mock reload".to_string(),
                code: Some(1),
                stderr: "resolver not running".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn describe(&self) -> String {
        "mock reload".to_string()
    }
}

/// Retry policy with millisecond delays and no jitter
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        initial_interval_ms: 1,
        multiplier: 2.0,
        max_interval_ms: 5,
        randomization_factor: 0.0,
        max_elapsed_secs: None,
        max_attempts: None,
        retry_structural: true,
    }
}

/// Helper to create a minimal SyncConfig for testing
pub fn minimal_config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.redirect = "10.0.0.1".parse().unwrap();
    config.retry = fast_retry();
    config
}

/// Wait (up to 5 seconds) for the first event matching `pred`
pub async fn wait_for_event(
    rx: &mut mpsc::Receiver<SyncEvent>,
    pred: impl Fn(&SyncEvent) -> bool,
) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Some(event) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("event channel closed before the expected event"),
            }
        }
    })
    .await
    .expect("expected event within 5 seconds")
}

/// Collect every event already emitted
pub fn drain_events(rx: &mut mpsc::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
