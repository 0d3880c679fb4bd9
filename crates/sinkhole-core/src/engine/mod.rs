//! Sync orchestrator
//!
//! The SyncOrchestrator is responsible for:
//! - Running one immediate cycle at startup
//! - Running a cycle on every tick of the periodic schedule
//! - Retrying the fetch and write stages with exponential backoff
//! - Stopping between cycles when the shutdown signal fires
//!
//! ## Cycle
//!
//! ```text
//! ┌─────────────────┐   RegistryList   ┌────────────┐  CanonicalDomainSet  ┌──────────┐
//! │ RegistryFetcher │ ───────────────▶ │ normalize  │ ───────────────────▶ │  render  │
//! │  (retried)      │                  └────────────┘                      └──────────┘
//! └─────────────────┘                                                           │
//!                                                                 RenderedConfig │
//!                       ┌──────────────────┐                    ┌──────────────┐ │
//!                       │ ResolverReloader │ ◀───────────────── │ ConfigWriter │◀┘
//!                       │  (once)          │                    │  (retried)   │
//!                       └──────────────────┘                    └──────────────┘
//! ```
//!
//! All cycle data is built fresh and dropped at the end of the cycle. The
//! written file is the only state that outlives a cycle.
//!
//! ## States
//!
//! The orchestrator is either idle (waiting for the next tick or for
//! shutdown) or syncing. Cycles run on the orchestrator's own task, one at a
//! time; a tick that comes due during a cycle is delayed, not queued.

pub mod report;

pub use report::{ReloadOutcome, SyncEvent, SyncReport, Trigger};

use chrono::Utc;
use std::fmt::Display;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

use crate::config::{MAX_INTERVAL_SECS, RetryPolicy, SyncConfig};
use crate::error::{Error, FetchError, Result, Stage, WriteError};
use crate::normalize::{CanonicalDomainSet, normalize};
use crate::render::{RenderedConfig, render};
use crate::retry::{RetryFailure, Retried, retry};
use crate::shutdown::{ShutdownHandle, ShutdownSignal, shutdown_channel};
use crate::traits::{ConfigWriter, RegistryFetcher, ResolverReloader};

/// Capacity of the monitoring event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Drives sync cycles on a periodic schedule
///
/// ## Lifecycle
///
/// 1. Create with [`SyncOrchestrator::new()`]
/// 2. Start with [`SyncOrchestrator::spawn()`] (or await
///    [`SyncOrchestrator::run_until()`] directly)
/// 3. Trigger the [`ShutdownHandle`] to stop after the current cycle
/// 4. Await the [`JoinHandle`] for completion
pub struct SyncOrchestrator {
    /// Source of the domain list
    fetcher: Box<dyn RegistryFetcher>,

    /// Destination of the rendered configuration
    writer: Box<dyn ConfigWriter>,

    /// Resolver reload mechanism
    reloader: Box<dyn ResolverReloader>,

    /// Address every domain is redirected to
    redirect: IpAddr,

    /// Retry policy for fetch and write
    retry: RetryPolicy,

    /// Time between periodic cycles
    interval: Duration,

    /// Run a cycle before entering the periodic loop
    startup_sync: bool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncOrchestrator {
    /// Create a new orchestrator
    ///
    /// # Returns
    ///
    /// A tuple of (orchestrator, event_receiver) where event_receiver yields
    /// [`SyncEvent`]s. Dropping the receiver is fine; events are then
    /// discarded.
    pub fn new(
        fetcher: Box<dyn RegistryFetcher>,
        writer: Box<dyn ConfigWriter>,
        reloader: Box<dyn ResolverReloader>,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let orchestrator = Self {
            fetcher,
            writer,
            reloader,
            redirect: config.redirect,
            retry: config.retry,
            interval: config.schedule.interval(),
            startup_sync: config.schedule.startup_sync,
            event_tx: tx,
        };

        Ok((orchestrator, rx))
    }

    /// Override the periodic interval with sub-second precision
    ///
    /// The interval is clamped between one millisecond and
    /// [`MAX_INTERVAL_SECS`].
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.clamp(
            Duration::from_millis(1),
            Duration::from_secs(MAX_INTERVAL_SECS),
        );
        self
    }

    /// Time between periodic cycles
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the orchestrator on a new task
    ///
    /// # Returns
    ///
    /// The handle that stops it and the task's join handle, which completes
    /// once the loop has exited.
    pub fn spawn(self) -> (ShutdownHandle, JoinHandle<()>) {
        let (handle, signal) = shutdown_channel();
        let join = tokio::spawn(async move { self.run_until(signal).await });
        (handle, join)
    }

    /// Run the startup cycle and then the periodic loop until `shutdown`
    /// fires
    ///
    /// Shutdown is checked between cycles. A cycle already running when it
    /// fires only stops early if it is waiting on a retry delay or on the
    /// resolver reload.
    pub async fn run_until(&self, shutdown: ShutdownSignal) {
        self.emit_event(SyncEvent::Started {
            interval: self.interval,
        });
        info!(
            "Starting sync orchestrator (registry={}, output={}, interval={:?})",
            self.fetcher.endpoint(),
            self.writer.destination(),
            self.interval
        );

        if self.startup_sync && !shutdown.is_triggered() {
            match self.run_cycle(Trigger::Startup, &shutdown).await {
                Ok(_) => info!("Initial config update done"),
                Err(e) => {
                    error!("While populating config at startup: {}", e);
                    error!("Continuing anyway...");
                }
            }
        }

        // First tick one full interval after the startup cycle finished.
        // The interval never exceeds MAX_INTERVAL_SECS, so this cannot overflow.
        let mut timer = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(timer);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.triggered() => {
                    break;
                }

                Some(_) = ticks.next() => {
                    if shutdown.is_triggered() {
                        break;
                    }
                    if let Err(e) = self.run_cycle(Trigger::Periodic, &shutdown).await {
                        error!("Periodic config update failed: {}", e);
                    }
                }
            }
        }

        info!("Shutdown signal received, stopping runner");
        self.emit_event(SyncEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });
    }

    /// Run one full cycle: fetch, normalize, render, write, reload
    ///
    /// # Returns
    ///
    /// - `Ok(SyncReport)`: The configuration was written. The reload outcome
    ///   is in the report; a failed reload does not fail the cycle.
    /// - `Err(Error::Fetch | Error::Write)`: The retry policy gave up; the
    ///   previous configuration is untouched.
    /// - `Err(Error::Cancelled)`: Shutdown fired during a retry delay.
    pub async fn run_cycle(&self, trigger: Trigger, shutdown: &ShutdownSignal) -> Result<SyncReport> {
        info!("Starting {} config update...", trigger);
        self.emit_event(SyncEvent::CycleStarted { trigger });

        let result = self.sync(trigger, shutdown).await;

        match &result {
            Ok(report) => {
                info!(
                    "{} config update done: {} domains in {:?}",
                    trigger,
                    report.domains,
                    report.duration()
                );
                self.emit_event(SyncEvent::CycleCompleted {
                    trigger,
                    domains: report.domains,
                });
            }
            Err(e) => {
                self.emit_event(SyncEvent::CycleFailed {
                    trigger,
                    stage: e.stage(),
                    error: e.to_string(),
                });
            }
        }

        result
    }

    async fn sync(&self, trigger: Trigger, shutdown: &ShutdownSignal) -> Result<SyncReport> {
        let started_at = Utc::now();

        let fetched = self.fetch_with_retry(shutdown).await?;
        let (entries_fetched, domains) = fetched.value;
        info!("Got registry: {} entries", entries_fetched);
        self.emit_event(SyncEvent::Fetched {
            entries: entries_fetched,
            attempts: fetched.attempts,
        });

        info!("After deduplication: {} entries", domains.len());
        self.emit_event(SyncEvent::Normalized {
            domains: domains.len(),
        });

        let config = render(&domains, self.redirect);
        let write_attempts = self.write_with_retry(&config, shutdown).await?;
        debug!(
            "Wrote {} lines ({} bytes) to {}",
            config.line_count(),
            config.len(),
            self.writer.destination()
        );
        self.emit_event(SyncEvent::ConfigWritten {
            bytes: config.len(),
            attempts: write_attempts,
        });

        info!("Config written. Reloading resolver ({})", self.reloader.describe());
        let reload = match self.reloader.reload(shutdown).await {
            Ok(()) => {
                info!("Resolver reloaded");
                self.emit_event(SyncEvent::Reloaded);
                ReloadOutcome::Reloaded
            }
            Err(e) => {
                warn!("Could not reload resolver: {}", e);
                self.emit_event(SyncEvent::ReloadFailed {
                    error: e.to_string(),
                });
                ReloadOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        Ok(SyncReport {
            trigger,
            entries_fetched,
            domains: domains.len(),
            fetch_attempts: fetched.attempts,
            write_attempts,
            bytes_written: config.len(),
            reload,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Fetch and normalize the registry with retry logic
    ///
    /// Returns the number of entries fetched alongside the canonical set. A
    /// list that normalizes to nothing counts as an empty registry.
    async fn fetch_with_retry(
        &self,
        shutdown: &ShutdownSignal,
    ) -> Result<Retried<(usize, CanonicalDomainSet)>> {
        let retry_structural = self.retry.retry_structural;

        retry(
            &self.retry,
            shutdown,
            |e: &FetchError| retry_structural || !e.is_structural(),
            |attempt, e, retry_in| self.attempt_failed(Stage::Fetch, attempt, e, retry_in),
            |attempt| async move {
                debug!(
                    "Trying to download registry from {} (attempt {})...",
                    self.fetcher.endpoint(),
                    attempt
                );
                let list = self.fetcher.fetch().await?;
                let entries = list.len();
                // Never let an empty set through, whatever the fetcher does
                let domains = normalize(list);
                if domains.is_empty() {
                    return Err(FetchError::EmptyResult);
                }
                Ok((entries, domains))
            },
        )
        .await
        .map_err(|failure| match failure {
            RetryFailure::Exhausted { attempts, last: source }
            | RetryFailure::Rejected { attempts, error: source } => Error::Fetch { attempts, source },
            RetryFailure::Cancelled { attempts } => {
                warn!("Registry download abandoned after {} attempt(s): shutting down", attempts);
                Error::Cancelled
            }
        })
    }

    /// Write the rendered configuration with retry logic
    ///
    /// Returns the number of attempts made.
    async fn write_with_retry(&self, config: &RenderedConfig, shutdown: &ShutdownSignal) -> Result<u32> {
        retry(
            &self.retry,
            shutdown,
            |_: &WriteError| true,
            |attempt, e, retry_in| self.attempt_failed(Stage::Write, attempt, e, retry_in),
            |attempt| {
                debug!(
                    "Trying to write config to {} (attempt {})...",
                    self.writer.destination(),
                    attempt
                );
                self.writer.write(config)
            },
        )
        .await
        .map(|written| written.attempts)
        .map_err(|failure| match failure {
            RetryFailure::Exhausted { attempts, last: source }
            | RetryFailure::Rejected { attempts, error: source } => Error::Write { attempts, source },
            RetryFailure::Cancelled { attempts } => {
                warn!("Config write abandoned after {} attempt(s): shutting down", attempts);
                Error::Cancelled
            }
        })
    }

    /// Log and report a failed attempt of a retried stage
    fn attempt_failed(&self, stage: Stage, attempt: u32, error: &dyn Display, retry_in: Option<Duration>) {
        match retry_in {
            Some(delay) => warn!(
                "Could not {} (attempt {}): {}; retrying in {:?}",
                stage_action(stage),
                attempt,
                error,
                delay
            ),
            None => error!(
                "Could not {} (attempt {}): {}; giving up",
                stage_action(stage),
                attempt,
                error
            ),
        }

        self.emit_event(SyncEvent::AttemptFailed {
            stage,
            attempt,
            error: error.to_string(),
            retry_in,
        });
    }

    /// Emit a monitoring event
    fn emit_event(&self, event: SyncEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consume the event receiver or drop it.");
            }
            // Nobody is listening
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

fn stage_action(stage: Stage) -> &'static str {
    match stage {
        Stage::Fetch => "get registry",
        Stage::Write => "write config",
        Stage::Reload => "reload resolver",
    }
}
