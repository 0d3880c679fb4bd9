//! Cycle outcomes and monitoring events

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::Stage;

/// What started a sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The immediate cycle run before the periodic loop
    Startup,
    /// A tick of the periodic schedule
    Periodic,
    /// A direct call to [`SyncOrchestrator::run_cycle`](super::SyncOrchestrator::run_cycle)
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Trigger::Startup => "startup",
            Trigger::Periodic => "periodic",
            Trigger::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Result of the reload stage
///
/// A failed reload does not fail the cycle: the configuration is already
/// written and stays in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    Reloaded,
    Failed { error: String },
}

impl ReloadOutcome {
    pub fn is_reloaded(&self) -> bool {
        matches!(self, ReloadOutcome::Reloaded)
    }
}

/// Summary of a completed sync cycle
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub trigger: Trigger,
    /// Entries returned by the registry, duplicates included
    pub entries_fetched: usize,
    /// Unique domains written
    pub domains: usize,
    /// Fetch attempts, the successful one included
    pub fetch_attempts: u32,
    /// Write attempts, the successful one included
    pub write_attempts: u32,
    pub bytes_written: usize,
    pub reload: ReloadOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    /// Wall-clock duration of the cycle
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Events emitted by the [`SyncOrchestrator`](super::SyncOrchestrator)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Orchestrator started
    Started { interval: Duration },

    /// Cycle started
    CycleStarted { trigger: Trigger },

    /// One attempt of a retried stage failed
    AttemptFailed {
        stage: Stage,
        attempt: u32,
        error: String,
        /// Delay before the next attempt, `None` when giving up
        retry_in: Option<Duration>,
    },

    /// Registry fetched
    Fetched { entries: usize, attempts: u32 },

    /// Entries deduplicated and sorted
    Normalized { domains: usize },

    /// Configuration persisted
    ConfigWritten { bytes: usize, attempts: u32 },

    /// Resolver reloaded
    Reloaded,

    /// Resolver reload failed (cycle continues)
    ReloadFailed { error: String },

    /// Cycle finished with the configuration written
    CycleCompleted { trigger: Trigger, domains: usize },

    /// Cycle abandoned before the configuration was written
    CycleFailed {
        trigger: Trigger,
        stage: Option<Stage>,
        error: String,
    },

    /// Orchestrator stopped
    Stopped { reason: String },
}
