//! Configuration types for the sinkhole synchronizer
//!
//! A [`SyncConfig`] is built once at startup and handed to the
//! [`SyncOrchestrator`](crate::SyncOrchestrator). There is no runtime
//! reconfiguration.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Registry endpoint used by the reference deployment
pub const DEFAULT_REGISTRY_ENDPOINT: &str = "https://www.hazard.mf.gov.pl/api/Register";

/// Output path used by the reference deployment
pub const DEFAULT_OUTPUT_PATH: &str = "/etc/unbound/rsh.conf";

/// Redirect address used by the reference deployment
pub const DEFAULT_REDIRECT: IpAddr = IpAddr::V4(Ipv4Addr::new(145, 237, 235, 240));

/// Longest accepted sync interval (30 days)
pub const MAX_INTERVAL_SECS: u64 = 30 * 24 * 60 * 60;

/// Longest accepted registry request timeout (1 hour)
pub const MAX_TIMEOUT_SECS: u64 = 60 * 60;

/// Longest accepted single retry delay (1 day)
pub const MAX_RETRY_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

/// Largest accepted backoff growth factor
pub const MAX_RETRY_MULTIPLIER: f64 = 10.0;

/// Main synchronizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Where the domain list comes from
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Where the rendered resolver configuration goes
    #[serde(default)]
    pub output: OutputConfig,

    /// Address every listed domain resolves to
    #[serde(default = "default_redirect")]
    pub redirect: IpAddr,

    /// How the resolver is told to pick up the new configuration
    #[serde(default)]
    pub reload: ReloadConfig,

    /// Periodic schedule
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Retry policy for the fetch and write stages
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl SyncConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            registry: RegistryConfig::default(),
            output: OutputConfig::default(),
            redirect: DEFAULT_REDIRECT,
            reload: ReloadConfig::default(),
            schedule: ScheduleConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.registry.validate()?;

        if self.output.path.as_os_str().is_empty() {
            return Err(crate::Error::config("Output path cannot be empty"));
        }

        if self.reload.command.is_empty() || self.reload.command[0].trim().is_empty() {
            return Err(crate::Error::config("Reload command cannot be empty"));
        }

        if self.schedule.interval_secs == 0 {
            return Err(crate::Error::config("Sync interval must be > 0"));
        }
        if self.schedule.interval_secs > MAX_INTERVAL_SECS {
            return Err(crate::Error::config(format!(
                "Sync interval must be <= {} seconds. Got: {}",
                MAX_INTERVAL_SECS, self.schedule.interval_secs
            )));
        }

        self.retry.validate()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// URL of the registry document
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Element names of the registry document
    #[serde(default)]
    pub schema: RegistrySchema,
}

impl RegistryConfig {
    /// Validate the registry configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.endpoint.is_empty() {
            return Err(crate::Error::config("Registry endpoint cannot be empty"));
        }
        if !self.endpoint.starts_with("https://") && !self.endpoint.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "Registry endpoint must use HTTP or HTTPS scheme. Got: {}",
                self.endpoint
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Registry timeout must be > 0"));
        }
        if self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(crate::Error::config(format!(
                "Registry timeout must be <= {} seconds. Got: {}",
                MAX_TIMEOUT_SECS, self.timeout_secs
            )));
        }
        self.schema.validate()
    }

    /// Request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            schema: RegistrySchema::default(),
        }
    }
}

/// Element names of the registry XML document
///
/// ```xml
/// <Rejestr>
///   <PozycjaRejestru>
///     <AdresDomeny>example.com</AdresDomeny>
///   </PozycjaRejestru>
/// </Rejestr>
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySchema {
    /// Root list-container element
    pub root: String,
    /// Element holding one registry entry
    pub entry: String,
    /// Field of an entry holding the domain name
    pub domain: String,
}

impl RegistrySchema {
    fn validate(&self) -> Result<(), crate::Error> {
        if self.root.is_empty() || self.entry.is_empty() || self.domain.is_empty() {
            return Err(crate::Error::config(
                "Registry schema element names cannot be empty",
            ));
        }
        Ok(())
    }
}

impl Default for RegistrySchema {
    fn default() -> Self {
        Self {
            root: "Rejestr".to_string(),
            entry: "PozycjaRejestru".to_string(),
            domain: "AdresDomeny".to_string(),
        }
    }
}

/// Output file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Path of the generated resolver configuration
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

/// Resolver reload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadConfig {
    /// Program and arguments to run
    #[serde(default = "default_reload_command")]
    pub command: Vec<String>,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            command: default_reload_command(),
        }
    }
}

/// Periodic schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Interval between periodic cycles (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Run one cycle immediately on startup
    #[serde(default = "default_startup_sync")]
    pub startup_sync: bool,
}

impl ScheduleConfig {
    /// Interval as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            startup_sync: default_startup_sync(),
        }
    }
}

/// Exponential backoff policy for the fetch and write stages
///
/// The delay before retry `n` is `initial_interval * multiplier^n`, capped at
/// `max_interval`, then spread by `randomization_factor` in both directions.
/// Retrying stops when either bound is reached; with both bounds unset the
/// stage is retried until it succeeds or the process shuts down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry (in milliseconds)
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    /// Growth factor applied after every retry
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound of a single delay (in milliseconds)
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Jitter, as a fraction of the delay (0.0 disables jitter)
    #[serde(default = "default_randomization_factor")]
    pub randomization_factor: f64,

    /// Give up once this much time has been spent on a stage (in seconds)
    ///
    /// `None` means no time bound.
    #[serde(default = "default_max_elapsed_secs")]
    pub max_elapsed_secs: Option<u64>,

    /// Give up after this many attempts in total (first attempt included)
    ///
    /// `None` means no attempt bound.
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Retry malformed or empty registry payloads like transport errors
    ///
    /// When false, a structural fetch error ends the cycle after one attempt.
    #[serde(default = "default_retry_structural")]
    pub retry_structural: bool,
}

impl RetryPolicy {
    /// Policy that retries forever
    pub fn unbounded() -> Self {
        Self {
            max_elapsed_secs: None,
            max_attempts: None,
            ..Self::default()
        }
    }

    /// Validate the retry policy
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.initial_interval_ms == 0 {
            return Err(crate::Error::config("Retry initial interval must be > 0"));
        }
        if !self.multiplier.is_finite()
            || !(1.0..=MAX_RETRY_MULTIPLIER).contains(&self.multiplier)
        {
            return Err(crate::Error::config(format!(
                "Retry multiplier must be between 1.0 and {}. Got: {}",
                MAX_RETRY_MULTIPLIER, self.multiplier
            )));
        }
        if self.max_interval_ms < self.initial_interval_ms {
            return Err(crate::Error::config(
                "Retry max interval must be >= initial interval",
            ));
        }
        if self.max_interval_ms > MAX_RETRY_INTERVAL_MS {
            return Err(crate::Error::config(format!(
                "Retry max interval must be <= {} ms. Got: {}",
                MAX_RETRY_INTERVAL_MS, self.max_interval_ms
            )));
        }
        if !(0.0..1.0).contains(&self.randomization_factor) {
            return Err(crate::Error::config(
                "Retry randomization factor must be in [0.0, 1.0)",
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(crate::Error::config("Retry max attempts must be > 0"));
        }
        Ok(())
    }

    /// Delay before the first retry
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    /// Upper bound of a single delay
    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    /// Time bound of a stage, if any
    pub fn max_elapsed(&self) -> Option<Duration> {
        self.max_elapsed_secs.map(Duration::from_secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            multiplier: default_multiplier(),
            max_interval_ms: default_max_interval_ms(),
            randomization_factor: default_randomization_factor(),
            max_elapsed_secs: default_max_elapsed_secs(),
            max_attempts: None,
            retry_structural: default_retry_structural(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_REGISTRY_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

fn default_redirect() -> IpAddr {
    DEFAULT_REDIRECT
}

fn default_reload_command() -> Vec<String> {
    ["systemctl", "reload", "unbound"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_interval_secs() -> u64 {
    6 * 60 * 60
}

fn default_startup_sync() -> bool {
    true
}

fn default_initial_interval_ms() -> u64 {
    500
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_max_interval_ms() -> u64 {
    60_000
}

fn default_randomization_factor() -> f64 {
    0.5
}

fn default_max_elapsed_secs() -> Option<u64> {
    Some(15 * 60)
}

fn default_retry_structural() -> bool {
    true
}
