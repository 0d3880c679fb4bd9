// # sinkholed - DNS Sinkhole Daemon
//
// This daemon is a THIN integration layer only. Fetching, rendering,
// writing, reloading, retry and scheduling all live in sinkhole-core; this
// binary wires the concrete pieces together.
//
// The sinkholed daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the HTTP fetcher, file writer and command reloader
// 4. Running the sync orchestrator until SIGTERM/SIGINT
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Registry
// - `SINKHOLE_REGISTRY_ENDPOINT`: URL of the registry XML document
// - `SINKHOLE_HTTP_TIMEOUT_SECS`: Request timeout in seconds (default 30)
//
// ### Output
// - `SINKHOLE_OUTPUT`: Path of the Unbound include file (default /etc/unbound/rsh.conf)
// - `SINKHOLE_REDIRECT`: Address every listed domain resolves to
// - `SINKHOLE_RELOAD_COMMAND`: Command reloading the resolver (default `systemctl reload unbound`)
//
// ### Schedule
// - `SINKHOLE_SYNC_INTERVAL_SECS`: Seconds between cycles (default 21600)
// - `SINKHOLE_STARTUP_SYNC`: Run a cycle immediately at startup (default true)
//
// ### Retry
// - `SINKHOLE_RETRY_MAX_ELAPSED_SECS`: Give up a stage after this long (default 900, 0 = never)
// - `SINKHOLE_RETRY_MAX_ATTEMPTS`: Give up a stage after this many attempts (default unset)
// - `SINKHOLE_RETRY_STRUCTURAL`: Retry malformed or empty registries (default true)
//
// ## Example
//
// ```bash
// export SINKHOLE_OUTPUT=/etc/unbound/unbound.conf.d/sinkhole.conf
// export SINKHOLE_REDIRECT=192.0.2.1
// export SINKHOLE_LOG_LEVEL=debug
//
// sinkholed
// ```

use anyhow::{Context, Result};
use sinkhole_core::config::{DEFAULT_OUTPUT_PATH, DEFAULT_REGISTRY_ENDPOINT, DEFAULT_REDIRECT};
use sinkhole_core::{CommandReloader, FileConfigWriter, RetryPolicy, SyncConfig, SyncOrchestrator};
use sinkhole_registry_http::HttpRegistryFetcher;
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long a stopping orchestrator may take to finish its current cycle
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SinkholeExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SinkholeExitCode> for ExitCode {
    fn from(code: SinkholeExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    registry_endpoint: String,
    http_timeout_secs: u64,
    output: PathBuf,
    redirect: IpAddr,
    reload_command: Vec<String>,
    sync_interval_secs: u64,
    startup_sync: bool,
    retry_max_elapsed_secs: u64,
    retry_max_attempts: Option<u32>,
    retry_structural: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            registry_endpoint: lookup("SINKHOLE_REGISTRY_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_REGISTRY_ENDPOINT.to_string()),
            http_timeout_secs: parse_var(&lookup, "SINKHOLE_HTTP_TIMEOUT_SECS")?.unwrap_or(30),
            output: lookup("SINKHOLE_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            redirect: parse_var(&lookup, "SINKHOLE_REDIRECT")?.unwrap_or(DEFAULT_REDIRECT),
            reload_command: lookup("SINKHOLE_RELOAD_COMMAND")
                .unwrap_or_else(|| "systemctl reload unbound".to_string())
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            sync_interval_secs: parse_var(&lookup, "SINKHOLE_SYNC_INTERVAL_SECS")?
                .unwrap_or(6 * 60 * 60),
            startup_sync: parse_flag(&lookup, "SINKHOLE_STARTUP_SYNC")?.unwrap_or(true),
            retry_max_elapsed_secs: parse_var(&lookup, "SINKHOLE_RETRY_MAX_ELAPSED_SECS")?
                .unwrap_or(15 * 60),
            retry_max_attempts: parse_var(&lookup, "SINKHOLE_RETRY_MAX_ATTEMPTS")?,
            retry_structural: parse_flag(&lookup, "SINKHOLE_RETRY_STRUCTURAL")?.unwrap_or(true),
            log_level: lookup("SINKHOLE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks what the library cannot know about (log level, the output
    /// directory on this host) and then the library's own rules.
    fn validate(&self) -> Result<()> {
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "SINKHOLE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        if self.reload_command.is_empty() {
            anyhow::bail!(
                "SINKHOLE_RELOAD_COMMAND cannot be empty. \
                Set it via: export SINKHOLE_RELOAD_COMMAND='systemctl reload unbound'"
            );
        }

        if let Some(parent) = self.output.parent()
            && !parent.as_os_str().is_empty()
            && !parent.is_dir()
        {
            anyhow::bail!(
                "SINKHOLE_OUTPUT parent directory does not exist: {}. \
                Create it first: sudo mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        if self.registry_endpoint.starts_with("http://") {
            eprintln!(
                "WARNING: SINKHOLE_REGISTRY_ENDPOINT uses HTTP (not HTTPS). \
                The registry can be tampered with in transit."
            );
        }

        if self.redirect.is_unspecified() {
            eprintln!(
                "WARNING: SINKHOLE_REDIRECT is {}. Listed domains will not resolve to a landing page.",
                self.redirect
            );
        }

        self.sync_config().validate()?;
        Ok(())
    }

    /// Library configuration built from the environment
    fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::new();
        config.registry.endpoint = self.registry_endpoint.clone();
        config.registry.timeout_secs = self.http_timeout_secs;
        config.output.path = self.output.clone();
        config.redirect = self.redirect;
        config.reload.command = self.reload_command.clone();
        config.schedule.interval_secs = self.sync_interval_secs;
        config.schedule.startup_sync = self.startup_sync;
        config.retry = RetryPolicy {
            max_elapsed_secs: (self.retry_max_elapsed_secs > 0).then_some(self.retry_max_elapsed_secs),
            max_attempts: self.retry_max_attempts,
            retry_structural: self.retry_structural,
            ..RetryPolicy::default()
        };
        config
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Parse an optional variable, failing on values that do not parse
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("{} has an invalid value: '{}'", name, raw))
        })
        .transpose()
}

/// Parse an optional boolean variable (true/false, 1/0, yes/no, on/off)
fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<bool>> {
    lookup(name)
        .map(|raw| match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(anyhow::anyhow!(
                "{} must be true or false. Got: '{}'",
                name,
                raw
            )),
        })
        .transpose()
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SinkholeExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return SinkholeExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SinkholeExitCode::ConfigError.into();
    }

    info!("Starting sinkholed daemon");
    info!(
        "Configuration loaded: registry={}, output={}, redirect={}",
        config.registry_endpoint,
        config.output.display(),
        config.redirect
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SinkholeExitCode::RuntimeError.into();
        }
    };

    let orchestrator = match build_orchestrator(&config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return SinkholeExitCode::ConfigError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(orchestrator).await {
            error!("Daemon error: {:#}", e);
            SinkholeExitCode::RuntimeError
        } else {
            SinkholeExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Build the orchestrator from its concrete components
fn build_orchestrator(config: &Config) -> Result<SyncOrchestrator> {
    let sync_config = config.sync_config();

    let fetcher = HttpRegistryFetcher::from_config(&sync_config.registry)
        .context("Failed to create registry fetcher")?;
    let writer = FileConfigWriter::new(&sync_config.output.path);
    let reloader = CommandReloader::from_config(&sync_config.reload)
        .context("Failed to create resolver reloader")?;

    // Everything the events carry is also logged
    let (orchestrator, _events) = SyncOrchestrator::new(
        Box::new(fetcher),
        Box::new(writer),
        Box::new(reloader),
        sync_config,
    )?;

    Ok(orchestrator)
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(orchestrator: SyncOrchestrator) -> Result<()> {
    let (handle, mut join) = orchestrator.spawn();

    tokio::select! {
        received = wait_for_shutdown() => {
            info!("Received shutdown signal: {}", received?);
        }
        result = &mut join => {
            anyhow::bail!("Sync orchestrator stopped unexpectedly: {:?}", result);
        }
    }

    info!("Shutting down daemon");
    handle.trigger();

    match tokio::time::timeout(SHUTDOWN_GRACE, join).await {
        Ok(Ok(())) => {
            info!("Sync orchestrator stopped");
            Ok(())
        }
        Ok(Err(e)) => Err(anyhow::anyhow!("Sync orchestrator task failed: {}", e)),
        Err(_) => {
            warn!("Sync orchestrator did not stop within {:?}", SHUTDOWN_GRACE);
            Err(anyhow::anyhow!("Shutdown timeout after {:?}", SHUTDOWN_GRACE))
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
