//! Error types for the sinkhole synchronizer
//!
//! Each fallible stage of a sync cycle has its own error type. The crate-level
//! [`Error`] wraps them together with the retry context the orchestrator adds.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sinkhole operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stage of a sync cycle, used to identify where a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Downloading and parsing the registry
    Fetch,
    /// Persisting the rendered configuration
    Write,
    /// Reloading the resolver
    Reload,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Write => "write",
            Stage::Reload => "reload",
        };
        f.write_str(name)
    }
}

/// Errors reported by a [`RegistryFetcher`](crate::traits::RegistryFetcher)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The registry could not be reached
    #[error("while connecting to registry: {0}")]
    Transport(String),

    /// The registry answered with a non-success status
    #[error("registry answered with HTTP status {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// The response body could not be read
    #[error("while downloading registry: {0}")]
    ReadFailure(String),

    /// The payload is not a well-formed registry document
    #[error("while parsing registry: {0}")]
    ParseFailure(String),

    /// The registry parsed but contained no entries
    #[error("zero results in registry")]
    EmptyResult,
}

impl FetchError {
    /// Whether the error describes a broken payload rather than a broken
    /// connection
    pub fn is_structural(&self) -> bool {
        matches!(self, FetchError::ParseFailure(_) | FetchError::EmptyResult)
    }
}

/// Errors reported by a [`ConfigWriter`](crate::traits::ConfigWriter)
#[derive(Error, Debug)]
pub enum WriteError {
    /// The process may not write the output (or its temporary file)
    #[error("permission denied writing {}: {source}", .path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure
    #[error("I/O error writing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WriteError {
    /// Classify an I/O error for the given path
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            WriteError::Permission { path, source }
        } else {
            WriteError::Io { path, source }
        }
    }
}

/// Errors reported by a [`ResolverReloader`](crate::traits::ResolverReloader)
#[derive(Error, Debug)]
pub enum ReloadError {
    /// The reload command could not be started
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The reload command exited unsuccessfully
    #[error("`{command}` failed ({}){}", exit_description(.code), stderr_suffix(.stderr))]
    ProcessFailure {
        command: String,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// The reload was interrupted by shutdown
    #[error("reload canceled by shutdown")]
    Canceled,
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

/// Core error type for the sinkhole synchronizer
#[derive(Error, Debug)]
pub enum Error {
    /// Fetching the registry failed and the retry policy gave up
    #[error("fetch failed after {attempts} attempt(s): {source}")]
    Fetch {
        attempts: u32,
        #[source]
        source: FetchError,
    },

    /// Writing the configuration failed and the retry policy gave up
    #[error("write failed after {attempts} attempt(s): {source}")]
    Write {
        attempts: u32,
        #[source]
        source: WriteError,
    },

    /// Reloading the resolver failed
    #[error("reload failed: {0}")]
    Reload(#[from] ReloadError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The cycle was interrupted by shutdown
    #[error("sync cycle cancelled by shutdown")]
    Cancelled,
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The cycle stage this error belongs to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Fetch { .. } => Some(Stage::Fetch),
            Error::Write { .. } => Some(Stage::Write),
            Error::Reload(_) => Some(Stage::Reload),
            Error::Config(_) | Error::Cancelled => None,
        }
    }
}
