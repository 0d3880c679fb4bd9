// # Command Reloader
//
// Reloads the resolver by running an external command, by default
// `systemctl reload unbound`. Success is a zero exit status.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use crate::config::ReloadConfig;
use crate::error::ReloadError;
use crate::shutdown::ShutdownSignal;
use crate::traits::ResolverReloader;

/// Resolver reloader that runs an external command
#[derive(Debug, Clone)]
pub struct CommandReloader {
    program: String,
    args: Vec<String>,
}

impl CommandReloader {
    /// Create a reloader running `program` with `args`
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Create a reloader from configuration
    pub fn from_config(config: &ReloadConfig) -> Result<Self, crate::Error> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| crate::Error::config("Reload command cannot be empty"))?;
        Ok(Self::new(program.clone(), args.to_vec()))
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl ResolverReloader for CommandReloader {
    async fn reload(&self, shutdown: &ShutdownSignal) -> Result<(), ReloadError> {
        if shutdown.is_triggered() {
            return Err(ReloadError::Canceled);
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ReloadError::Spawn {
                command: self.command_line(),
                source,
            })?;

        // Dropping the wait future on shutdown drops the child, which kills it
        let output = tokio::select! {
            output = child.wait_with_output() => output,
            _ = shutdown.triggered() => {
                tracing::warn!("Shutdown requested, aborting `{}`", self.command_line());
                return Err(ReloadError::Canceled);
            }
        };

        let output = output.map_err(|source| ReloadError::Spawn {
            command: self.command_line(),
            source,
        })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ReloadError::ProcessFailure {
                command: self.command_line(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn describe(&self) -> String {
        self.command_line()
    }
}
