//! Remote command execution.
//!
//! The orchestrator only sees these traits. [`ssh::SshExecutor`] is the
//! production implementation; tests substitute scripted sessions.

use async_trait::async_trait;

use crate::config::HostTarget;
use crate::error::ConnectionError;

pub mod ssh;

pub use ssh::SshExecutor;

/// Result of a single remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command exited with status zero.
    Success,
    /// The command failed, with a short reason (exit status, transport error).
    Failure(String),
}

/// Captured output plus outcome of a remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Combined stdout and stderr.
    pub output: String,
    /// Whether the command succeeded.
    pub outcome: CommandOutcome,
}

impl CommandOutput {
    /// A successful command with the given output.
    #[must_use]
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            outcome: CommandOutcome::Success,
        }
    }

    /// A failed command with the given output and reason.
    #[must_use]
    pub fn failure(output: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            outcome: CommandOutcome::Failure(reason.into()),
        }
    }
}

/// Opens sessions to hosts.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Establish a session with `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the host cannot be reached or rejects
    /// the credentials.
    async fn connect(&self, target: &HostTarget) -> Result<Box<dyn RemoteSession>, ConnectionError>;
}

/// An open session to one host. Serves every phase of that host's run.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Run `command` through the remote shell and capture its output.
    ///
    /// Transport problems are reported as [`CommandOutcome::Failure`].
    async fn execute(&self, command: &str) -> CommandOutput;

    /// Copy `contents` to `remote_path` on the host.
    ///
    /// # Errors
    ///
    /// Returns a description of the transfer failure.
    async fn upload(&self, remote_path: &str, contents: &[u8]) -> Result<(), String>;

    /// Release the session.
    async fn close(self: Box<Self>);
}
