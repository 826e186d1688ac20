//! Provisioning phases.
//!
//! A phase is a stateless descriptor: a [`PhaseKind`], a fatal flag and an
//! ordered list of [`Step`]s built from configuration. [`StepRunner`] runs
//! the steps and stops at the first failure, so individual phases never
//! implement their own abort logic.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProvisionConfig;
use crate::error::PhaseError;
use crate::executor::{CommandOutcome, RemoteSession};

mod backup;
mod cluster;
mod monitoring;
mod requirements;
mod verify;

pub use backup::BackupCreator;
pub use cluster::ClusterInstaller;
pub use monitoring::MonitoringInstaller;
pub use requirements::RequirementCheck;
pub use verify::Verifier;

/// Placeholder for secret values in logged or persisted command text.
pub const REDACTED: &str = "********";

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhaseKind {
    RequirementCheck,
    ClusterInstall,
    MonitoringInstall,
    Verify,
    Backup,
}

impl PhaseKind {
    /// Every phase, in pipeline order.
    pub const ALL: [Self; 5] = [
        Self::RequirementCheck,
        Self::ClusterInstall,
        Self::MonitoringInstall,
        Self::Verify,
        Self::Backup,
    ];

    /// Name used in status records and log fields.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::RequirementCheck => "RequirementCheck",
            Self::ClusterInstall => "ClusterInstall",
            Self::MonitoringInstall => "MonitoringInstall",
            Self::Verify => "Verify",
            Self::Backup => "Backup",
        }
    }

    /// Human-readable description for console output and error messages.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::RequirementCheck => "System requirements check",
            Self::ClusterInstall => "Kubernetes setup",
            Self::MonitoringInstall => "Monitoring setup",
            Self::Verify => "Verification",
            Self::Backup => "Backup creation",
        }
    }

    /// Zero-based position in the pipeline.
    #[must_use]
    pub fn position(self) -> usize {
        match self {
            Self::RequirementCheck => 0,
            Self::ClusterInstall => 1,
            Self::MonitoringInstall => 2,
            Self::Verify => 3,
            Self::Backup => 4,
        }
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a step does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Run a command through the remote shell.
    Remote {
        command: String,
        /// Text shown in logs and errors in place of `command`.
        display: String,
    },
    /// Write a document to the local filesystem.
    RenderLocal { path: PathBuf, contents: String },
    /// Copy a document to the remote host.
    Upload { remote_path: String, contents: String },
}

/// One unit inside a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub action: StepAction,
    /// Keep the command output in the phase report.
    pub capture: bool,
}

impl Step {
    /// A remote command whose output is not kept.
    #[must_use]
    pub fn remote(command: impl Into<String>) -> Self {
        let command = command.into();
        Self {
            action: StepAction::Remote {
                display: command.clone(),
                command,
            },
            capture: false,
        }
    }

    /// A read-only remote command whose output is kept for audit.
    #[must_use]
    pub fn diagnostic(command: impl Into<String>) -> Self {
        Self {
            capture: true,
            ..Self::remote(command)
        }
    }

    /// Write `contents` to a local file.
    #[must_use]
    pub fn render_local(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            action: StepAction::RenderLocal {
                path: path.into(),
                contents: contents.into(),
            },
            capture: false,
        }
    }

    /// Copy `contents` to `remote_path` on the host.
    #[must_use]
    pub fn upload(remote_path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            action: StepAction::Upload {
                remote_path: remote_path.into(),
                contents: contents.into(),
            },
            capture: false,
        }
    }

    /// A remote command carrying `secret` as one shell argument.
    ///
    /// `build` is called twice: with the quoted secret for the executed
    /// command and with [`REDACTED`] for the displayed text.
    #[must_use]
    pub fn remote_with_secret(secret: &str, build: impl Fn(&str) -> String) -> Self {
        Self {
            action: StepAction::Remote {
                command: build(&shell_quote(secret)),
                display: build(REDACTED),
            },
            capture: false,
        }
    }

    /// Text identifying this step in logs and errors.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.action {
            StepAction::Remote { display, .. } => display.clone(),
            StepAction::RenderLocal { path, .. } => format!("render {}", path.display()),
            StepAction::Upload { remote_path, .. } => format!("upload {remote_path}"),
        }
    }
}

/// Quote `value` for a POSIX shell.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Output of one captured command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTranscript {
    /// Displayed command text.
    pub command: String,
    /// Combined output.
    pub output: String,
}

/// What a successful phase produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseReport {
    /// Output of every step marked for capture, in order.
    pub transcripts: Vec<CommandTranscript>,
    /// Number of steps executed.
    pub steps_run: usize,
}

/// Read-only inputs shared by every phase of a run.
#[derive(Debug, Clone)]
pub struct PhaseContext {
    /// Provisioning configuration.
    pub config: Arc<ProvisionConfig>,
    /// Directory for transient rendered documents.
    pub work_dir: PathBuf,
}

impl PhaseContext {
    #[must_use]
    pub fn new(config: Arc<ProvisionConfig>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            work_dir: work_dir.into(),
        }
    }
}

/// Runs steps in order against one session, stopping at the first failure.
pub struct StepRunner<'a> {
    session: &'a dyn RemoteSession,
    settle_delay: Duration,
}

impl<'a> StepRunner<'a> {
    #[must_use]
    pub fn new(session: &'a dyn RemoteSession) -> Self {
        Self {
            session,
            settle_delay: Duration::ZERO,
        }
    }

    /// Pause after every remote command except the last.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Execute `steps`.
    ///
    /// # Errors
    ///
    /// Returns the [`PhaseError`] of the first failing step; later steps are
    /// not attempted.
    pub async fn run(&self, steps: &[Step]) -> Result<PhaseReport, PhaseError> {
        let mut report = PhaseReport::default();

        for (index, step) in steps.iter().enumerate() {
            debug!(step = %step.label(), "Running step");

            match &step.action {
                StepAction::Remote { command, display } => {
                    let result = self.session.execute(command).await;
                    if let CommandOutcome::Failure(reason) = result.outcome {
                        return Err(PhaseError::Command {
                            command: display.clone(),
                            reason,
                            output: result.output,
                        });
                    }
                    if step.capture {
                        report.transcripts.push(CommandTranscript {
                            command: display.clone(),
                            output: result.output,
                        });
                    }
                    if !self.settle_delay.is_zero() && index + 1 < steps.len() {
                        tokio::time::sleep(self.settle_delay).await;
                    }
                }
                StepAction::RenderLocal { path, contents } => {
                    tokio::fs::write(path, contents)
                        .await
                        .map_err(|source| PhaseError::LocalFile {
                            path: path.clone(),
                            source,
                        })?;
                }
                StepAction::Upload {
                    remote_path,
                    contents,
                } => {
                    self.session
                        .upload(remote_path, contents.as_bytes())
                        .await
                        .map_err(|reason| PhaseError::Upload {
                            path: remote_path.clone(),
                            reason,
                        })?;
                }
            }

            report.steps_run += 1;
        }

        Ok(report)
    }
}

/// A named stage of the pipeline.
#[async_trait]
pub trait Phase: Send + Sync {
    /// Which stage this is.
    fn kind(&self) -> PhaseKind;

    /// Whether a failure stops the host. Auxiliary phases return `false`.
    fn is_fatal(&self) -> bool {
        true
    }

    /// Pause between remote commands.
    fn settle_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Build the ordered step list from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PhaseError::Render`] if a document cannot be rendered.
    fn steps(&self, ctx: &PhaseContext) -> Result<Vec<Step>, PhaseError>;

    /// Run the phase against an open session.
    ///
    /// # Errors
    ///
    /// Returns the first step failure.
    async fn run(
        &self,
        session: &dyn RemoteSession,
        ctx: &PhaseContext,
    ) -> Result<PhaseReport, PhaseError> {
        let steps = self.steps(ctx)?;
        StepRunner::new(session)
            .with_settle_delay(self.settle_delay())
            .run(&steps)
            .await
    }
}

/// Ordered list of phases driven for every host.
pub struct Pipeline {
    phases: Vec<Box<dyn Phase>>,
}

impl Pipeline {
    /// A pipeline running `phases` in the given order.
    #[must_use]
    pub fn new(phases: Vec<Box<dyn Phase>>) -> Self {
        Self { phases }
    }

    /// The five standard phases.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(RequirementCheck),
            Box::new(ClusterInstaller::default()),
            Box::new(MonitoringInstaller),
            Box::new(Verifier),
            Box::new(BackupCreator),
        ])
    }

    /// Phases in execution order.
    pub fn phases(&self) -> impl Iterator<Item = &dyn Phase> {
        self.phases.iter().map(|phase| &**phase)
    }

    /// Number of phases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Whether the pipeline has no phases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Phases whose success is required for a host to complete.
    #[must_use]
    pub fn mandatory(&self) -> Vec<PhaseKind> {
        self.phases()
            .filter(|phase| phase.is_fatal())
            .map(|phase| phase.kind())
            .collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}
