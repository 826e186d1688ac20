//! Per-host provisioning state machine.
//!
//! Drives one host from connection through every pipeline phase:
//! - Connection failure fails the host before any phase runs
//! - A fatal phase failure fails the host and skips the remaining phases
//! - A non-fatal phase failure is logged and the host still completes
//!
//! The status record is saved after every transition. Save failures are
//! logged and never change the outcome.

use tracing::{error, info, warn};

use crate::config::HostTarget;
use crate::executor::{RemoteExecutor, RemoteSession};
use crate::phase::{PhaseContext, PhaseKind, PhaseReport, Pipeline};
use crate::status::{HostState, StatusRecord};
use crate::store::StatusStore;
use crate::ui;

/// Runs the pipeline for a single host and owns its status record.
pub struct HostOrchestrator<'a> {
    target: HostTarget,
    executor: &'a dyn RemoteExecutor,
    store: &'a dyn StatusStore,
    pipeline: &'a Pipeline,
    ctx: &'a PhaseContext,
    record: StatusRecord,
}

impl<'a> HostOrchestrator<'a> {
    /// Create an orchestrator with a fresh status record for `target`.
    #[must_use]
    pub fn new(
        target: HostTarget,
        executor: &'a dyn RemoteExecutor,
        store: &'a dyn StatusStore,
        pipeline: &'a Pipeline,
        ctx: &'a PhaseContext,
    ) -> Self {
        let record = StatusRecord::new(target.address.clone());
        Self {
            target,
            executor,
            store,
            pipeline,
            ctx,
            record,
        }
    }

    /// Run the host to a terminal state and return the final record.
    ///
    /// The session, once opened, is closed on every path out of the
    /// pipeline.
    pub async fn run(mut self) -> StatusRecord {
        info!(host = %self.target, "Starting setup");
        self.persist();

        let session = match self.executor.connect(&self.target).await {
            Ok(session) => session,
            Err(e) => {
                error!(host = %self.target, error = %e, "SSH connection failed");
                ui::print_error(&format!("{}: SSH connection failed: {e}", self.target));
                self.record.fail(format!("SSH connection failed: {e}"));
                self.persist();
                return self.record;
            }
        };

        self.run_pipeline(session.as_ref()).await;
        session.close().await;

        match self.record.state {
            HostState::Completed => {
                info!(host = %self.target, "Setup completed successfully");
                ui::print_success(&format!("{}: setup completed successfully", self.target));
            }
            HostState::Failed => {
                ui::print_error(&format!("{}: {}", self.target, self.record.error));
            }
            HostState::InProgress => {}
        }

        self.record
    }

    async fn run_pipeline(&mut self, session: &dyn RemoteSession) {
        let pipeline = self.pipeline;
        let ctx = self.ctx;

        let total = pipeline.len();

        for (index, phase) in pipeline.phases().enumerate() {
            let kind = phase.kind();
            self.record.begin_phase(kind);
            self.persist();
            ui::print_phase(&self.target.address, kind, index, total);

            match phase.run(session, ctx).await {
                Ok(report) => {
                    self.audit(kind, &report);
                    self.record.complete_phase(kind);
                    self.persist();
                }
                Err(e) if phase.is_fatal() => {
                    error!(host = %self.target, phase = %kind, error = %e, "Phase failed");
                    self.record.fail(format!("{} failed: {e}", kind.description()));
                    self.persist();
                    return;
                }
                Err(e) => {
                    warn!(host = %self.target, phase = %kind, error = %e, "Non-fatal phase failed");
                    ui::print_warning(&format!(
                        "{}: {} failed, continuing: {e}",
                        self.target,
                        kind.description()
                    ));
                }
            }
        }

        self.record.complete();
        self.persist();
    }

    fn audit(&self, phase: PhaseKind, report: &PhaseReport) {
        for transcript in &report.transcripts {
            info!(
                target: "provisioner::audit",
                host = %self.target,
                phase = %phase,
                command = %transcript.command,
                "{}",
                transcript.output
            );
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.record) {
            warn!(host = %self.target, error = %e, "Failed to save status");
        }
    }
}
