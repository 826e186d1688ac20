//! Fleet driver.
//!
//! Runs one [`HostOrchestrator`] per host. Hosts share nothing mutable
//! except the status store, which is keyed per host, so a failure on one
//! host never affects another.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::config::HostTarget;
use crate::error::PersistenceError;
use crate::executor::RemoteExecutor;
use crate::orchestrator::HostOrchestrator;
use crate::phase::{PhaseContext, Pipeline};
use crate::status::{HostState, StatusRecord};
use crate::store::StatusStore;

/// Final records of a fleet run, in host argument order.
#[derive(Debug, Clone, Default)]
pub struct FleetReport {
    pub records: Vec<StatusRecord>,
}

impl FleetReport {
    /// Number of hosts that completed.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.count(HostState::Completed)
    }

    /// Number of hosts that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(HostState::Failed)
    }

    /// Whether any host failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Record for `host`, if it was part of the run.
    #[must_use]
    pub fn record(&self, host: &str) -> Option<&StatusRecord> {
        self.records.iter().find(|r| r.host == host)
    }

    fn count(&self, state: HostState) -> usize {
        self.records.iter().filter(|r| r.state == state).count()
    }
}

/// Provisions a list of hosts independently.
pub struct FleetDriver {
    executor: Arc<dyn RemoteExecutor>,
    store: Arc<dyn StatusStore>,
    pipeline: Arc<Pipeline>,
    ctx: PhaseContext,
    concurrency: usize,
}

impl FleetDriver {
    /// A sequential driver running the standard pipeline.
    #[must_use]
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        store: Arc<dyn StatusStore>,
        ctx: PhaseContext,
    ) -> Self {
        Self {
            executor,
            store,
            pipeline: Arc::new(Pipeline::standard()),
            ctx,
            concurrency: 1,
        }
    }

    /// Replace the phase pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: Arc<Pipeline>) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Provision up to `limit` hosts at once (minimum 1).
    #[must_use]
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Provision every host and collect the final records.
    ///
    /// Duplicate addresses are provisioned once.
    pub async fn run(&self, hosts: &[String]) -> FleetReport {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(hosts.len());
        for host in hosts {
            if seen.insert(host.as_str()) {
                unique.push(host.clone());
            } else {
                warn!(%host, "Duplicate host argument ignored");
            }
        }

        info!(
            hosts = unique.len(),
            concurrency = self.concurrency,
            "Provisioning fleet"
        );

        let records = stream::iter(unique)
            .map(|host| self.provision(host))
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        FleetReport { records }
    }

    async fn provision(&self, address: String) -> StatusRecord {
        self.check_previous_run(&address);

        let target = HostTarget::new(address, &self.ctx.config.ssh);
        HostOrchestrator::new(
            target,
            self.executor.as_ref(),
            self.store.as_ref(),
            &self.pipeline,
            &self.ctx,
        )
        .run()
        .await
    }

    fn check_previous_run(&self, host: &str) {
        match self.store.load(host) {
            Ok(previous) if previous.state == HostState::Completed => {
                info!(%host, "Host was provisioned before, running again");
            }
            Ok(previous) => {
                warn!(
                    %host,
                    state = %previous.state,
                    phase = %previous.current_phase,
                    "Previous run did not complete; re-running is not guaranteed to be safe"
                );
            }
            Err(PersistenceError::NotFound(_)) => {}
            Err(e) => warn!(%host, error = %e, "Could not read previous status"),
        }
    }
}
