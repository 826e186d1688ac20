//! Cluster introspection after installation.

use super::{Phase, PhaseContext, PhaseKind, Step};
use crate::error::PhaseError;

const CHECKS: [&str; 4] = [
    "kubectl get nodes",
    "kubectl get pods -A",
    "kubectl get services -A",
    "kubectl get deployments -A",
];

/// Lists nodes, pods, services and deployments; any error fails the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct Verifier;

impl Phase for Verifier {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Verify
    }

    fn steps(&self, _ctx: &PhaseContext) -> Result<Vec<Step>, PhaseError> {
        Ok(CHECKS.into_iter().map(Step::diagnostic).collect())
    }
}
