//! Read-only host introspection before anything is installed.

use super::{Phase, PhaseContext, PhaseKind, Step};
use crate::error::PhaseError;

const DIAGNOSTICS: [&str; 5] = [
    "uname -a",
    "free -h",
    "df -h",
    "nproc",
    "cat /etc/os-release",
];

/// Collects kernel, memory, disk, CPU and OS information.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequirementCheck;

impl Phase for RequirementCheck {
    fn kind(&self) -> PhaseKind {
        PhaseKind::RequirementCheck
    }

    fn steps(&self, _ctx: &PhaseContext) -> Result<Vec<Step>, PhaseError> {
        Ok(DIAGNOSTICS.into_iter().map(Step::diagnostic).collect())
    }
}
