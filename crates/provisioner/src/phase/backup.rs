//! Export of cluster resources to an archive on the host.

use super::{Phase, PhaseContext, PhaseKind, Step};
use crate::error::PhaseError;

/// Default backup directory on the host.
pub const BACKUP_DIR: &str = "/root/k8s-backup";

/// Dumps all resources, config maps and secrets, then archives them.
///
/// Not fatal: a failed backup is logged and the host still completes.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackupCreator;

impl Phase for BackupCreator {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Backup
    }

    fn is_fatal(&self) -> bool {
        false
    }

    fn steps(&self, _ctx: &PhaseContext) -> Result<Vec<Step>, PhaseError> {
        let dir = BACKUP_DIR;
        Ok(vec![
            Step::remote(format!("mkdir -p {dir}")),
            Step::remote(format!("kubectl get all -A -o yaml > {dir}/all-resources.yaml")),
            Step::remote(format!("kubectl get configmaps -A -o yaml > {dir}/configmaps.yaml")),
            Step::remote(format!("kubectl get secrets -A -o yaml > {dir}/secrets.yaml")),
            Step::remote(format!("tar -czf {dir}/k8s-backup.tar.gz {dir}")),
        ])
    }
}
