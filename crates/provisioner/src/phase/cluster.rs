//! Container runtime, Kubernetes packages and cluster initialisation.
//!
//! The commands are not idempotent and must run in order. Package manager
//! and service state need a moment to settle between them.

use std::time::Duration;

use super::{Phase, PhaseContext, PhaseKind, Step};
use crate::config::KubernetesConfig;
use crate::error::PhaseError;

/// Default pause between installation commands.
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

const DOCKER_DAEMON_CONFIG: &str = r#"cat > /etc/docker/daemon.json << EOF
{
  "exec-opts": ["native.cgroupdriver=systemd"],
  "log-driver": "json-file",
  "log-opts": {
    "max-size": "100m"
  },
  "storage-driver": "overlay2"
}
EOF"#;

/// Installs Docker and kubeadm, initialises a single-node control plane and
/// applies the Calico network plugin.
#[derive(Debug, Clone)]
pub struct ClusterInstaller {
    settle_delay: Duration,
}

impl Default for ClusterInstaller {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY,
        }
    }
}

impl ClusterInstaller {
    /// Override the pause between commands.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    fn commands(kubernetes: &KubernetesConfig) -> Vec<String> {
        let version = &kubernetes.version;

        vec![
            // System packages
            "apt-get update && apt-get upgrade -y".into(),
            "apt-get install -y apt-transport-https ca-certificates curl software-properties-common"
                .into(),
            // Docker
            "curl -fsSL https://download.docker.com/linux/ubuntu/gpg | apt-key add -".into(),
            "add-apt-repository \"deb [arch=amd64] https://download.docker.com/linux/ubuntu $(lsb_release -cs) stable\""
                .into(),
            "apt-get update && apt-get install -y docker-ce docker-ce-cli containerd.io".into(),
            "mkdir -p /etc/docker".into(),
            DOCKER_DAEMON_CONFIG.into(),
            "systemctl daemon-reload".into(),
            "systemctl restart docker".into(),
            // Kubernetes packages
            "curl -s https://packages.cloud.google.com/apt/doc/apt-key.gpg | apt-key add -".into(),
            "echo \"deb https://apt.kubernetes.io/ kubernetes-xenial main\" > /etc/apt/sources.list.d/kubernetes.list"
                .into(),
            format!(
                "apt-get update && apt-get install -y kubelet={version} kubeadm={version} kubectl={version}"
            ),
            // Control plane
            format!(
                "kubeadm init --pod-network-cidr={} --service-cidr={}",
                kubernetes.pod_cidr, kubernetes.service_cidr
            ),
            "mkdir -p $HOME/.kube && cp -i /etc/kubernetes/admin.conf $HOME/.kube/config && chown $(id -u):$(id -g) $HOME/.kube/config"
                .into(),
            // CNI
            "kubectl apply -f https://docs.projectcalico.org/manifests/calico.yaml".into(),
        ]
    }
}

impl Phase for ClusterInstaller {
    fn kind(&self) -> PhaseKind {
        PhaseKind::ClusterInstall
    }

    fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    fn steps(&self, ctx: &PhaseContext) -> Result<Vec<Step>, PhaseError> {
        Ok(Self::commands(&ctx.config.kubernetes)
            .into_iter()
            .map(Step::remote)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kubernetes() -> KubernetesConfig {
        KubernetesConfig {
            version: "1.28.2-00".into(),
            pod_cidr: "10.244.0.0/16".into(),
            service_cidr: "10.96.0.0/12".into(),
        }
    }

    #[test]
    fn test_version_pinned_for_all_components() {
        let commands = ClusterInstaller::commands(&kubernetes());
        let install = commands
            .iter()
            .find(|c| c.contains("kubeadm="))
            .unwrap();
        assert!(install.contains("kubelet=1.28.2-00"));
        assert!(install.contains("kubeadm=1.28.2-00"));
        assert!(install.contains("kubectl=1.28.2-00"));
    }

    #[test]
    fn test_init_before_cni() {
        let commands = ClusterInstaller::commands(&kubernetes());
        let init = commands
            .iter()
            .position(|c| c.starts_with("kubeadm init"))
            .unwrap();
        let cni = commands.iter().position(|c| c.contains("calico")).unwrap();
        assert!(init < cni);
        assert!(commands[init].contains("--pod-network-cidr=10.244.0.0/16"));
        assert!(commands[init].contains("--service-cidr=10.96.0.0/12"));
    }

    #[test]
    fn test_default_settle_delay() {
        assert_eq!(ClusterInstaller::default().settle_delay(), SETTLE_DELAY);
        let fast = ClusterInstaller::default().with_settle_delay(Duration::ZERO);
        assert!(fast.settle_delay().is_zero());
    }
}
