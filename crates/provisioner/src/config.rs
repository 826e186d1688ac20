//! Provisioning configuration types.
//!
//! The configuration file is a JSON (or YAML) document shared by every host
//! in a run. [`HostTarget`] combines one host address with its SSH section.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const fn default_ssh_port() -> u16 {
    22
}

const fn default_connect_timeout() -> u64 {
    30
}

const fn default_command_timeout() -> u64 {
    1800
}

/// Full provisioning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionConfig {
    /// SSH credentials and timeouts.
    pub ssh: SshConfig,
    /// Kubernetes package and network parameters.
    pub kubernetes: KubernetesConfig,
    /// Monitoring stack parameters.
    pub monitoring: MonitoringConfig,
    /// Resource hints. Advisory only.
    #[serde(default)]
    pub resources: ResourceHints,
}

/// SSH connection settings applied to every host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshConfig {
    /// Remote user name.
    pub username: String,
    /// Password, used when no key file is configured.
    #[serde(default)]
    pub password: String,
    /// Private key file. Takes precedence over the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
    /// Connect, handshake and authentication timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub timeout: u64,
    /// SSH port.
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Per-command timeout in seconds (0 = unbounded).
    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,
}

/// Kubernetes installation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesConfig {
    /// Package version applied to kubelet, kubeadm and kubectl alike.
    pub version: String,
    /// Pod network CIDR passed to `kubeadm init`.
    #[serde(rename = "podCIDR")]
    pub pod_cidr: String,
    /// Service network CIDR passed to `kubeadm init`.
    #[serde(rename = "serviceCIDR")]
    pub service_cidr: String,
}

/// Monitoring stack parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub prometheus: PrometheusConfig,
    #[serde(default)]
    pub grafana: GrafanaConfig,
}

/// Prometheus chart values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusConfig {
    /// Retention duration (e.g. "15d").
    #[serde(default)]
    pub retention_time: String,
    /// Storage class for the Prometheus volume claim.
    #[serde(default)]
    pub storage_class: String,
}

/// Grafana settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaConfig {
    /// Admin password injected as a secret.
    #[serde(default)]
    pub admin_password: String,
    /// Public domain. Accepted but not used by any phase yet.
    #[serde(default)]
    pub domain: String,
}

/// Resource sizing hints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceHints {
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub memory: String,
}

impl ProvisionConfig {
    /// Load and validate a configuration file.
    ///
    /// Files with a `.yaml` or `.yml` extension are parsed as YAML,
    /// everything else as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        let config: Self = if is_yaml {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Check fields that would make every host fail the same way.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssh.username.trim().is_empty() {
            return Err(ConfigError::Invalid("ssh.username is empty".into()));
        }
        if self.ssh.password.is_empty() && self.ssh.key_file.is_none() {
            return Err(ConfigError::Invalid(
                "ssh requires either password or keyFile".into(),
            ));
        }
        if self.ssh.timeout == 0 {
            return Err(ConfigError::Invalid("ssh.timeout must be positive".into()));
        }
        if self.kubernetes.version.trim().is_empty() {
            return Err(ConfigError::Invalid("kubernetes.version is empty".into()));
        }
        if self.kubernetes.pod_cidr.trim().is_empty() {
            return Err(ConfigError::Invalid("kubernetes.podCIDR is empty".into()));
        }
        if self.kubernetes.service_cidr.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "kubernetes.serviceCIDR is empty".into(),
            ));
        }
        Ok(())
    }
}

/// How to authenticate against a host.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Password authentication.
    Password(String),
    /// Public key authentication with a private key file.
    KeyFile(PathBuf),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(********)"),
            Self::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
        }
    }
}

/// One remote machine to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTarget {
    /// Host address as given on the command line.
    pub address: String,
    /// SSH port.
    pub port: u16,
    /// Remote user name.
    pub username: String,
    /// Authentication material.
    pub credentials: Credentials,
    /// Bound on connect, handshake and authentication.
    pub connect_timeout: Duration,
    /// Bound on each remote command, `None` for unbounded.
    pub command_timeout: Option<Duration>,
}

impl HostTarget {
    /// Build a target for `address` from the shared SSH settings.
    #[must_use]
    pub fn new(address: impl Into<String>, ssh: &SshConfig) -> Self {
        let credentials = match &ssh.key_file {
            Some(path) => Credentials::KeyFile(path.clone()),
            None => Credentials::Password(ssh.password.clone()),
        };

        Self {
            address: address.into(),
            port: ssh.port,
            username: ssh.username.clone(),
            credentials,
            connect_timeout: Duration::from_secs(ssh.timeout),
            command_timeout: (ssh.command_timeout > 0)
                .then(|| Duration::from_secs(ssh.command_timeout)),
        }
    }
}

impl std::fmt::Display for HostTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "ssh": {"username": "root", "password": "secret", "timeout": 10},
        "kubernetes": {"version": "1.28.2-00", "podCIDR": "10.244.0.0/16", "serviceCIDR": "10.96.0.0/12"},
        "monitoring": {
            "prometheus": {"retentionTime": "15d", "storageClass": "standard"},
            "grafana": {"adminPassword": "admin", "domain": "grafana.example.com"}
        },
        "resources": {"cpu": "2", "memory": "4Gi"}
    }"#;

    #[test]
    fn test_parse_full_document() {
        let config: ProvisionConfig = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.ssh.username, "root");
        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.ssh.command_timeout, 1800);
        assert_eq!(config.kubernetes.pod_cidr, "10.244.0.0/16");
        assert_eq!(config.monitoring.prometheus.retention_time, "15d");
        assert_eq!(config.monitoring.grafana.domain, "grafana.example.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ProvisionConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ProvisionConfig::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let value: serde_json::Value = serde_json::from_str(SAMPLE).unwrap();
        std::fs::write(&path, serde_yaml::to_string(&value).unwrap()).unwrap();

        let config = ProvisionConfig::load(&path).unwrap();
        assert_eq!(config.kubernetes.version, "1.28.2-00");
    }

    #[test]
    fn test_validate_requires_credentials() {
        let mut config: ProvisionConfig = serde_json::from_str(SAMPLE).unwrap();
        config.ssh.password.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.ssh.key_file = Some(PathBuf::from("/root/.ssh/id_ed25519"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_host_target_prefers_key_file() {
        let mut config: ProvisionConfig = serde_json::from_str(SAMPLE).unwrap();
        let target = HostTarget::new("10.0.0.5", &config.ssh);
        assert_eq!(target.credentials, Credentials::Password("secret".into()));
        assert_eq!(target.connect_timeout, Duration::from_secs(10));

        config.ssh.key_file = Some(PathBuf::from("/keys/id_rsa"));
        config.ssh.command_timeout = 0;
        let target = HostTarget::new("10.0.0.5", &config.ssh);
        assert_eq!(target.credentials, Credentials::KeyFile("/keys/id_rsa".into()));
        assert_eq!(target.command_timeout, None);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let rendered = format!("{:?}", Credentials::Password("hunter2".into()));
        assert!(!rendered.contains("hunter2"));
    }
}
