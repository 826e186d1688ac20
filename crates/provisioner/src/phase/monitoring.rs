//! Prometheus and Grafana via the kube-prometheus-stack Helm chart.

use std::time::Duration;

use serde_json::json;

use super::{Phase, PhaseContext, PhaseKind, Step};
use crate::config::{GrafanaConfig, PrometheusConfig};
use crate::error::PhaseError;

/// File name of the rendered chart values, locally and on the host.
pub const VALUES_FILE: &str = "prometheus-values.yaml";

/// Namespace the chart is installed into.
pub const NAMESPACE: &str = "monitoring";

/// Bound on each workload readiness wait.
pub const READY_TIMEOUT: Duration = Duration::from_secs(300);

/// Workloads that must report ready before the phase succeeds.
const READY_LABELS: [&str; 2] = [
    "app.kubernetes.io/name=prometheus",
    "app.kubernetes.io/name=grafana",
];

/// Installs Helm and the monitoring chart, then sets the Grafana admin
/// password from a secret.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonitoringInstaller;

/// Render the chart values document.
///
/// # Errors
///
/// Returns [`PhaseError::Render`] if YAML serialization fails.
pub fn render_values(prometheus: &PrometheusConfig) -> Result<String, PhaseError> {
    let values = json!({
        "prometheus": {
            "prometheusSpec": {
                "retention": prometheus.retention_time,
                "storageSpec": {
                    "volumeClaimTemplate": {
                        "spec": {
                            "storageClassName": prometheus.storage_class,
                            "accessModes": ["ReadWriteOnce"],
                            "resources": {
                                "requests": { "storage": "10Gi" }
                            }
                        }
                    }
                }
            }
        }
    });

    serde_yaml::to_string(&values).map_err(|source| PhaseError::Render {
        name: VALUES_FILE.into(),
        source,
    })
}

fn grafana_steps(grafana: &GrafanaConfig) -> Vec<Step> {
    let secret = Step::remote_with_secret(&grafana.admin_password, |password| {
        format!(
            "kubectl create secret generic grafana-admin --from-literal=admin-password={password} -n {NAMESPACE}"
        )
    });

    let patch = Step::remote(format!(
        "kubectl patch deployment prometheus-grafana -n {NAMESPACE} --type=json -p='[{{\"op\": \"add\", \"path\": \"/spec/template/spec/containers/0/env/0\", \"value\": {{\"name\": \"GF_SECURITY_ADMIN_PASSWORD\", \"valueFrom\": {{\"secretKeyRef\": {{\"name\": \"grafana-admin\", \"key\": \"admin-password\"}}}}}}}}]'"
    ));

    vec![secret, patch]
}

impl Phase for MonitoringInstaller {
    fn kind(&self) -> PhaseKind {
        PhaseKind::MonitoringInstall
    }

    fn steps(&self, ctx: &PhaseContext) -> Result<Vec<Step>, PhaseError> {
        let monitoring = &ctx.config.monitoring;
        let values = render_values(&monitoring.prometheus)?;

        let mut steps = vec![
            Step::remote(format!("kubectl create namespace {NAMESPACE}")),
            Step::remote("curl https://raw.githubusercontent.com/helm/helm/master/scripts/get-helm-3 | bash"),
            Step::remote("helm repo add prometheus-community https://prometheus-community.github.io/helm-charts"),
            Step::remote("helm repo update"),
            Step::render_local(ctx.work_dir.join(VALUES_FILE), values.clone()),
            Step::upload(VALUES_FILE, values),
            Step::remote(format!(
                "helm install prometheus prometheus-community/kube-prometheus-stack -f {VALUES_FILE} --namespace {NAMESPACE}"
            )),
        ];

        steps.extend(grafana_steps(&monitoring.grafana));

        steps.extend(READY_LABELS.iter().map(|label| {
            Step::remote(format!(
                "kubectl wait --for=condition=ready pod -l {label} -n {NAMESPACE} --timeout={}s",
                READY_TIMEOUT.as_secs()
            ))
        }));

        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::phase::{shell_quote, StepAction, REDACTED};

    fn context(password: &str) -> PhaseContext {
        let config = serde_json::from_value(json!({
            "ssh": {"username": "root", "password": "x"},
            "kubernetes": {"version": "1.28.2-00", "podCIDR": "10.244.0.0/16", "serviceCIDR": "10.96.0.0/12"},
            "monitoring": {
                "prometheus": {"retentionTime": "30d", "storageClass": "fast-ssd"},
                "grafana": {"adminPassword": password}
            }
        }))
        .unwrap();
        PhaseContext::new(Arc::new(config), "/work")
    }

    #[test]
    fn test_values_carry_retention_and_storage_class() {
        let values = render_values(&PrometheusConfig {
            retention_time: "30d".into(),
            storage_class: "fast-ssd".into(),
        })
        .unwrap();

        let parsed: serde_yaml::Value = serde_yaml::from_str(&values).unwrap();
        let spec = &parsed["prometheus"]["prometheusSpec"];
        assert_eq!(spec["retention"].as_str(), Some("30d"));
        assert_eq!(
            spec["storageSpec"]["volumeClaimTemplate"]["spec"]["storageClassName"].as_str(),
            Some("fast-ssd")
        );
    }

    #[test]
    fn test_values_written_before_chart_install() {
        let steps = MonitoringInstaller.steps(&context("pw")).unwrap();

        let render = steps
            .iter()
            .position(|s| {
                matches!(&s.action, StepAction::RenderLocal { path, .. }
                    if path == &std::path::Path::new("/work").join(VALUES_FILE))
            })
            .unwrap();
        let install = steps
            .iter()
            .position(|s| s.label().starts_with("helm install"))
            .unwrap();
        assert!(render < install);
        assert!(steps[install].label().contains(VALUES_FILE));
    }

    #[test]
    fn test_waits_on_both_workloads_last() {
        let steps = MonitoringInstaller.steps(&context("pw")).unwrap();
        let tail: Vec<_> = steps.iter().rev().take(2).map(Step::label).collect();
        assert!(tail.iter().all(|l| l.starts_with("kubectl wait") && l.contains("--timeout=300s")));
        assert!(tail.iter().any(|l| l.contains("name=grafana")));
        assert!(tail.iter().any(|l| l.contains("name=prometheus")));
    }

    #[test]
    fn test_admin_password_redacted_in_labels() {
        let steps = MonitoringInstaller.steps(&context("t0p-s3cret")).unwrap();
        assert!(steps.iter().all(|s| !s.label().contains("t0p-s3cret")));

        let secret = steps
            .iter()
            .find(|s| s.label().contains("grafana-admin --from-literal"))
            .unwrap();
        match &secret.action {
            StepAction::Remote { command, .. } => {
                assert!(command.contains("admin-password='t0p-s3cret'"));
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_quoted_or_common_passwords_stay_hidden() {
        for password in ["pa'ss", "monitoring"] {
            let steps = MonitoringInstaller.steps(&context(password)).unwrap();
            let secret = steps
                .iter()
                .find(|s| s.label().contains("grafana-admin --from-literal"))
                .unwrap();

            assert_eq!(
                secret.label(),
                format!(
                    "kubectl create secret generic grafana-admin --from-literal=admin-password={REDACTED} -n monitoring"
                )
            );
            match &secret.action {
                StepAction::Remote { command, .. } => {
                    assert!(command.contains(&format!("admin-password={}", shell_quote(password))));
                }
                other => panic!("unexpected action {other:?}"),
            }
        }
    }
}
