//! NGINX Ingress Controller add-on
//!
//! Installs ingress-nginx from its upstream helm chart, configured for
//! kind: the controller binds host ports 80/443 on the control-plane
//! node (which the requirements below expose to the host) and schedules
//! onto the node labeled `ingress-ready=true`.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use kindling_core::{AddonRequirements, PortMapping, Protocol};

use crate::context::AddonContext;
use crate::error::Result;
use crate::exec::{HELM_TIMEOUT, PROBE_TIMEOUT};
use crate::lifecycle::{Addon, InstallOutcome};

const CHART_VERSION: &str = "4.13.2";
const NAMESPACE: &str = "kube-system";
const HELM_REPO_NAME: &str = "ingress-nginx";
const HELM_REPO_URL: &str = "https://kubernetes.github.io/ingress-nginx";
const HELM_CHART: &str = "ingress-nginx/ingress-nginx";
const RELEASE_NAME: &str = "ingress-nginx";
const DEPLOYMENT_NAME: &str = "ingress-nginx-controller";

pub struct IngressNginxAddon {
    context: AddonContext,
    chart_version: String,
    namespace: String,
}

impl IngressNginxAddon {
    pub fn new(context: AddonContext) -> Self {
        let chart_version = context
            .opt_str("chart_version")
            .unwrap_or(CHART_VERSION)
            .to_string();
        let namespace = context
            .opt_str("namespace")
            .unwrap_or(NAMESPACE)
            .to_string();
        Self {
            context,
            chart_version,
            namespace,
        }
    }

    /// Pre-creation cluster requirements: http/https host ports on the
    /// control-plane node, plus the scheduling label the chart's
    /// nodeSelector targets.
    pub fn requirements() -> AddonRequirements {
        AddonRequirements {
            port_mappings: vec![
                PortMapping::new(80, 80, Protocol::Tcp),
                PortMapping::new(443, 443, Protocol::Tcp),
            ],
            node_labels: [("ingress-ready".to_string(), "true".to_string())].into(),
            ..Default::default()
        }
    }

    /// Chart values for running on kind, overridable per key via the
    /// `values` option
    fn helm_values(&self) -> BTreeMap<String, String> {
        let mut values: BTreeMap<String, String> = [
            ("controller.service.type", "NodePort"),
            ("controller.hostPort.enabled", "true"),
            ("controller.hostPort.ports.http", "80"),
            ("controller.hostPort.ports.https", "443"),
            ("controller.updateStrategy.type", "RollingUpdate"),
            ("controller.updateStrategy.rollingUpdate.maxUnavailable", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        if let Some(overrides) = self.context.opt_object("values") {
            for (key, value) in overrides {
                let rendered = match value.as_str() {
                    Some(s) => s.to_string(),
                    None => value.to_string(),
                };
                values.insert(key.clone(), rendered);
            }
        }
        values
    }
}

#[async_trait]
impl Addon for IngressNginxAddon {
    fn name(&self) -> &str {
        "ingress-nginx"
    }

    fn context(&self) -> &AddonContext {
        &self.context
    }

    async fn check_prerequisites(&self) -> Result<bool> {
        let cluster_info = match self
            .context
            .run_kubectl(&["cluster-info"], PROBE_TIMEOUT)
            .await
        {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("[ingress-nginx] kubectl unavailable: {}", e);
                return Ok(false);
            }
        };
        if !cluster_info.success() {
            tracing::warn!(
                "[ingress-nginx] cluster not reachable: {}",
                cluster_info.error_text()
            );
            return Ok(false);
        }

        match self.context.run_helm(&["version"], PROBE_TIMEOUT, false).await {
            Ok(output) => Ok(output.success()),
            Err(e) => {
                tracing::warn!("[ingress-nginx] helm unavailable: {}", e);
                Ok(false)
            }
        }
    }

    async fn is_installed(&self) -> Result<bool> {
        let listed = self
            .context
            .run_helm(&["list", "-n", &self.namespace, "-q"], HELM_TIMEOUT, false)
            .await?;
        if listed.success() {
            let found = listed
                .stdout
                .lines()
                .any(|line| line.trim() == RELEASE_NAME);
            if found {
                return Ok(true);
            }
        }

        // The controller may have been applied with manifests rather
        // than helm; the deployment is the source of truth.
        let deployment = self
            .context
            .run_kubectl(
                &["get", "deployment", DEPLOYMENT_NAME, "-n", &self.namespace],
                HELM_TIMEOUT,
            )
            .await?;
        Ok(deployment.success())
    }

    async fn install(&self) -> Result<InstallOutcome> {
        self.context.add_helm_repo(HELM_REPO_NAME, HELM_REPO_URL).await?;

        self.context
            .helm_upgrade_install(
                RELEASE_NAME,
                HELM_CHART,
                &self.namespace,
                &self.helm_values(),
                Some(&self.chart_version),
            )
            .await?;

        Ok(InstallOutcome::ok(format!(
            "NGINX Ingress Controller installed (version {})",
            self.chart_version
        )))
    }

    async fn wait_for_ready(&self, timeout: Duration) -> Result<bool> {
        let timeout_arg = format!("--timeout={}s", timeout.as_secs());
        let deployment_arg = format!("deployment/{}", DEPLOYMENT_NAME);

        // Give kubectl itself a little slack past its own deadline
        let output = self
            .context
            .run_kubectl(
                &[
                    "wait",
                    "--namespace",
                    &self.namespace,
                    "--for=condition=available",
                    &deployment_arg,
                    &timeout_arg,
                ],
                timeout + Duration::from_secs(10),
            )
            .await;

        match output {
            Ok(output) => Ok(output.success()),
            Err(e) => {
                tracing::warn!("[ingress-nginx] readiness wait failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn verify(&self) -> Result<bool> {
        let output = self
            .context
            .run_kubectl(
                &["get", "validatingwebhookconfigurations", "-o", "name"],
                HELM_TIMEOUT,
            )
            .await?;
        Ok(output.success() && output.stdout.contains("ingress-nginx-admission"))
    }
}
