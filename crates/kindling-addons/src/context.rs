//! Shared execution context handed to each add-on
//!
//! Carries the target cluster identity, per-add-on options, and the
//! command runner, plus helm/kubectl helpers so individual add-ons
//! never build command lines from scratch.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AddonError, Result};
use crate::exec::{
    CommandOutput, CommandRequest, CommandRunner, HELM_TIMEOUT, INSTALL_TIMEOUT, ProcessRunner,
};

/// Free-form per-add-on options (chart version, helm values, ...)
pub type AddonOptions = serde_json::Map<String, JsonValue>;

/// Everything an add-on needs to act on a cluster
#[derive(Clone)]
pub struct AddonContext {
    pub cluster_name: String,
    pub kubeconfig_path: String,
    pub options: AddonOptions,
    runner: Arc<dyn CommandRunner>,
}

impl AddonContext {
    pub fn new(cluster_name: impl Into<String>, kubeconfig_path: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            kubeconfig_path: kubeconfig_path.into(),
            options: AddonOptions::new(),
            runner: Arc::new(ProcessRunner),
        }
    }

    pub fn with_options(mut self, options: AddonOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    /// String option by key, when present and a string
    pub fn opt_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(JsonValue::as_str)
    }

    /// Object option by key, when present and an object
    pub fn opt_object(&self, key: &str) -> Option<&AddonOptions> {
        self.options.get(key).and_then(JsonValue::as_object)
    }

    /// Run helm against this cluster's kubeconfig.
    ///
    /// With `check` set, a non-zero exit becomes an error carrying the
    /// command's own error text.
    pub async fn run_helm(
        &self,
        args: &[&str],
        timeout: Duration,
        check: bool,
    ) -> Result<CommandOutput> {
        let request = CommandRequest::new("helm")
            .args(args.iter().copied())
            .env("KUBECONFIG", &self.kubeconfig_path)
            .timeout(timeout);
        let output = self.runner.run(&request).await?;

        if check && !output.success() {
            return Err(AddonError::Helm(output.error_text().to_string()));
        }
        Ok(output)
    }

    /// Run kubectl against this cluster's kubeconfig, never checked
    pub async fn run_kubectl(&self, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
        let request = CommandRequest::new("kubectl")
            .args(args.iter().copied())
            .env("KUBECONFIG", &self.kubeconfig_path)
            .timeout(timeout);
        self.runner.run(&request).await
    }

    /// Register a chart repository and refresh the index.
    ///
    /// Both steps tolerate failure: the repo may already exist, and a
    /// stale index still lets a cached chart install.
    pub async fn add_helm_repo(&self, name: &str, url: &str) -> Result<()> {
        let add = self
            .run_helm(&["repo", "add", name, url], HELM_TIMEOUT, false)
            .await?;
        if !add.success() {
            tracing::debug!("helm repo add '{}' returned: {}", name, add.error_text());
        }

        let update = self.run_helm(&["repo", "update"], HELM_TIMEOUT, false).await?;
        if !update.success() {
            tracing::warn!("helm repo update failed: {}", update.error_text());
        }
        Ok(())
    }

    /// Idempotent chart installation via `helm upgrade --install`
    pub async fn helm_upgrade_install(
        &self,
        release: &str,
        chart: &str,
        namespace: &str,
        values: &BTreeMap<String, String>,
        version: Option<&str>,
    ) -> Result<CommandOutput> {
        let mut args: Vec<String> = vec![
            "upgrade".to_string(),
            "--install".to_string(),
            release.to_string(),
            chart.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--create-namespace".to_string(),
        ];
        if let Some(version) = version {
            args.push("--version".to_string());
            args.push(version.to_string());
        }
        for (key, value) in values {
            args.push("--set".to_string());
            args.push(format!("{}={}", key, value));
        }

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_helm(&arg_refs, INSTALL_TIMEOUT, true).await
    }
}
