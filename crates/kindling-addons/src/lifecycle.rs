//! Add-on lifecycle contract
//!
//! Every add-on runs the same staged pipeline: prerequisites, installed
//! check, install, readiness wait, verify. The provided [`Addon::run`]
//! drives the stages and converts any stage failure into a terminal
//! [`InstallResult`] — it never returns an error, so one bad add-on
//! cannot abort a batch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::context::AddonContext;
use crate::error::Result;

/// Default readiness wait, overridable per add-on via options
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(120);

/// Terminal status of one add-on installation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddonStatus {
    NotStarted,
    PrerequisitesFailed,
    SkippedAlreadyInstalled,
    InstallFailed,
    ReadyTimeout,
    VerifyFailed,
    Succeeded,
}

/// What the install stage reports back to the pipeline
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
}

impl InstallOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.into()),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Final record of one add-on run, serializable for reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallResult {
    pub addon: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub skipped: bool,
    pub status: AddonStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock install duration in seconds, set only on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl InstallResult {
    pub fn succeeded(addon: &str, message: impl Into<String>, duration: f64) -> Self {
        Self {
            addon: addon.to_string(),
            success: true,
            skipped: false,
            status: AddonStatus::Succeeded,
            message: message.into(),
            error: None,
            duration: Some(duration),
        }
    }

    pub fn skipped(addon: &str, message: impl Into<String>) -> Self {
        Self {
            addon: addon.to_string(),
            success: true,
            skipped: true,
            status: AddonStatus::SkippedAlreadyInstalled,
            message: message.into(),
            error: None,
            duration: None,
        }
    }

    pub fn failure(
        addon: &str,
        status: AddonStatus,
        message: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            addon: addon.to_string(),
            success: false,
            skipped: false,
            status,
            message: message.into(),
            error: Some(error.into()),
            duration: None,
        }
    }
}

/// The lifecycle contract every add-on implements.
///
/// `check_prerequisites`, `is_installed`, and `install` are required;
/// `wait_for_ready` and `verify` default to trivially passing for
/// add-ons with nothing to wait on.
#[async_trait]
pub trait Addon: Send + Sync {
    fn name(&self) -> &str;

    fn context(&self) -> &AddonContext;

    /// Can this add-on install at all (binaries on PATH, cluster up)?
    async fn check_prerequisites(&self) -> Result<bool>;

    /// Is the add-on already present on the cluster?
    async fn is_installed(&self) -> Result<bool>;

    /// Perform the installation
    async fn install(&self) -> Result<InstallOutcome>;

    /// Block until the installed workload is serving
    async fn wait_for_ready(&self, _timeout: Duration) -> Result<bool> {
        Ok(true)
    }

    /// Post-install sanity check
    async fn verify(&self) -> Result<bool> {
        Ok(true)
    }

    /// Readiness wait budget, overridable via the `readyTimeout` option
    /// (seconds)
    fn ready_timeout(&self) -> Duration {
        self.context()
            .options
            .get("readyTimeout")
            .and_then(serde_json::Value::as_u64)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_READY_TIMEOUT)
    }

    /// Run the full staged pipeline. Always returns a result; stage
    /// errors become the failure status of that stage.
    async fn run(&self) -> InstallResult {
        let name = self.name();
        let cluster = &self.context().cluster_name;
        let start = Instant::now();

        tracing::info!("[{}] Starting installation for cluster '{}'", name, cluster);

        match self.check_prerequisites().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("[{}] Prerequisites not met", name);
                return InstallResult::failure(
                    name,
                    AddonStatus::PrerequisitesFailed,
                    format!("Prerequisites check failed for {}", name),
                    "Prerequisites not met",
                );
            }
            Err(e) => {
                tracing::warn!("[{}] Prerequisites check errored: {}", name, e);
                return InstallResult::failure(
                    name,
                    AddonStatus::PrerequisitesFailed,
                    format!("Prerequisites check failed for {}", name),
                    e.to_string(),
                );
            }
        }

        match self.is_installed().await {
            Ok(true) => {
                tracing::info!("[{}] Already installed, skipping", name);
                return InstallResult::skipped(name, format!("{} is already installed", name));
            }
            Ok(false) => {}
            Err(e) => {
                return InstallResult::failure(
                    name,
                    AddonStatus::InstallFailed,
                    format!("Failed to check whether {} is installed", name),
                    e.to_string(),
                );
            }
        }

        tracing::info!("[{}] Installing...", name);
        let outcome = match self.install().await {
            Ok(outcome) => outcome,
            Err(e) => InstallOutcome::failed(format!("Installation of {} failed", name), e.to_string()),
        };
        if !outcome.success {
            tracing::warn!("[{}] Install failed: {}", name, outcome.message);
            return InstallResult::failure(
                name,
                AddonStatus::InstallFailed,
                outcome.message,
                outcome.error.unwrap_or_else(|| "install failed".to_string()),
            );
        }

        let timeout = self.ready_timeout();
        tracing::info!("[{}] Waiting up to {}s for readiness", name, timeout.as_secs());
        match self.wait_for_ready(timeout).await {
            Ok(true) => {}
            Ok(false) => {
                return InstallResult::failure(
                    name,
                    AddonStatus::ReadyTimeout,
                    format!("{} did not become ready in time", name),
                    "Timeout waiting for addon to be ready",
                );
            }
            Err(e) => {
                return InstallResult::failure(
                    name,
                    AddonStatus::ReadyTimeout,
                    format!("{} did not become ready in time", name),
                    e.to_string(),
                );
            }
        }

        match self.verify().await {
            Ok(true) => {}
            Ok(false) => {
                return InstallResult::failure(
                    name,
                    AddonStatus::VerifyFailed,
                    format!("Verification failed for {}", name),
                    "Post-install verification failed",
                );
            }
            Err(e) => {
                return InstallResult::failure(
                    name,
                    AddonStatus::VerifyFailed,
                    format!("Verification failed for {}", name),
                    e.to_string(),
                );
            }
        }

        let duration = start.elapsed().as_secs_f64();
        tracing::info!("[{}] Installed successfully in {:.1}s", name, duration);
        InstallResult::succeeded(name, format!("{} installed successfully", name), duration)
    }
}
