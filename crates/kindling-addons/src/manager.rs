//! Batch add-on installation
//!
//! The manager validates and deduplicates requested add-on names, runs
//! each add-on's lifecycle pipeline sequentially, and aggregates the
//! per-add-on results into one report. A failing or panicking add-on
//! never stops the batch.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use kindling_core::AddonRequirements;

use crate::context::{AddonContext, AddonOptions};
use crate::exec::{CommandRunner, ProcessRunner};
use crate::lifecycle::{AddonStatus, InstallResult};
use crate::registry::AddonRegistry;

/// Aggregated outcome of one batch installation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallReport {
    /// True when no requested add-on failed
    pub success: bool,
    /// Per-add-on results, keyed by the name the caller used
    pub results: IndexMap<String, InstallResult>,
    /// Names that failed, in request order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
    pub message: String,
    pub completed_at: DateTime<Utc>,
}

/// Installs add-ons onto one cluster
pub struct AddonManager {
    cluster_name: String,
    kubeconfig_path: String,
    registry: AddonRegistry,
    runner: Arc<dyn CommandRunner>,
}

impl AddonManager {
    pub fn new(cluster_name: impl Into<String>, kubeconfig_path: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            kubeconfig_path: kubeconfig_path.into(),
            registry: AddonRegistry::builtin(),
            runner: Arc::new(ProcessRunner),
        }
    }

    pub fn with_registry(mut self, registry: AddonRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Pre-creation requirements for the named add-ons, for merging
    /// into the cluster descriptor before `kind create cluster`
    pub fn collect_requirements(&self, addon_names: &[String]) -> Vec<AddonRequirements> {
        self.registry.requirements_for(addon_names)
    }

    /// Install the named add-ons in order.
    ///
    /// Invalid names fail individually without blocking valid ones;
    /// aliases of the same add-on install once, under the first name
    /// used. Optional per-add-on options are keyed by canonical name.
    pub async fn install_addons(
        &self,
        addon_names: &[String],
        configs: Option<&HashMap<String, AddonOptions>>,
    ) -> InstallReport {
        if addon_names.is_empty() {
            return InstallReport {
                success: true,
                results: IndexMap::new(),
                failed: Vec::new(),
                message: "No addons specified".to_string(),
                completed_at: Utc::now(),
            };
        }

        let mut results: IndexMap<String, InstallResult> = IndexMap::new();
        let mut failed: Vec<String> = Vec::new();

        // Validate and dedup up front so the report covers every
        // requested name even when nothing gets installed.
        let mut unique: Vec<(String, Arc<crate::registry::AddonDescriptor>)> = Vec::new();
        for raw in addon_names {
            match self.registry.resolve(raw) {
                Ok(descriptor) => {
                    if !unique.iter().any(|(_, d)| d.name() == descriptor.name()) {
                        unique.push((raw.clone(), Arc::clone(descriptor)));
                    }
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    failed.push(raw.clone());
                    results.insert(
                        raw.clone(),
                        InstallResult::failure(
                            raw,
                            AddonStatus::NotStarted,
                            format!("Invalid addon name: {}", raw),
                            e.to_string(),
                        ),
                    );
                }
            }
        }

        tracing::info!(
            "Installing {} addon(s) on cluster '{}'",
            unique.len(),
            self.cluster_name
        );

        for (requested_name, descriptor) in &unique {
            let options = configs
                .and_then(|c| c.get(descriptor.name()))
                .cloned()
                .unwrap_or_default();
            let context = AddonContext::new(&self.cluster_name, &self.kubeconfig_path)
                .with_options(options)
                .with_runner(Arc::clone(&self.runner));

            let addon = descriptor.build(context);
            let result = match AssertUnwindSafe(addon.run()).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let msg = panic_message(panic.as_ref());
                    tracing::error!("[{}] panicked: {}", descriptor.name(), msg);
                    InstallResult::failure(
                        descriptor.name(),
                        AddonStatus::InstallFailed,
                        format!("Unexpected error: {}", msg),
                        msg,
                    )
                }
            };

            if !result.success {
                tracing::warn!(
                    "[{}] failed ({:?}), continuing with remaining addons",
                    descriptor.name(),
                    result.status
                );
                failed.push(requested_name.clone());
            }
            results.insert(requested_name.clone(), result);
        }

        let total = unique.len();
        // Already-installed add-ons count as succeeded; the skipped
        // count is broken out separately in the message.
        let succeeded = results.values().filter(|r| r.success).count();
        let skipped = results.values().filter(|r| r.skipped).count();

        let mut message = format!("Addons: {}/{} succeeded", succeeded, total);
        if skipped > 0 {
            message.push_str(&format!(", {} already installed", skipped));
        }
        if !failed.is_empty() {
            message.push_str(&format!(", {} failed: {}", failed.len(), failed.join(", ")));
        }
        tracing::info!("{}", message);

        InstallReport {
            success: failed.is_empty(),
            results,
            failed,
            message,
            completed_at: Utc::now(),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::lifecycle::{Addon, InstallOutcome};
    use crate::registry::AddonDescriptor;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Minimal always-succeeding add-on counting install calls
    struct StubAddon {
        name: &'static str,
        context: AddonContext,
        installs: Arc<AtomicUsize>,
        behavior: StubBehavior,
    }

    #[derive(Clone, Copy)]
    enum StubBehavior {
        Succeed,
        AlreadyInstalled,
        Fail,
        Panic,
    }

    #[async_trait]
    impl Addon for StubAddon {
        fn name(&self) -> &str {
            self.name
        }

        fn context(&self) -> &AddonContext {
            &self.context
        }

        async fn check_prerequisites(&self) -> Result<bool> {
            Ok(true)
        }

        async fn is_installed(&self) -> Result<bool> {
            Ok(matches!(self.behavior, StubBehavior::AlreadyInstalled))
        }

        async fn install(&self) -> Result<InstallOutcome> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                StubBehavior::Panic => panic!("stub exploded"),
                StubBehavior::Fail => Ok(InstallOutcome::failed("stub failed", "boom")),
                _ => Ok(InstallOutcome::ok("stub installed")),
            }
        }
    }

    fn stub_registry(
        name: &'static str,
        aliases: &[&str],
        behavior: StubBehavior,
        installs: &Arc<AtomicUsize>,
    ) -> AddonRegistry {
        let mut registry = AddonRegistry::new();
        let installs = Arc::clone(installs);
        registry.register(
            aliases,
            AddonDescriptor::new(name, AddonRequirements::default, move |ctx| {
                Box::new(StubAddon {
                    name,
                    context: ctx,
                    installs: Arc::clone(&installs),
                    behavior,
                })
            }),
        );
        registry
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn manager_with(registry: AddonRegistry) -> AddonManager {
        AddonManager::new("dev", "/tmp/kubeconfig").with_registry(registry)
    }

    #[tokio::test]
    async fn test_empty_request_succeeds_trivially() {
        let manager = manager_with(AddonRegistry::new());
        let report = manager.install_addons(&[], None).await;

        assert!(report.success);
        assert!(report.results.is_empty());
        assert_eq!(report.message, "No addons specified");
    }

    #[tokio::test]
    async fn test_invalid_name_fails_that_entry_only() {
        let installs = Arc::new(AtomicUsize::new(0));
        let registry = stub_registry("stub", &["stub"], StubBehavior::Succeed, &installs);
        let manager = manager_with(registry);

        let report = manager
            .install_addons(&names(&["stub", "bogus"]), None)
            .await;

        assert!(!report.success);
        assert_eq!(report.failed, vec!["bogus"]);
        assert!(report.results["stub"].success);

        let bad = &report.results["bogus"];
        assert_eq!(bad.status, AddonStatus::NotStarted);
        assert_eq!(bad.message, "Invalid addon name: bogus");
        assert_eq!(installs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_aliases_install_once_under_first_name() {
        let installs = Arc::new(AtomicUsize::new(0));
        let registry = stub_registry(
            "stub",
            &["stub", "stub-alias"],
            StubBehavior::Succeed,
            &installs,
        );
        let manager = manager_with(registry);

        let report = manager
            .install_addons(&names(&["stub-alias", "stub"]), None)
            .await;

        assert!(report.success);
        assert_eq!(installs.load(Ordering::SeqCst), 1);
        assert_eq!(report.results.len(), 1);
        assert!(report.results.contains_key("stub-alias"));
        assert_eq!(report.message, "Addons: 1/1 succeeded");
    }

    #[tokio::test]
    async fn test_panic_is_isolated_from_siblings() {
        let panics = Arc::new(AtomicUsize::new(0));
        let oks = Arc::new(AtomicUsize::new(0));

        let mut registry = stub_registry("boomer", &["boomer"], StubBehavior::Panic, &panics);
        let ok_installs = Arc::clone(&oks);
        registry.register(
            &["steady"],
            AddonDescriptor::new("steady", AddonRequirements::default, move |ctx| {
                Box::new(StubAddon {
                    name: "steady",
                    context: ctx,
                    installs: Arc::clone(&ok_installs),
                    behavior: StubBehavior::Succeed,
                })
            }),
        );
        let manager = manager_with(registry);

        let report = manager
            .install_addons(&names(&["boomer", "steady"]), None)
            .await;

        assert!(!report.success);
        assert_eq!(report.failed, vec!["boomer"]);
        assert!(report.results["steady"].success);

        let boom = &report.results["boomer"];
        assert_eq!(boom.status, AddonStatus::InstallFailed);
        assert!(boom.message.contains("Unexpected error: stub exploded"));
        assert_eq!(oks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_skipped_counted_in_message() {
        let installs = Arc::new(AtomicUsize::new(0));
        let registry = stub_registry("stub", &["stub"], StubBehavior::AlreadyInstalled, &installs);
        let manager = manager_with(registry);

        let report = manager.install_addons(&names(&["stub"]), None).await;

        assert!(report.success);
        assert_eq!(report.message, "Addons: 1/1 succeeded, 1 already installed");
        assert_eq!(installs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_names_listed_in_message() {
        let installs = Arc::new(AtomicUsize::new(0));
        let registry = stub_registry("stub", &["stub"], StubBehavior::Fail, &installs);
        let manager = manager_with(registry);

        let report = manager.install_addons(&names(&["stub"]), None).await;

        assert!(!report.success);
        assert_eq!(report.message, "Addons: 0/1 succeeded, 1 failed: stub");
    }

    #[tokio::test]
    async fn test_options_reach_the_addon_by_canonical_name() {
        let installs = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(std::sync::Mutex::new(None::<Option<String>>));

        let mut registry = AddonRegistry::new();
        let seen_in = Arc::clone(&seen);
        let installs_in = Arc::clone(&installs);
        registry.register(
            &["stub", "alias"],
            AddonDescriptor::new("stub", AddonRequirements::default, move |ctx| {
                *seen_in.lock().unwrap() =
                    Some(ctx.opt_str("chart_version").map(str::to_string));
                Box::new(StubAddon {
                    name: "stub",
                    context: ctx,
                    installs: Arc::clone(&installs_in),
                    behavior: StubBehavior::Succeed,
                })
            }),
        );
        let manager = manager_with(registry);

        let mut options = AddonOptions::new();
        options.insert("chart_version".to_string(), "9.9.9".into());
        let configs: HashMap<String, AddonOptions> = [("stub".to_string(), options)].into();

        // Requested via alias; options are keyed by the canonical name
        let report = manager
            .install_addons(&names(&["alias"]), Some(&configs))
            .await;

        assert!(report.success);
        assert_eq!(
            seen.lock().unwrap().clone(),
            Some(Some("9.9.9".to_string()))
        );
    }

    #[tokio::test]
    async fn test_collect_requirements_delegates_to_registry() {
        let manager = AddonManager::new("dev", "/tmp/kubeconfig");
        let records = manager.collect_requirements(&names(&["ingress", "nginx"]));
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_report_serializes() {
        let report = InstallReport {
            success: true,
            results: IndexMap::new(),
            failed: Vec::new(),
            message: "Addons: 0/0 succeeded".to_string(),
            completed_at: Utc::now(),
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("failed").is_none());
        assert!(json.get("completed_at").is_some());
    }
}
