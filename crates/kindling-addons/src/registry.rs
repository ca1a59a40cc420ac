//! Add-on registry and name resolution
//!
//! Maps user-facing names and aliases to add-on descriptors. The
//! registry is a plain value handed to the manager, so tests register
//! their own descriptors without touching global state.

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use kindling_core::AddonRequirements;

use crate::context::AddonContext;
use crate::error::{AddonError, Result};
use crate::ingress_nginx::IngressNginxAddon;
use crate::lifecycle::Addon;

type RequirementsFn = Box<dyn Fn() -> AddonRequirements + Send + Sync>;
type BuildFn = Box<dyn Fn(AddonContext) -> Box<dyn Addon> + Send + Sync>;

/// Everything the manager needs to know about one add-on kind
pub struct AddonDescriptor {
    name: String,
    requirements_fn: RequirementsFn,
    build_fn: BuildFn,
}

impl AddonDescriptor {
    pub fn new(
        name: impl Into<String>,
        requirements_fn: impl Fn() -> AddonRequirements + Send + Sync + 'static,
        build_fn: impl Fn(AddonContext) -> Box<dyn Addon> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            requirements_fn: Box::new(requirements_fn),
            build_fn: Box::new(build_fn),
        }
    }

    /// Canonical add-on name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pre-creation requirements this add-on declares
    pub fn requirements(&self) -> AddonRequirements {
        (self.requirements_fn)()
    }

    /// Instantiate the add-on for a cluster
    pub fn build(&self, context: AddonContext) -> Box<dyn Addon> {
        (self.build_fn)(context)
    }
}

impl fmt::Debug for AddonDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddonDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Name/alias table of installable add-ons, in registration order
pub struct AddonRegistry {
    entries: IndexMap<String, Arc<AddonDescriptor>>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl AddonRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Registry pre-loaded with the built-in add-ons
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            &["ingress", "ingress-nginx", "nginx"],
            AddonDescriptor::new(
                "ingress-nginx",
                IngressNginxAddon::requirements,
                |ctx| Box::new(IngressNginxAddon::new(ctx)),
            ),
        );
        registry
    }

    /// Register a descriptor under one or more aliases
    pub fn register(&mut self, aliases: &[&str], descriptor: AddonDescriptor) {
        let descriptor = Arc::new(descriptor);
        for alias in aliases {
            self.entries
                .insert(normalize(alias), Arc::clone(&descriptor));
        }
    }

    /// All registered aliases, sorted, for error messages
    pub fn available(&self) -> String {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names.join(", ")
    }

    /// Resolve a user-facing name to its descriptor
    pub fn resolve(&self, name: &str) -> Result<&Arc<AddonDescriptor>> {
        self.entries
            .get(&normalize(name))
            .ok_or_else(|| AddonError::UnknownAddon {
                name: name.to_string(),
                available: self.available(),
            })
    }

    /// Collect requirements for the named add-ons.
    ///
    /// Tolerant by design: unknown names are logged and skipped, aliases
    /// of the same add-on are deduplicated, and empty records are
    /// dropped. The caller gets one record per distinct add-on, in
    /// first-mention order.
    pub fn requirements_for(&self, names: &[String]) -> Vec<AddonRequirements> {
        let mut seen: Vec<String> = Vec::new();
        let mut records = Vec::new();

        for name in names {
            let descriptor = match self.resolve(name) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Skipping requirements for '{}': {}", name, e);
                    continue;
                }
            };
            if seen.iter().any(|s| s == descriptor.name()) {
                continue;
            }
            seen.push(descriptor.name().to_string());

            let requirements = descriptor.requirements();
            if !requirements.is_empty() {
                records.push(requirements);
            }
        }

        records
    }
}

impl Default for AddonRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_aliases_resolve_to_same_descriptor() {
        let registry = AddonRegistry::builtin();

        let a = registry.resolve("ingress").unwrap();
        let b = registry.resolve("ingress-nginx").unwrap();
        let c = registry.resolve("nginx").unwrap();

        assert_eq!(a.name(), "ingress-nginx");
        assert!(Arc::ptr_eq(a, b));
        assert!(Arc::ptr_eq(b, c));
    }

    #[test]
    fn test_descriptor_debug_shows_name() {
        let registry = AddonRegistry::builtin();
        let descriptor = registry.resolve("ingress").unwrap();

        let rendered = format!("{:?}", descriptor);
        assert!(rendered.contains("AddonDescriptor"));
        assert!(rendered.contains("ingress-nginx"));
    }

    #[test]
    fn test_resolve_normalizes_case_and_whitespace() {
        let registry = AddonRegistry::builtin();
        assert!(registry.resolve("  Ingress-NGINX ").is_ok());
    }

    #[test]
    fn test_unknown_name_lists_available() {
        let registry = AddonRegistry::builtin();
        let err = registry.resolve("istio").unwrap_err();

        match err {
            AddonError::UnknownAddon { name, available } => {
                assert_eq!(name, "istio");
                assert!(available.contains("ingress-nginx"));
                assert!(available.contains("nginx"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_requirements_dedup_aliases_and_skip_unknown() {
        let registry = AddonRegistry::builtin();
        let names: Vec<String> = ["ingress", "nginx", "bogus", "ingress-nginx"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let records = registry.requirements_for(&names);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].port_mappings.len(), 2);
    }

    #[test]
    fn test_empty_requirements_dropped() {
        let mut registry = AddonRegistry::new();
        registry.register(
            &["noop"],
            AddonDescriptor::new(
                "noop",
                AddonRequirements::default,
                |ctx| Box::new(IngressNginxAddon::new(ctx)),
            ),
        );

        let records = registry.requirements_for(&["noop".to_string()]);
        assert!(records.is_empty());
    }
}
