//! Built-in cluster templates and custom config discovery
//!
//! Templates are YAML descriptors embedded at compile time with a
//! `{name}` placeholder for the cluster name. A non-built-in template
//! name refers to a user-provided config file in the infrastructure
//! directory; built-in names always render the built-in.
//!
//! Discovery order for a requested template `t`:
//! 1. `kind-{t}.yaml` in the infrastructure directory, when `t` is not
//!    a built-in name
//! 2. `kind-config.yaml` in the infrastructure directory (shared custom
//!    config, honored for `default` and `custom` requests)
//! 3. the built-in template

use once_cell::sync::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cluster::{CLUSTER_API_VERSION, CLUSTER_KIND, ClusterConfig};
use crate::error::{CoreError, Result};

/// Shared custom config filename honored for default/custom requests
const SHARED_CONFIG_FILE: &str = "kind-config.yaml";

struct BuiltinTemplate {
    name: &'static str,
    source: &'static str,
    validated: OnceCell<()>,
}

impl BuiltinTemplate {
    const fn new(name: &'static str, source: &'static str) -> Self {
        Self {
            name,
            source,
            validated: OnceCell::new(),
        }
    }

    /// Template source, validated at most once per process.
    ///
    /// The unrendered source must itself parse as a descriptor, which
    /// is why the templates quote the `{name}` placeholder.
    fn content(&self) -> Result<&'static str> {
        self.validated
            .get_or_try_init(|| validate_cluster_config(self.source).map(|_| ()))?;
        Ok(self.source)
    }
}

static BUILTIN_TEMPLATES: [BuiltinTemplate; 3] = [
    BuiltinTemplate::new("minimal", include_str!("templates/minimal.yaml")),
    BuiltinTemplate::new("default", include_str!("templates/default.yaml")),
    BuiltinTemplate::new("custom", include_str!("templates/custom.yaml")),
];

/// Names of the built-in templates, in definition order
pub fn template_names() -> Vec<&'static str> {
    BUILTIN_TEMPLATES.iter().map(|t| t.name).collect()
}

fn is_builtin(name: &str) -> bool {
    BUILTIN_TEMPLATES.iter().any(|t| t.name == name)
}

fn builtin(name: &str) -> Option<&'static BuiltinTemplate> {
    BUILTIN_TEMPLATES.iter().find(|t| t.name == name)
}

fn available_names() -> String {
    template_names().join(", ")
}

/// Locate a custom config file for the requested template.
///
/// Returns the path when a custom file should be used, plus a
/// human-readable description of the source decision for logging.
pub fn discover_config_file(template: &str, infra_dir: &Path) -> (Option<PathBuf>, String) {
    if !infra_dir.is_dir() {
        return (
            None,
            format!(
                "Infrastructure directory not found: {}",
                infra_dir.display()
            ),
        );
    }

    // Named custom configs only stand in for non-built-in names; a
    // built-in request keeps its built-in template.
    if !is_builtin(template) {
        let named = infra_dir.join(format!("kind-{}.yaml", template));
        if named.is_file() {
            return (
                Some(named.clone()),
                format!("Custom config file: {}", named.display()),
            );
        }
    }

    // The shared file only stands in for the generic templates; a named
    // request like "minimal" keeps its built-in.
    if template == "default" || template == "custom" {
        let shared = infra_dir.join(SHARED_CONFIG_FILE);
        if shared.is_file() {
            return (
                Some(shared.clone()),
                format!("Custom config file: {}", shared.display()),
            );
        }
    }

    (None, format!("Built-in template: {}", template))
}

/// Read a config file, substitute the cluster name, and validate it
pub fn load_config_from_file(path: &Path, cluster_name: &str) -> Result<String> {
    if !path.is_file() {
        return Err(CoreError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }

    let raw = fs::read_to_string(path)?;
    let rendered = raw.replace("{name}", cluster_name);
    validate_cluster_config(&rendered)?;
    Ok(rendered)
}

/// Resolve the cluster config for a template request.
///
/// Returns the rendered YAML and a description of where it came from.
/// A request naming neither a built-in template nor an existing custom
/// file is an error.
pub fn get_cluster_config(
    template: &str,
    cluster_name: &str,
    infra_dir: Option<&Path>,
) -> Result<(String, String)> {
    if let Some(dir) = infra_dir {
        let (path, source) = discover_config_file(template, dir);
        if let Some(path) = path {
            tracing::info!("Using {}", source);
            let rendered = load_config_from_file(&path, cluster_name)?;
            return Ok((rendered, source));
        }

        // A non-builtin name only makes sense as a custom config; when
        // the directory exists but the file doesn't, point at the file
        // we looked for rather than a generic unknown-template error.
        if !is_builtin(template) && dir.is_dir() {
            return Err(CoreError::NamedConfigNotFound {
                name: template.to_string(),
                path: dir.join(format!("kind-{}.yaml", template)),
                available: available_names(),
            });
        }
    }

    let Some(tpl) = builtin(template) else {
        return Err(CoreError::UnknownTemplate {
            name: template.to_string(),
            available: available_names(),
        });
    };

    let rendered = tpl.content()?.replace("{name}", cluster_name);
    let source = format!("Built-in template: {}", template);
    tracing::debug!("Using {}", source);
    Ok((rendered, source))
}

/// Validate that a YAML document is a well-formed cluster descriptor.
///
/// Parsing through `ClusterConfig` drops fields the pipeline does not
/// model, so callers keep the raw YAML and use the returned value only
/// for inspection.
pub fn validate_cluster_config(yaml: &str) -> Result<ClusterConfig> {
    if yaml.trim().is_empty() {
        return Err(CoreError::InvalidConfig {
            message: "cluster configuration cannot be empty".to_string(),
        });
    }

    let config = ClusterConfig::from_yaml(yaml)?;

    if config.kind != CLUSTER_KIND {
        return Err(CoreError::InvalidConfig {
            message: format!(
                "descriptor must declare 'kind: {}', found '{}'",
                CLUSTER_KIND, config.kind
            ),
        });
    }
    if config.api_version != CLUSTER_API_VERSION {
        return Err(CoreError::InvalidConfig {
            message: format!(
                "descriptor must declare 'apiVersion: {}', found '{}'",
                CLUSTER_API_VERSION, config.api_version
            ),
        });
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, file: &str, content: &str) {
        fs::write(dir.join(file), content).unwrap();
    }

    const VALID_CUSTOM: &str = "kind: Cluster\napiVersion: kind.x-k8s.io/v1alpha4\nname: \"{name}\"\nnodes:\n  - role: control-plane\n";

    #[test]
    fn test_template_names() {
        assert_eq!(template_names(), vec!["minimal", "default", "custom"]);
    }

    #[test]
    fn test_builtin_templates_are_valid() {
        for name in template_names() {
            let (yaml, source) = get_cluster_config(name, "test", None).unwrap();
            assert!(source.contains(name));
            let config = validate_cluster_config(&yaml).unwrap();
            assert_eq!(config.name.as_deref(), Some("test"));
            assert!(config.control_plane().is_some());
        }
    }

    #[test]
    fn test_builtin_render_substitutes_name() {
        let (yaml, _) = get_cluster_config("minimal", "my-cluster", None).unwrap();
        assert!(yaml.contains("name: \"my-cluster\""));
        assert!(!yaml.contains("{name}"));
    }

    #[test]
    fn test_default_template_topology() {
        let (yaml, _) = get_cluster_config("default", "dev", None).unwrap();
        let config = validate_cluster_config(&yaml).unwrap();
        assert_eq!(config.nodes.len(), 3);
    }

    #[test]
    fn test_unknown_template_lists_available() {
        let err = get_cluster_config("huge", "dev", None).unwrap_err();
        match err {
            CoreError::UnknownTemplate { name, available } => {
                assert_eq!(name, "huge");
                assert!(available.contains("minimal"));
                assert!(available.contains("default"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_builtin_name_ignores_named_custom_file() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "kind-default.yaml", VALID_CUSTOM);

        let (path, source) = discover_config_file("default", dir.path());
        assert!(path.is_none());
        assert_eq!(source, "Built-in template: default");
    }

    #[test]
    fn test_named_custom_config_for_non_builtin_name() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "kind-staging.yaml", VALID_CUSTOM);

        let (path, source) = discover_config_file("staging", dir.path());
        assert!(path.unwrap().ends_with("kind-staging.yaml"));
        assert!(source.starts_with("Custom config file"));
    }

    #[test]
    fn test_shared_config_covers_default_and_custom_only() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "kind-config.yaml", VALID_CUSTOM);

        let (path, _) = discover_config_file("default", dir.path());
        assert!(path.unwrap().ends_with("kind-config.yaml"));

        let (path, _) = discover_config_file("custom", dir.path());
        assert!(path.is_some());

        // minimal keeps its built-in
        let (path, source) = discover_config_file("minimal", dir.path());
        assert!(path.is_none());
        assert_eq!(source, "Built-in template: minimal");
    }

    #[test]
    fn test_missing_infra_dir_falls_back_to_builtin() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");

        let (path, source) = discover_config_file("default", &missing);
        assert!(path.is_none());
        assert!(source.contains("not found"));

        let (yaml, _) = get_cluster_config("default", "dev", Some(&missing)).unwrap();
        assert!(yaml.contains("name: \"dev\""));
    }

    #[test]
    fn test_non_builtin_name_requires_custom_file() {
        let dir = TempDir::new().unwrap();

        let err = get_cluster_config("staging", "dev", Some(dir.path())).unwrap_err();
        match err {
            CoreError::NamedConfigNotFound { name, path, .. } => {
                assert_eq!(name, "staging");
                assert!(path.ends_with("kind-staging.yaml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_builtin_name_with_custom_file_resolves() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "kind-staging.yaml", VALID_CUSTOM);

        let (yaml, source) = get_cluster_config("staging", "stg", Some(dir.path())).unwrap();
        assert!(yaml.contains("name: \"stg\""));
        assert!(source.contains("kind-staging.yaml"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_config_from_file(&dir.path().join("absent.yaml"), "dev").unwrap_err();
        assert!(matches!(err, CoreError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_load_config_rejects_invalid_descriptor() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            "kind-bad.yaml",
            "kind: Pod\napiVersion: v1\n",
        );

        let err = load_config_from_file(&dir.path().join("kind-bad.yaml"), "dev").unwrap_err();
        match err {
            CoreError::InvalidConfig { message } => {
                assert!(message.contains("kind: Cluster"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_empty_config() {
        let err = validate_cluster_config("   \n").unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
    }

    #[test]
    fn test_validate_wrong_api_version() {
        let yaml = "kind: Cluster\napiVersion: kind.x-k8s.io/v1alpha3\n";
        let err = validate_cluster_config(yaml).unwrap_err();
        match err {
            CoreError::InvalidConfig { message } => {
                assert!(message.contains(CLUSTER_API_VERSION));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_preserves_extra_user_fields_by_not_failing() {
        // User configs may carry fields the model does not know about
        let yaml = "kind: Cluster\napiVersion: kind.x-k8s.io/v1alpha4\nkubeadmConfigPatches:\n  - |\n    kind: ClusterConfiguration\n";
        assert!(validate_cluster_config(yaml).is_ok());
    }
}
