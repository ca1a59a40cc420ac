//! Merging add-on requirements into a cluster bootstrap descriptor
//!
//! Add-ons declare configuration they need baked into the cluster before
//! it is created (port mappings, containerd patches, node labels,
//! networking overrides, feature gates). This module folds those records
//! into a descriptor deterministically:
//!
//! - containerd patches: append all, in record order
//! - port mappings: append to the control-plane node, dedup exact
//!   duplicates, drop host-port conflicts (first binding wins)
//! - node labels: merge into one kubeletExtraArgs.node-labels patch
//! - networking / feature gates: merge, first-seen value wins on conflict
//!
//! The merge never fails and never mutates its input; conflicts surface
//! as warnings on the returned outcome.

use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::cluster::{ClusterConfig, Node, PortMapping, Protocol};
use crate::requirements::AddonRequirements;

/// Merged descriptor plus the conflicts observed while merging
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub config: ClusterConfig,
    pub warnings: Vec<MergeWarning>,
}

/// A conflict resolved during merging; the first-seen value always wins
#[derive(Debug, Clone, PartialEq)]
pub enum MergeWarning {
    /// A host port/protocol pair was already bound to another container port
    PortConflict {
        host_port: u16,
        protocol: Protocol,
        bound_container_port: u16,
        rejected_container_port: u16,
    },
    /// Two records disagreed on a networking key
    NetworkingConflict {
        key: String,
        kept: JsonValue,
        rejected: JsonValue,
    },
    /// Two records disagreed on a feature gate
    FeatureGateConflict {
        gate: String,
        kept: bool,
        rejected: bool,
    },
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeWarning::PortConflict {
                host_port,
                protocol,
                bound_container_port,
                rejected_container_port,
            } => write!(
                f,
                "Port mapping conflict: host port {}/{} already mapped to container port {}, cannot map to {}. Skipping conflicting mapping.",
                host_port, protocol, bound_container_port, rejected_container_port
            ),
            MergeWarning::NetworkingConflict { key, kept, rejected } => write!(
                f,
                "Networking conflict for '{}': existing={}, new={}. Using existing value.",
                key, kept, rejected
            ),
            MergeWarning::FeatureGateConflict {
                gate,
                kept,
                rejected,
            } => write!(
                f,
                "Feature gate conflict for '{}': existing={}, new={}. Using existing value.",
                gate, kept, rejected
            ),
        }
    }
}

/// Merge add-on requirement records into a base descriptor.
///
/// The base is never mutated; the returned config is a deep copy with
/// all merges applied. Each requirement kind is merged independently,
/// so the processing order is fixed regardless of how fields are
/// interleaved across records.
///
/// Node-scoped merges (port mappings, node labels) target the
/// control-plane node and are silently skipped when the descriptor has
/// none; descriptor-scoped merges still apply.
pub fn merge_addon_requirements(
    base: &ClusterConfig,
    requirements: &[AddonRequirements],
) -> MergeOutcome {
    let mut merged = base.clone();
    let mut warnings = Vec::new();

    // Collect every requirement kind across records first
    let mut containerd_patches: Vec<String> = Vec::new();
    let mut port_mappings: Vec<PortMapping> = Vec::new();
    let mut node_labels: BTreeMap<String, String> = BTreeMap::new();
    let mut networking: BTreeMap<String, JsonValue> = BTreeMap::new();
    let mut feature_gates: BTreeMap<String, bool> = BTreeMap::new();

    for req in requirements {
        containerd_patches.extend(req.containerd_config_patches.iter().cloned());
        port_mappings.extend(req.port_mappings.iter().copied());

        // Flat override map, last write wins per key
        for (key, value) in &req.node_labels {
            node_labels.insert(key.clone(), value.clone());
        }

        for (key, value) in &req.networking {
            match networking.get(key) {
                Some(existing) if existing != value => {
                    let warning = MergeWarning::NetworkingConflict {
                        key: key.clone(),
                        kept: existing.clone(),
                        rejected: value.clone(),
                    };
                    tracing::warn!("{}", warning);
                    warnings.push(warning);
                }
                _ => {
                    networking.insert(key.clone(), value.clone());
                }
            }
        }

        for (gate, enabled) in &req.feature_gates {
            match feature_gates.get(gate) {
                Some(existing) if existing != enabled => {
                    let warning = MergeWarning::FeatureGateConflict {
                        gate: gate.clone(),
                        kept: *existing,
                        rejected: *enabled,
                    };
                    tracing::warn!("{}", warning);
                    warnings.push(warning);
                }
                _ => {
                    feature_gates.insert(gate.clone(), *enabled);
                }
            }
        }
    }

    if !containerd_patches.is_empty() {
        tracing::info!(
            "Added {} containerd config patch(es)",
            containerd_patches.len()
        );
        merged.containerd_config_patches.extend(containerd_patches);
    }

    if !port_mappings.is_empty() {
        if let Some(node) = merged.control_plane_mut() {
            apply_port_mappings(node, &port_mappings, &mut warnings);
        }
    }

    if !node_labels.is_empty() {
        if let Some(node) = merged.control_plane_mut() {
            apply_node_labels(node, &node_labels);
            tracing::info!("Added {} node label(s) to control-plane", node_labels.len());
        }
    }

    if !networking.is_empty() {
        tracing::info!("Applied {} networking override(s)", networking.len());
        merged.networking.extend(networking);
    }

    if !feature_gates.is_empty() {
        tracing::info!("Applied {} feature gate(s)", feature_gates.len());
        merged.feature_gates.extend(feature_gates);
    }

    MergeOutcome {
        config: merged,
        warnings,
    }
}

/// Append collected port mappings to a node's extraPortMappings.
///
/// Mappings already present on the node participate in dedup and
/// conflict state, so a base descriptor binding wins over any add-on
/// claim on the same host port/protocol pair.
fn apply_port_mappings(
    node: &mut Node,
    mappings: &[PortMapping],
    warnings: &mut Vec<MergeWarning>,
) {
    let mut seen: HashSet<(u16, u16, Protocol)> =
        node.extra_port_mappings.iter().map(|m| m.key()).collect();
    let mut bound: HashMap<(u16, Protocol), u16> = node
        .extra_port_mappings
        .iter()
        .map(|m| ((m.host_port, m.protocol), m.container_port))
        .collect();

    let mut added = 0usize;
    let mut skipped = 0usize;

    for mapping in mappings {
        if seen.contains(&mapping.key()) {
            // Exact duplicate, drop silently
            tracing::debug!("Skipping duplicate port mapping: {}", mapping);
            skipped += 1;
        } else if let Some(&existing) = bound.get(&(mapping.host_port, mapping.protocol)) {
            let warning = MergeWarning::PortConflict {
                host_port: mapping.host_port,
                protocol: mapping.protocol,
                bound_container_port: existing,
                rejected_container_port: mapping.container_port,
            };
            tracing::warn!("{}", warning);
            warnings.push(warning);
            skipped += 1;
        } else {
            seen.insert(mapping.key());
            bound.insert((mapping.host_port, mapping.protocol), mapping.container_port);
            node.extra_port_mappings.push(*mapping);
            added += 1;
        }
    }

    if added > 0 {
        tracing::info!("Added {} port mapping(s) to control-plane node", added);
    }
    if skipped > 0 {
        tracing::debug!("Skipped {} duplicate/conflicting port mapping(s)", skipped);
    }
}

/// Render collected labels into one kubeadm InitConfiguration patch and
/// append it. kubeadm merges multiple InitConfiguration patches, so
/// appending keeps labels from earlier patches intact.
fn apply_node_labels(node: &mut Node, labels: &BTreeMap<String, String>) {
    let label_str = labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",");

    let patch = format!(
        "kind: InitConfiguration\nnodeRegistration:\n  kubeletExtraArgs:\n    node-labels: \"{}\"\n",
        label_str
    );
    node.kubeadm_config_patches.push(patch);
    tracing::debug!("Appended InitConfiguration patch with labels: {}", label_str);
}
