//! Kindling Core - Cluster bootstrap configuration for kind clusters
//!
//! This crate provides the types used before a cluster exists:
//! - `ClusterConfig`: Typed model of the kind cluster bootstrap descriptor
//! - `AddonRequirements`: The declarative contribution an add-on makes to the descriptor
//! - `merge_addon_requirements`: Deterministic merge of requirement records into a descriptor
//! - Template store: Built-in cluster templates with custom-config discovery

pub mod cluster;
pub mod error;
pub mod merge;
pub mod requirements;
pub mod templates;

pub use cluster::{ClusterConfig, Node, NodeRole, PortMapping, Protocol};
pub use error::{CoreError, Result};
pub use merge::{MergeOutcome, MergeWarning, merge_addon_requirements};
pub use requirements::AddonRequirements;
pub use templates::{
    discover_config_file, get_cluster_config, load_config_from_file, template_names,
    validate_cluster_config,
};
