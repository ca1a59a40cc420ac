//! Add-on requirement records
//!
//! The declarative, pre-creation contribution an add-on makes to the
//! cluster bootstrap descriptor. Records are produced once per add-on
//! before any cluster exists and are immutable once collected.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::cluster::PortMapping;

/// Requirements one add-on declares against the bootstrap descriptor.
///
/// All fields are optional on the wire; absent fields default to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddonRequirements {
    /// containerd config patches (opaque strings, order matters)
    #[serde(
        default,
        rename = "containerdConfigPatches",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub containerd_config_patches: Vec<String>,

    /// Host port mappings applied to the control-plane node
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_mappings: Vec<PortMapping>,

    /// Node labels applied to the control-plane node via kubeletExtraArgs
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_labels: BTreeMap<String, String>,

    /// Networking overrides merged into the descriptor
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub networking: BTreeMap<String, JsonValue>,

    /// Kubernetes feature gates merged into the descriptor
    #[serde(
        default,
        rename = "featureGates",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub feature_gates: BTreeMap<String, bool>,
}

impl AddonRequirements {
    /// True when the add-on contributes nothing to the descriptor
    pub fn is_empty(&self) -> bool {
        self.containerd_config_patches.is_empty()
            && self.port_mappings.is_empty()
            && self.node_labels.is_empty()
            && self.networking.is_empty()
            && self.feature_gates.is_empty()
    }
}
