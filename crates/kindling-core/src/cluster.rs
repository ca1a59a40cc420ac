//! Typed model of the kind cluster bootstrap descriptor
//!
//! This is the structure consumed by the external cluster-creation tool
//! (`kind create cluster --config ...`). Only the fields the add-on
//! pipeline touches are modeled explicitly; everything else a user puts
//! in a custom config is preserved by validating the raw YAML instead
//! of round-tripping it through this type.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

/// Document type expected in a cluster descriptor
pub const CLUSTER_KIND: &str = "Cluster";

/// API version expected in a cluster descriptor
pub const CLUSTER_API_VERSION: &str = "kind.x-k8s.io/v1alpha4";

/// kind cluster bootstrap descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub api_version: String,

    /// Cluster name (kind allows it inline in the descriptor)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,

    /// Ordered containerd config patches applied to every node
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containerd_config_patches: Vec<String>,

    /// String-keyed networking overrides (podSubnet, apiServerAddress, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub networking: BTreeMap<String, JsonValue>,

    /// Kubernetes feature gate flags
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, bool>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kind: CLUSTER_KIND.to_string(),
            api_version: CLUSTER_API_VERSION.to_string(),
            name: None,
            nodes: Vec::new(),
            containerd_config_patches: Vec::new(),
            networking: BTreeMap::new(),
            feature_gates: BTreeMap::new(),
        }
    }
}

impl ClusterConfig {
    /// Parse a descriptor from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Serialize the descriptor to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// First node with role `control-plane`, the merge target for
    /// node-scoped requirements. `None` when the descriptor has no
    /// control-plane node.
    pub fn control_plane(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.role == NodeRole::ControlPlane)
    }

    /// Mutable access to the control-plane merge target
    pub fn control_plane_mut(&mut self) -> Option<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| n.role == NodeRole::ControlPlane)
    }
}

/// One node in the cluster topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub role: NodeRole,

    /// Node image override (used to pin a Kubernetes version)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_port_mappings: Vec<PortMapping>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kubeadm_config_patches: Vec<String>,
}

impl Node {
    /// Bare node with the given role
    pub fn new(role: NodeRole) -> Self {
        Self {
            role,
            image: None,
            extra_port_mappings: Vec::new(),
            kubeadm_config_patches: Vec::new(),
        }
    }
}

/// Node role in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    ControlPlane,
    Worker,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::ControlPlane => write!(f, "control-plane"),
            NodeRole::Worker => write!(f, "worker"),
        }
    }
}

/// Host-to-container port mapping on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    #[serde(default)]
    pub protocol: Protocol,
}

impl PortMapping {
    pub fn new(container_port: u16, host_port: u16, protocol: Protocol) -> Self {
        Self {
            container_port,
            host_port,
            protocol,
        }
    }

    /// Identity used for exact-duplicate detection
    pub fn key(&self) -> (u16, u16, Protocol) {
        (self.container_port, self.host_port, self.protocol)
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}",
            self.container_port, self.host_port, self.protocol
        )
    }
}

/// Port mapping protocol; kind defaults to TCP when unspecified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}
