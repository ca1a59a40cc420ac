//! Kindling Addons - Installation of cluster add-ons via helm and kubectl
//!
//! An add-on implements the staged [`Addon`] lifecycle (prerequisites,
//! installed check, install, readiness, verify) and declares the
//! cluster requirements it needs merged into the bootstrap descriptor
//! before creation. The [`AddonManager`] resolves requested names
//! through an [`AddonRegistry`] and runs each add-on's pipeline,
//! isolating failures so a batch always completes.

pub mod context;
pub mod error;
pub mod exec;
pub mod ingress_nginx;
pub mod lifecycle;
pub mod manager;
pub mod mock;
pub mod registry;

pub use context::{AddonContext, AddonOptions};
pub use error::{AddonError, Result};
pub use exec::{CommandOutput, CommandRequest, CommandRunner, ProcessRunner};
pub use ingress_nginx::IngressNginxAddon;
pub use lifecycle::{Addon, AddonStatus, InstallOutcome, InstallResult};
pub use manager::{AddonManager, InstallReport};
pub use mock::MockRunner;
pub use registry::{AddonDescriptor, AddonRegistry};
