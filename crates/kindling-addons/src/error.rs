//! Add-on error types

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AddonError {
    #[error("required binary not found on PATH: {program}")]
    MissingBinary { program: String },

    #[error("command '{program}' timed out after {seconds}s")]
    CommandTimeout { program: String, seconds: u64 },

    #[error("helm command failed: {0}")]
    Helm(String),

    #[error("kubectl command failed: {0}")]
    Kubectl(String),

    #[error("Invalid addon name: {name}. Available addons: {available}")]
    UnknownAddon { name: String, available: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AddonError>;
