//! Core error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    #[error("unknown template '{name}'. Available templates: {available}")]
    UnknownTemplate { name: String, available: String },

    #[error("configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("named configuration '{name}' not found. Expected file: {path}. Available templates: {available}")]
    NamedConfigNotFound {
        name: String,
        path: PathBuf,
        available: String,
    },

    #[error("invalid cluster configuration: {message}")]
    InvalidConfig { message: String },

    #[error("failed to parse cluster configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
