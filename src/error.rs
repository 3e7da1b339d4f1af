//! Error Types
//!
//! Configuration and run-level errors. Individual step failures are not
//! errors here: they are recorded as [`FailureKind`](crate::execution::FailureKind)
//! on the step result so the failure policy can decide what happens next.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a provisioning configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("missing required setting '{0}'")]
    MissingField(&'static str),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Errors that stop a provisioning run outright.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write report '{}': {source}", .path.display())]
    ReportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    ReportSerialize(#[from] serde_json::Error),
}
