//! Configuration Module
//!
//! Settings for a provisioning run: which manager to drive, which
//! environment to build, and the proxy variables handed to the manager.
//!
//! - [`model`]: Configuration data structures
//! - [`parser`]: YAML loading, overrides and validation

pub mod model;
pub mod parser;

pub use model::{FailurePolicy, ProvisionConfig, ProxySettings, ShellKind};
pub use parser::{load_config, load_or_default, validate_config, ConfigOverrides, DEFAULT_CONFIG_FILE};
