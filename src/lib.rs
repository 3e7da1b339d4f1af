//! EnvProvision - Conda Environment Provisioning
//!
//! Creates or updates a named conda/mamba/micromamba environment from a
//! declarative spec file, with proxy and certificate variables handed to the
//! manager explicitly rather than written into the caller's environment.
//!
//! # Architecture
//!
//! - [`config`]: Provisioning settings, YAML loading and validation
//! - [`environment`]: Manager discovery, command lines and registry parsing
//! - [`execution`]: Ordered step engine with a configurable failure policy
//! - [`report`]: Timeline, console summary and JSON report
//! - [`console`]: Banner and the final acknowledgment pause
//!
//! # Example
//!
//! ```rust,no_run
//! use envprovision::config::{FailurePolicy, ProvisionConfig, ProxySettings};
//! use envprovision::environment::{resolve_tool, ToolKind};
//! use envprovision::execution::{Provisioner, SystemRunner};
//!
//! let config = ProvisionConfig::new("analytics")
//!     .with_spec_file("environment.yml")
//!     .with_policy(FailurePolicy::Abort)
//!     .with_proxy(ProxySettings {
//!         https_proxy: Some("http://proxy.example:8080".to_string()),
//!         ..ProxySettings::default()
//!     });
//!
//! let tool = resolve_tool(ToolKind::Conda, None);
//! let run = Provisioner::new(config, tool, SystemRunner).run();
//! println!("succeeded: {}", run.succeeded());
//! ```

pub mod config;
pub mod console;
pub mod environment;
pub mod error;
pub mod execution;
pub mod report;

// Re-export commonly used types
pub use config::{load_config, FailurePolicy, ProvisionConfig, ProxySettings};
pub use error::{ConfigError, ProvisionError};
pub use execution::{ProvisionRun, Provisioner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "EnvProvision";
