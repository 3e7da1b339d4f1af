//! Configuration Loading
//!
//! Reads provisioning settings from YAML, layers command-line overrides on
//! top, and validates the result before any step runs.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::model::{FailurePolicy, ProvisionConfig, ShellKind};
use crate::environment::ToolKind;
use crate::error::ConfigError;

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "provision.yaml";

/// Loads a configuration from a YAML file.
///
/// Missing keys take their defaults; unknown keys are rejected so typos
/// surface instead of being ignored.
///
/// # Example
///
/// ```rust,no_run
/// use envprovision::config::load_config;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_config("provision.yaml")?;
///     println!("Provisioning '{}'", config.environment);
///     Ok(())
/// }
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<ProvisionConfig, ConfigError> {
    let path = path.as_ref();
    info!("Loading configuration from: {}", path.display());

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("Config content loaded ({} bytes)", content.len());

    if content.trim().is_empty() {
        return Ok(ProvisionConfig::default());
    }

    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the explicit config file, else `provision.yaml` in `dir` if present,
/// else the defaults.
pub fn load_or_default(
    explicit: Option<&Path>,
    dir: &Path,
) -> Result<ProvisionConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    let fallback = dir.join(DEFAULT_CONFIG_FILE);
    if fallback.is_file() {
        load_config(fallback)
    } else {
        debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
        Ok(ProvisionConfig::default())
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub environment: Option<String>,
    pub spec_file: Option<PathBuf>,
    pub tool: Option<ToolKind>,
    pub tool_path: Option<PathBuf>,
    pub shell: Option<ShellKind>,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub ca_bundle: Option<PathBuf>,
    pub on_error: Option<FailurePolicy>,
    pub no_clean: bool,
    pub no_verify: bool,
    pub no_pause: bool,
    pub prune: bool,
    pub dry_run: bool,
}

impl ConfigOverrides {
    /// Applies the overrides to a loaded configuration.
    pub fn apply(self, mut config: ProvisionConfig) -> ProvisionConfig {
        if let Some(name) = self.environment {
            config.environment = name;
        }
        if let Some(spec) = self.spec_file {
            config.spec_file = spec;
        }
        if let Some(tool) = self.tool {
            config.tool = tool;
        }
        if let Some(path) = self.tool_path {
            config.tool_path = Some(path);
        }
        if let Some(shell) = self.shell {
            config.shell = shell;
        }

        if let Some(value) = self.http_proxy {
            config.proxy.http_proxy = Some(value);
        }
        if let Some(value) = self.https_proxy {
            config.proxy.https_proxy = Some(value);
        }
        if let Some(value) = self.ca_bundle {
            config.proxy.ca_bundle = Some(value);
        }

        if let Some(policy) = self.on_error {
            config.on_error = policy;
        }
        if self.no_clean {
            config.clean_cache = false;
        }
        if self.no_verify {
            config.verify = false;
        }
        if self.no_pause {
            config.pause = false;
        }
        if self.prune {
            config.prune = true;
        }
        config.dry_run = self.dry_run;
        config
    }
}

/// Validates a configuration before provisioning.
pub fn validate_config(config: &ProvisionConfig) -> Result<(), ConfigError> {
    let name = config.environment.trim();
    if name.is_empty() {
        return Err(ConfigError::MissingField("environment"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidValue {
            field: "environment",
            reason: format!("'{}' contains whitespace", name),
        });
    }
    if config.base_env.trim().is_empty() {
        return Err(ConfigError::MissingField("base_env"));
    }
    if config.spec_file.as_os_str().is_empty() {
        return Err(ConfigError::MissingField("spec_file"));
    }

    check_proxy_url("proxy.http_proxy", config.proxy.http_proxy.as_deref())?;
    check_proxy_url("proxy.https_proxy", config.proxy.https_proxy.as_deref())?;

    Ok(())
}

fn check_proxy_url(field: &'static str, value: Option<&str>) -> Result<(), ConfigError> {
    match value.map(str::trim) {
        Some(url) if !url.is_empty() && !url.contains("://") => Err(ConfigError::InvalidValue {
            field,
            reason: format!("'{}' is missing a scheme such as http://", url),
        }),
        _ => Ok(()),
    }
}
