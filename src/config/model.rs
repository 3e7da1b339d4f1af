//! Provisioning Configuration Model
//!
//! # Example YAML Format
//!
//! ```yaml
//! tool: conda
//! environment: analytics
//! spec_file: environment.yml
//! proxy:
//!   http_proxy: http://proxy.example:8080
//!   https_proxy: http://proxy.example:8080
//!   ca_bundle: C:/certs/corp.pem
//! on_error: continue
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::environment::ToolKind;
use crate::error::ConfigError;

/// Variable read by network-capable tools for plain HTTP traffic.
pub const HTTP_PROXY_VAR: &str = "HTTP_PROXY";

/// Variable read by network-capable tools for HTTPS traffic.
pub const HTTPS_PROXY_VAR: &str = "HTTPS_PROXY";

/// Trusted certificate bundle used by `requests`-based tools (conda included).
pub const CA_BUNDLE_VAR: &str = "REQUESTS_CA_BUNDLE";

/// Hosts that bypass the proxy.
pub const NO_PROXY_VAR: &str = "NO_PROXY";

/// Micromamba's root prefix for environment storage.
pub const ROOT_PREFIX_VAR: &str = "MAMBA_ROOT_PREFIX";

/// Default declarative environment file, relative to the working directory.
pub const DEFAULT_SPEC_FILE: &str = "environment.yml";

/// Default name of the manager's base environment.
pub const DEFAULT_BASE_ENV: &str = "base";

/// What to do when a step fails.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep running the remaining steps.
    #[default]
    Continue,
    /// Stop at the first failure; remaining steps are skipped.
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "abort" => Ok(Self::Abort),
            other => Err(ConfigError::InvalidValue {
                field: "on_error",
                reason: format!("expected 'continue' or 'abort', got '{}'", other),
            }),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

/// Shell dialect used for hook and activation scripts.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    #[serde(rename = "cmd.exe", alias = "cmd")]
    Cmd,
    #[serde(rename = "powershell", alias = "pwsh")]
    PowerShell,
    #[serde(rename = "bash")]
    Bash,
    #[serde(rename = "zsh")]
    Zsh,
    #[serde(rename = "fish")]
    Fish,
    #[serde(rename = "posix", alias = "sh")]
    Posix,
}

impl ShellKind {
    /// Name understood by conda's `shell.<name>` and micromamba's `-s <name>`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cmd => "cmd.exe",
            Self::PowerShell => "powershell",
            Self::Bash => "bash",
            Self::Zsh => "zsh",
            Self::Fish => "fish",
            Self::Posix => "posix",
        }
    }
}

impl Default for ShellKind {
    fn default() -> Self {
        if cfg!(windows) {
            Self::Cmd
        } else {
            Self::Bash
        }
    }
}

impl FromStr for ShellKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cmd" | "cmd.exe" => Ok(Self::Cmd),
            "powershell" | "pwsh" => Ok(Self::PowerShell),
            "bash" => Ok(Self::Bash),
            "zsh" => Ok(Self::Zsh),
            "fish" => Ok(Self::Fish),
            "posix" | "sh" => Ok(Self::Posix),
            other => Err(ConfigError::InvalidValue {
                field: "shell",
                reason: format!("unsupported shell '{}'", other),
            }),
        }
    }
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proxy and certificate settings handed to the environment manager.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ProxySettings {
    /// Proxy address for HTTP requests
    pub http_proxy: Option<String>,

    /// Proxy address for HTTPS requests
    pub https_proxy: Option<String>,

    /// Path to the trusted certificate bundle
    pub ca_bundle: Option<PathBuf>,

    /// Comma-separated hosts that bypass the proxy
    pub no_proxy: Option<String>,
}

impl ProxySettings {
    /// Returns true if no setting is configured.
    pub fn is_empty(&self) -> bool {
        self.env_vars().is_empty()
    }

    /// Renders the configured settings as environment variables.
    ///
    /// Unset and blank values are omitted. Order is stable:
    /// `HTTP_PROXY`, `HTTPS_PROXY`, `REQUESTS_CA_BUNDLE`, `NO_PROXY`.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let ca_bundle = self
            .ca_bundle
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());

        [
            (HTTP_PROXY_VAR, self.http_proxy.clone()),
            (HTTPS_PROXY_VAR, self.https_proxy.clone()),
            (CA_BUNDLE_VAR, ca_bundle),
            (NO_PROXY_VAR, self.no_proxy.clone()),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| (name.to_string(), v))
        })
        .collect()
    }
}

/// Complete settings for one provisioning run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
    /// Environment manager flavour
    pub tool: ToolKind,

    /// Explicit path to the manager binary (skips discovery)
    pub tool_path: Option<PathBuf>,

    /// Name of the environment to create/update and activate
    pub environment: String,

    /// Declarative environment file handed to the manager
    pub spec_file: PathBuf,

    /// Environment that is active once everything is deactivated
    pub base_env: String,

    /// Shell dialect for hook and activation scripts
    pub shell: ShellKind,

    /// Micromamba root prefix
    pub root_prefix: Option<PathBuf>,

    /// Proxy and certificate settings
    pub proxy: ProxySettings,

    /// Behaviour after a failed step
    pub on_error: FailurePolicy,

    /// Clear the package cache before updating
    pub clean_cache: bool,

    /// Confirm the environment is registered after updating
    pub verify: bool,

    /// Remove packages no longer listed in the spec file (conda/mamba)
    pub prune: bool,

    /// Wait for a key press before exiting
    pub pause: bool,

    /// Print invocations instead of running them
    #[serde(skip)]
    pub dry_run: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            tool: ToolKind::default(),
            tool_path: None,
            environment: String::new(),
            spec_file: PathBuf::from(DEFAULT_SPEC_FILE),
            base_env: DEFAULT_BASE_ENV.to_string(),
            shell: ShellKind::default(),
            root_prefix: None,
            proxy: ProxySettings::default(),
            on_error: FailurePolicy::default(),
            clean_cache: true,
            verify: true,
            prune: false,
            pause: true,
            dry_run: false,
        }
    }
}

impl ProvisionConfig {
    /// Creates a configuration for the named environment with default settings.
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            ..Self::default()
        }
    }

    /// Sets the spec file path.
    pub fn with_spec_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec_file = path.into();
        self
    }

    /// Sets the manager flavour.
    pub fn with_tool(mut self, tool: ToolKind) -> Self {
        self.tool = tool;
        self
    }

    /// Sets the proxy settings.
    pub fn with_proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = proxy;
        self
    }

    /// Sets the failure policy.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_error = policy;
        self
    }

    /// Resolves the spec file against a working directory.
    pub fn spec_path_in(&self, working_dir: Option<&Path>) -> PathBuf {
        match working_dir {
            Some(dir) if self.spec_file.is_relative() => dir.join(&self.spec_file),
            _ => self.spec_file.clone(),
        }
    }

    /// Every variable the manager invocations receive, proxy settings first.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let mut vars = self.proxy.env_vars();
        if let Some(prefix) = &self.root_prefix {
            vars.push((
                ROOT_PREFIX_VAR.to_string(),
                prefix.to_string_lossy().into_owned(),
            ));
        }
        vars
    }
}
