//! Provisioning Steps
//!
//! Step identities, outcomes, and classification of failed manager calls.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::runner::{CommandOutput, SpawnError};

/// One named stage of a provisioning run, in execution order.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    ShellInit,
    ConfigureProxy,
    CleanCache,
    UpdateEnvironment,
    VerifyEnvironment,
    Activate,
    Deactivate,
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShellInit => "shell-init",
            Self::ConfigureProxy => "configure-proxy",
            Self::CleanCache => "clean-cache",
            Self::UpdateEnvironment => "update-environment",
            Self::VerifyEnvironment => "verify-environment",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ShellInit => "Register the manager's shell hook",
            Self::ConfigureProxy => "Set proxy and certificate variables",
            Self::CleanCache => "Clear the package cache",
            Self::UpdateEnvironment => "Create or update the environment",
            Self::VerifyEnvironment => "Confirm the environment is registered",
            Self::Activate => "Activate the environment",
            Self::Deactivate => "Return to the previous environment",
        }
    }

    /// True if the manager may reach package channels during this step.
    pub fn touches_network(&self) -> bool {
        matches!(self, Self::CleanCache | Self::UpdateEnvironment)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a step failed.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    #[error("environment manager not found: {program}")]
    ToolNotFound { program: String },

    #[error("specification file not found: {}", .path.display())]
    SpecFileNotFound { path: PathBuf },

    #[error("specification file is malformed")]
    SpecFileMalformed,

    #[error("network or proxy failure while contacting package channels")]
    Network,

    #[error("environment name conflicts with an existing environment")]
    NameConflict,

    #[error("environment '{name}' is not registered")]
    EnvironmentMissing { name: String },

    #[error("command exited with {}", .code.map(|c| c.to_string()).unwrap_or_else(|| "a signal".to_string()))]
    CommandFailed { code: Option<i32> },

    #[error("{message}")]
    Spawn { message: String },
}

impl From<SpawnError> for FailureKind {
    fn from(err: SpawnError) -> Self {
        match err {
            SpawnError::NotFound { program } => Self::ToolNotFound {
                program: program.display().to_string(),
            },
            other => Self::Spawn {
                message: other.to_string(),
            },
        }
    }
}

const SPEC_MISSING_MARKERS: &[&str] = &["EnvironmentFileNotFound", "environment file not found"];

const SPEC_MALFORMED_MARKERS: &[&str] = &[
    "YAMLError",
    "ParserError",
    "ScannerError",
    "SpecNotFound",
    "Invalid spec",
    "InvalidMatchSpec",
    "EnvironmentFileEmpty",
];

const NETWORK_MARKERS: &[&str] = &[
    "CondaHTTPError",
    "ProxyError",
    "SSLError",
    "CERTIFICATE_VERIFY_FAILED",
    "ConnectionError",
    "ConnectTimeout",
    "Could not resolve host",
    "Download error",
];

const CONFLICT_MARKERS: &[&str] = &["already exists", "CondaValueError: prefix already exists"];

/// Classifies a manager call made by `step` that exited non-zero.
///
/// Network markers only count for steps that reach package channels and
/// spec-file markers only for the update step. The update step replaces the
/// empty path with the file it handed to the manager.
pub fn classify_failure(step: StepKind, output: &CommandOutput) -> FailureKind {
    let text = format!("{}\n{}", output.stderr, output.stdout);
    let has = |markers: &[&str]| markers.iter().any(|m| text.contains(m));
    let reads_spec = step == StepKind::UpdateEnvironment;

    if step.touches_network() && has(NETWORK_MARKERS) {
        FailureKind::Network
    } else if reads_spec && has(SPEC_MALFORMED_MARKERS) {
        FailureKind::SpecFileMalformed
    } else if reads_spec && has(SPEC_MISSING_MARKERS) {
        FailureKind::SpecFileNotFound {
            path: PathBuf::new(),
        }
    } else if has(CONFLICT_MARKERS) {
        FailureKind::NameConflict
    } else {
        FailureKind::CommandFailed { code: output.code }
    }
}

/// Final state of a step.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", content = "failure", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed(FailureKind),
    /// Not run because an earlier step failed under the abort policy
    Skipped,
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded => "ok",
            Self::Failed(_) => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Result of one step: outcome plus everything captured while running it.
#[derive(Serialize, Debug, Clone)]
pub struct StepResult {
    pub kind: StepKind,
    pub outcome: StepOutcome,
    /// Command line, for steps that spawn the manager
    pub command: Option<String>,
    /// Captured output of the step's last subprocess
    pub output: Option<CommandOutput>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl StepResult {
    pub fn new(kind: StepKind, outcome: StepOutcome) -> Self {
        Self {
            kind,
            outcome,
            command: None,
            output: None,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn skipped(kind: StepKind) -> Self {
        Self::new(kind, StepOutcome::Skipped)
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_output(mut self, output: CommandOutput) -> Self {
        self.output = Some(output);
        self
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == StepOutcome::Succeeded
    }
}
