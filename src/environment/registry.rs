//! Environment Registry
//!
//! Reads the manager's `env list` output and models which environment is
//! active in the session being provisioned.

use std::env;

use serde::Serialize;

/// Variable conda and micromamba set to the active environment's name.
pub const ACTIVE_ENV_VAR: &str = "CONDA_DEFAULT_ENV";

/// One registered environment.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct EnvEntry {
    pub name: String,
    pub prefix: String,
    pub active: bool,
}

/// Parses `env list` output from conda, mamba or micromamba.
///
/// Comment lines, table headers, separator rules and unnamed (path-only)
/// environments are skipped.
pub fn parse_env_list(stdout: &str) -> Vec<EnvEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || is_rule(trimmed) {
                return None;
            }

            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            match parts.as_slice() {
                ["Name", "Active", ..] | ["Name", "Path", ..] => None,
                [_path] => None,
                [name, "*", prefix, ..] => Some(EnvEntry {
                    name: name.to_string(),
                    prefix: prefix.to_string(),
                    active: true,
                }),
                [name, prefix, ..] => Some(EnvEntry {
                    name: name.to_string(),
                    prefix: prefix.to_string(),
                    active: false,
                }),
                [] => None,
            }
        })
        .collect()
}

/// Returns true if `name` appears in `env list` output.
pub fn env_exists(stdout: &str, name: &str) -> bool {
    parse_env_list(stdout).iter().any(|entry| entry.name == name)
}

fn is_rule(line: &str) -> bool {
    line.chars().all(|c| c == '-' || c == '─' || c == '=')
}

/// Active-environment model for the provisioned session.
///
/// Activation pushes, deactivation pops back to whatever was active before.
/// The environment the session started in is never popped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEnvStack {
    stack: Vec<String>,
}

impl ActiveEnvStack {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            stack: vec![initial.into()],
        }
    }

    /// Starts from `CONDA_DEFAULT_ENV`, or `base_env` if unset.
    pub fn from_env(base_env: &str) -> Self {
        let initial = env::var(ACTIVE_ENV_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| base_env.to_string());
        Self::new(initial)
    }

    pub fn current(&self) -> &str {
        self.stack.last().map(String::as_str).unwrap_or_default()
    }

    pub fn initial(&self) -> &str {
        self.stack.first().map(String::as_str).unwrap_or_default()
    }

    pub fn activate(&mut self, name: impl Into<String>) {
        self.stack.push(name.into());
    }

    /// Returns the environment that is active afterwards.
    pub fn deactivate(&mut self) -> &str {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
        self.current()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
