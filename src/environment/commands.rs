//! Manager Command Lines
//!
//! Builds the argument vectors for each manager operation. conda and mamba
//! share one syntax; micromamba differs for shell integration and has no
//! `env update`.

use std::path::Path;

use crate::config::ShellKind;

use super::tool::ToolKind;

/// Argument builder for one manager flavour and shell dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerCommands {
    kind: ToolKind,
    shell: ShellKind,
}

impl ManagerCommands {
    pub fn new(kind: ToolKind, shell: ShellKind) -> Self {
        Self { kind, shell }
    }

    /// Prints the shell hook that enables `activate` in the session.
    pub fn shell_hook(&self) -> Vec<String> {
        if self.kind.is_conda_compatible() {
            args([self.conda_shell().as_str(), "hook"])
        } else {
            args(["shell", "hook", "-s", self.shell.as_str()])
        }
    }

    /// Removes cached package tarballs, index caches and unused packages.
    pub fn clean_cache(&self) -> Vec<String> {
        args(["clean", "--all", "--yes"])
    }

    /// Lists registered environments.
    pub fn list_envs(&self) -> Vec<String> {
        args(["env", "list"])
    }

    /// Creates or updates `name` from a declarative file.
    ///
    /// conda/mamba's `env update` is idempotent on its own. micromamba needs
    /// `create` for a new environment and `install` for an existing one,
    /// which is why the caller passes what the registry said.
    pub fn update_env(&self, name: &str, spec_file: &Path, exists: bool, prune: bool) -> Vec<String> {
        let spec = spec_file.to_string_lossy().into_owned();

        if self.kind.is_conda_compatible() {
            let mut argv = args(["env", "update", "-n", name, "-f", spec.as_str()]);
            if prune {
                argv.push("--prune".to_string());
            }
            argv
        } else if exists {
            args(["install", "-y", "-n", name, "-f", spec.as_str()])
        } else {
            args(["create", "-y", "-n", name, "-f", spec.as_str()])
        }
    }

    /// Prints the activation script for `name`.
    pub fn activate(&self, name: &str) -> Vec<String> {
        if self.kind.is_conda_compatible() {
            args([self.conda_shell().as_str(), "activate", name])
        } else {
            args(["shell", "activate", "-s", self.shell.as_str(), name])
        }
    }

    /// Prints the script returning to the previously active environment.
    pub fn deactivate(&self) -> Vec<String> {
        if self.kind.is_conda_compatible() {
            args([self.conda_shell().as_str(), "deactivate"])
        } else {
            args(["shell", "deactivate", "-s", self.shell.as_str()])
        }
    }

    fn conda_shell(&self) -> String {
        format!("shell.{}", self.shell.as_str())
    }
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
