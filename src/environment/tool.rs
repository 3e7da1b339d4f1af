//! Environment Manager Discovery
//!
//! Locates the conda/mamba/micromamba binary.
//!
//! # Resolution Priority
//!
//! 1. Explicit path from configuration
//! 2. `CONDA_EXE` / `MAMBA_EXE`, exported by the manager's own shell hook
//! 3. Next to the envprovision executable
//! 4. Each directory on `PATH` (honouring `PATHEXT` on Windows)
//! 5. The bare tool name, left for the OS to resolve

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File extensions tried when probing a directory for the tool.
static EXECUTABLE_EXTENSIONS: Lazy<Vec<String>> = Lazy::new(|| {
    if cfg!(windows) {
        let pathext = env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
        pathext
            .split(';')
            .filter(|ext| !ext.is_empty())
            .map(|ext| ext.to_ascii_lowercase())
            .collect()
    } else {
        vec![String::new()]
    }
});

/// Supported environment managers.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Conda,
    Mamba,
    Micromamba,
}

impl ToolKind {
    /// Executable name without extension.
    pub fn binary_name(&self) -> &'static str {
        match self {
            Self::Conda => "conda",
            Self::Mamba => "mamba",
            Self::Micromamba => "micromamba",
        }
    }

    /// Variable the manager's shell hook sets to its own binary.
    pub fn exe_var(&self) -> &'static str {
        match self {
            Self::Conda => "CONDA_EXE",
            Self::Mamba | Self::Micromamba => "MAMBA_EXE",
        }
    }

    /// True for managers that accept conda's `shell.<name>` / `env update` syntax.
    pub fn is_conda_compatible(&self) -> bool {
        matches!(self, Self::Conda | Self::Mamba)
    }
}

impl FromStr for ToolKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conda" => Ok(Self::Conda),
            "mamba" => Ok(Self::Mamba),
            "micromamba" => Ok(Self::Micromamba),
            other => Err(ConfigError::InvalidValue {
                field: "tool",
                reason: format!("expected conda, mamba or micromamba, got '{}'", other),
            }),
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Where a tool binary was found.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolSource {
    Explicit,
    EnvVar(String),
    BesideExecutable,
    SearchPath,
    /// Not found; the bare name is handed to the OS
    Unresolved,
}

/// A resolved tool binary.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ToolLocation {
    pub kind: ToolKind,
    pub path: PathBuf,
    pub source: ToolSource,
}

/// Discovery inputs, captured once so resolution is deterministic in tests.
#[derive(Debug, Clone, Default)]
pub struct ToolLocator {
    exe_dir: Option<PathBuf>,
    search_path: Option<OsString>,
    exe_vars: Vec<(String, PathBuf)>,
}

impl ToolLocator {
    /// Creates a locator with no inputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures discovery inputs from the running process.
    pub fn from_env() -> Self {
        let exe_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        let exe_vars = ["CONDA_EXE", "MAMBA_EXE"]
            .iter()
            .filter_map(|name| {
                env::var_os(name)
                    .filter(|v| !v.is_empty())
                    .map(|v| (name.to_string(), PathBuf::from(v)))
            })
            .collect();

        Self {
            exe_dir,
            search_path: env::var_os("PATH"),
            exe_vars,
        }
    }

    /// Sets the directory treated as the executable's own.
    pub fn with_exe_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exe_dir = Some(dir.into());
        self
    }

    /// Sets the `PATH`-style search list.
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    /// Records a manager-exported variable such as `CONDA_EXE`.
    pub fn with_exe_var(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.exe_vars.push((name.into(), path.into()));
        self
    }

    /// Resolves the binary for `kind`.
    pub fn resolve(&self, kind: ToolKind, explicit: Option<&Path>) -> ToolLocation {
        let found = |path: PathBuf, source: ToolSource| {
            info!("Using {} ({:?}): {}", kind, source, path.display());
            ToolLocation { kind, path, source }
        };

        if let Some(path) = explicit {
            if !path.exists() {
                warn!("Configured tool path does not exist: {}", path.display());
            }
            return found(path.to_path_buf(), ToolSource::Explicit);
        }

        let var = kind.exe_var();
        if let Some((_, path)) = self.exe_vars.iter().find(|(name, _)| name == var) {
            if is_executable(path) && names_tool(path, kind) {
                return found(path.clone(), ToolSource::EnvVar(var.to_string()));
            }
            debug!("Ignoring {}={} for {}", var, path.display(), kind);
        }

        if let Some(dir) = &self.exe_dir {
            if let Some(path) = probe_dir(dir, kind.binary_name()) {
                return found(path, ToolSource::BesideExecutable);
            }
        }

        if let Some(search_path) = &self.search_path {
            for dir in env::split_paths(search_path) {
                if let Some(path) = probe_dir(&dir, kind.binary_name()) {
                    return found(path, ToolSource::SearchPath);
                }
            }
        }

        warn!("{} binary not found", kind);
        if let Some(dir) = &self.exe_dir {
            warn!("  Searched: {}", dir.display());
        }
        warn!("  Searched: {} and system PATH", var);

        ToolLocation {
            kind,
            path: PathBuf::from(kind.binary_name()),
            source: ToolSource::Unresolved,
        }
    }
}

/// Resolves `kind` against the running process's environment.
pub fn resolve_tool(kind: ToolKind, explicit: Option<&Path>) -> ToolLocation {
    ToolLocator::from_env().resolve(kind, explicit)
}

fn probe_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    EXECUTABLE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}{}", name, ext)))
        .find(|candidate| is_executable(candidate))
}

/// `CONDA_EXE` under a mamba install points at conda, not mamba.
fn names_tool(path: &Path, kind: ToolKind) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|stem| stem.eq_ignore_ascii_case(kind.binary_name()))
        .unwrap_or(false)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn make_tool(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(format!("{}{}", name, EXECUTABLE_EXTENSIONS[0]));
        fs::write(&path, "#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    #[test]
    fn test_tool_kind_from_str() {
        assert_eq!("conda".parse::<ToolKind>().unwrap(), ToolKind::Conda);
        assert_eq!("Micromamba".parse::<ToolKind>().unwrap(), ToolKind::Micromamba);
        assert!("pip".parse::<ToolKind>().is_err());
    }

    #[test]
    fn test_tool_kind_exe_var() {
        assert_eq!(ToolKind::Conda.exe_var(), "CONDA_EXE");
        assert_eq!(ToolKind::Micromamba.exe_var(), "MAMBA_EXE");
        assert!(ToolKind::Mamba.is_conda_compatible());
        assert!(!ToolKind::Micromamba.is_conda_compatible());
    }

    #[test]
    fn test_resolve_explicit_wins() {
        let dir = tempdir().unwrap();
        let on_path = make_tool(dir.path(), "conda");

        let location = ToolLocator::new()
            .with_search_path(dir.path().as_os_str())
            .resolve(ToolKind::Conda, Some(Path::new("/custom/conda")));

        assert_eq!(location.source, ToolSource::Explicit);
        assert_eq!(location.path, PathBuf::from("/custom/conda"));
        assert_ne!(location.path, on_path);
    }

    #[test]
    fn test_resolve_exe_var_before_path() {
        let env_dir = tempdir().unwrap();
        let path_dir = tempdir().unwrap();
        let from_var = make_tool(env_dir.path(), "conda");
        make_tool(path_dir.path(), "conda");

        let location = ToolLocator::new()
            .with_exe_var("CONDA_EXE", &from_var)
            .with_search_path(path_dir.path().as_os_str())
            .resolve(ToolKind::Conda, None);

        assert_eq!(location.source, ToolSource::EnvVar("CONDA_EXE".to_string()));
        assert_eq!(location.path, from_var);
    }

    #[test]
    fn test_resolve_ignores_exe_var_for_other_tool() {
        let env_dir = tempdir().unwrap();
        let conda = make_tool(env_dir.path(), "conda");

        let location = ToolLocator::new()
            .with_exe_var("MAMBA_EXE", &conda)
            .resolve(ToolKind::Micromamba, None);

        assert_eq!(location.source, ToolSource::Unresolved);
    }

    #[test]
    fn test_resolve_beside_executable() {
        let dir = tempdir().unwrap();
        let bundled = make_tool(dir.path(), "micromamba");

        let location = ToolLocator::new()
            .with_exe_dir(dir.path())
            .resolve(ToolKind::Micromamba, None);

        assert_eq!(location.source, ToolSource::BesideExecutable);
        assert_eq!(location.path, bundled);
    }

    #[test]
    fn test_resolve_search_path_order() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        make_tool(second.path(), "mamba");
        let expected = make_tool(first.path(), "mamba");

        let search = env::join_paths([first.path(), second.path()]).unwrap();
        let location = ToolLocator::new()
            .with_search_path(search)
            .resolve(ToolKind::Mamba, None);

        assert_eq!(location.source, ToolSource::SearchPath);
        assert_eq!(location.path, expected);
    }

    #[test]
    fn test_resolve_unresolved_falls_back_to_name() {
        let empty = tempdir().unwrap();
        let location = ToolLocator::new()
            .with_search_path(empty.path().as_os_str())
            .resolve(ToolKind::Conda, None);

        assert_eq!(location.source, ToolSource::Unresolved);
        assert_eq!(location.path, PathBuf::from("conda"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_file_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("conda"), "not a program").unwrap();

        let location = ToolLocator::new()
            .with_search_path(dir.path().as_os_str())
            .resolve(ToolKind::Conda, None);

        assert_eq!(location.source, ToolSource::Unresolved);
    }
}
