#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Stand-in for conda: logs every call with the proxy variables it saw and
/// keeps a registry of environments as files under `$FAKE_CONDA_STATE`.
const FAKE_CONDA: &str = r##"#!/bin/sh
echo "$* | HTTP_PROXY=${HTTP_PROXY:-} HTTPS_PROXY=${HTTPS_PROXY:-} REQUESTS_CA_BUNDLE=${REQUESTS_CA_BUNDLE:-}" >> "$FAKE_CONDA_LOG"
case "$1 $2" in
  "env list")
    echo "# conda environments:"
    echo "#"
    echo "base                     /opt/conda"
    for f in "$FAKE_CONDA_STATE"/*; do
      [ -e "$f" ] && echo "$(basename "$f")   /opt/conda/envs/$(basename "$f")"
    done
    exit 0
    ;;
  "env update")
    if [ ! -f "$6" ]; then
      echo "EnvironmentFileNotFound: '$6' file not found" >&2
      exit 1
    fi
    touch "$FAKE_CONDA_STATE/$4"
    echo "# To activate this environment, use"
    echo "#     \$ conda activate $4"
    exit 0
    ;;
esac
exit 0
"##;

pub struct TestEnv {
    _tmp: TempDir,
    pub work: PathBuf,
    pub conda: PathBuf,
    pub log: PathBuf,
    pub state: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let work = tmp.path().join("work");
        let state = tmp.path().join("envs");
        fs::create_dir_all(&work).expect("create work dir");
        fs::create_dir_all(&state).expect("create state dir");

        let conda = make_fake_conda(tmp.path());
        let log = tmp.path().join("conda.log");

        Self {
            _tmp: tmp,
            work,
            conda,
            log,
            state,
        }
    }

    /// Writes a minimal environment spec into the work dir.
    pub fn with_spec(self) -> Self {
        fs::write(
            self.work.join("environment.yml"),
            "name: analytics\ndependencies:\n  - python=3.11\n  - requests\n",
        )
        .expect("write spec");
        self
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("envprovision");
        cmd.env("FAKE_CONDA_LOG", &self.log)
            .env("FAKE_CONDA_STATE", &self.state)
            .env("NO_COLOR", "1")
            .env_remove("CONDA_DEFAULT_ENV")
            .env_remove("HTTP_PROXY")
            .env_remove("HTTPS_PROXY")
            .env_remove("REQUESTS_CA_BUNDLE")
            .env_remove("RUST_LOG")
            .arg("--working-dir")
            .arg(&self.work)
            .arg("--no-pause");
        cmd
    }

    /// Command wired to the fake conda binary.
    pub fn provision(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.arg("--tool-path").arg(&self.conda);
        cmd
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.state)
            .expect("read state dir")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn report(&self, name: &str) -> Value {
        let raw = fs::read_to_string(self.work.join(name)).expect("report written");
        serde_json::from_str(&raw).expect("valid report json")
    }
}

fn make_fake_conda(base: &Path) -> PathBuf {
    let path = base.join("conda");
    fs::write(&path, FAKE_CONDA).expect("write fake conda");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake conda");
    }

    path
}
