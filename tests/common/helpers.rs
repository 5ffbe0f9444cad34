//! Shared test helpers and utilities

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// `WORKSPACE` content used by most tests
pub(crate) const WORKSPACE: &str = r#"workspace(name = "ccpd")

new_local_repository(
    name = "python_headers",
    path = "<PYTHON_INCLUDE_PATH>",
    build_file = "//third_party:python_headers.BUILD",
)
"#;

/// Include path passed with `--python-include`
pub(crate) const PYTHON_INCLUDE: &str = "/opt/python/include/python3.12";

/// Stand-in for Bazel.
///
/// Appends its arguments to `$FAKE_BAZEL_LOG`, copies `WORKSPACE` as it saw it
/// to `$FAKE_BAZEL_SEEN`, sleeps `$FAKE_BAZEL_SLEEP` seconds if set, exits with
/// `$FAKE_BAZEL_EXIT` if set, and otherwise writes `$FAKE_BAZEL_ARTIFACT` under
/// `<symlink_prefix>bin/<package>/`.
const FAKE_BAZEL: &str = r#"#!/bin/sh
echo "$*" >> "$FAKE_BAZEL_LOG"
if [ "$1" = "shutdown" ]; then
  exit 0
fi
cat WORKSPACE > "$FAKE_BAZEL_SEEN.partial"
mv "$FAKE_BAZEL_SEEN.partial" "$FAKE_BAZEL_SEEN"
if [ -n "$FAKE_BAZEL_SLEEP" ]; then
  sleep "$FAKE_BAZEL_SLEEP"
fi
if [ -n "$FAKE_BAZEL_EXIT" ]; then
  exit "$FAKE_BAZEL_EXIT"
fi
prefix=""
for arg in "$@"; do
  case "$arg" in
    --symlink_prefix=*) prefix="${arg#--symlink_prefix=}" ;;
  esac
done
if [ -n "$FAKE_BAZEL_ARTIFACT" ]; then
  rel="${2#//}"
  rel="${rel%%:*}"
  mkdir -p "${prefix}bin/$rel"
  printf '%s' "shared object for $2" > "${prefix}bin/$rel/$FAKE_BAZEL_ARTIFACT"
fi
exit 0
"#;

/// Get the path to the ccpd-build binary
///
/// This is shared across all integration tests to avoid duplication.
pub(crate) fn ccpd_build_binary() -> &'static str {
    env!("CARGO_BIN_EXE_ccpd-build")
}

/// A temporary Bazel project wired to the fake `bazel`
pub(crate) struct Project {
    dir: TempDir,
}

impl Project {
    /// Create a project with `WORKSPACE` and a config file.
    ///
    /// `extra_config` is appended to the generated `ccpd-build.toml`, e.g.
    /// `[[extension]]` tables.
    pub(crate) fn new(extra_config: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let project = Self { dir };

        fs::write(project.path().join("WORKSPACE"), WORKSPACE).expect("Failed to write WORKSPACE");

        let bazel = project.path().join("fake-bazel");
        fs::write(&bazel, FAKE_BAZEL).expect("Failed to write fake bazel");
        fs::set_permissions(&bazel, fs::Permissions::from_mode(0o755))
            .expect("Failed to make fake bazel executable");

        let config = format!(
            "bazel = \"{}\"\nbuild_temp = \"bt\"\ndestination = \"dist\"\n{extra_config}",
            bazel.display()
        );
        fs::write(project.path().join("ccpd-build.toml"), config)
            .expect("Failed to write ccpd-build.toml");

        project
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `ccpd-build -C <project> <args>` with the fake Bazel environment set
    pub(crate) fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(ccpd_build_binary());
        cmd.arg("-C")
            .arg(self.path())
            .args(args)
            .env("FAKE_BAZEL_LOG", self.bazel_log_path())
            .env("FAKE_BAZEL_SEEN", self.seen_workspace_path())
            .env_remove("BAZEL")
            .env_remove("CCPD_BUILD_CONFIG")
            .env_remove("FAKE_BAZEL_EXIT")
            .env_remove("FAKE_BAZEL_SLEEP")
            .env_remove("FAKE_BAZEL_ARTIFACT");
        cmd
    }

    /// `ccpd-build build --python-include <PYTHON_INCLUDE> <args>`
    pub(crate) fn build_command(&self, args: &[&str]) -> Command {
        let mut cmd = self.command(&["build", "--python-include", PYTHON_INCLUDE]);
        cmd.args(args);
        cmd
    }

    pub(crate) fn bazel_log_path(&self) -> PathBuf {
        self.path().join("bazel-calls.log")
    }

    pub(crate) fn seen_workspace_path(&self) -> PathBuf {
        self.path().join("seen-WORKSPACE")
    }

    /// Lines Bazel was invoked with (empty if it never ran)
    pub(crate) fn bazel_calls(&self) -> Vec<String> {
        fs::read_to_string(self.bazel_log_path())
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub(crate) fn workspace(&self) -> String {
        fs::read_to_string(self.path().join("WORKSPACE")).expect("Failed to read WORKSPACE")
    }
}
