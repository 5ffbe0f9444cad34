//! Python interpreter queries
//!
//! The extensions compile against the headers of the interpreter that is
//! running the packaging step, so the include directory is asked from that
//! interpreter rather than guessed.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

const INCLUDE_DIR_SCRIPT: &str = "import sysconfig; print(sysconfig.get_paths()['include'])";
const LIBS_DIR_SCRIPT: &str = "import os, sys; print(os.path.join(sys.exec_prefix, 'libs'))";

/// Default interpreter name for this host
#[must_use]
pub const fn default_interpreter() -> &'static str {
    if cfg!(windows) { "python" } else { "python3" }
}

/// A Python interpreter to query
#[derive(Debug, Clone)]
pub struct Python {
    executable: PathBuf,
}

impl Python {
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Find the interpreter.
    ///
    /// Priority order:
    /// 1. explicit path (CLI or config)
    /// 2. `PYTHON` environment variable
    /// 3. `python3` (`python` on Windows) in `PATH`
    #[must_use]
    pub fn locate(explicit: Option<&str>) -> Self {
        let executable = explicit
            .map(str::to_string)
            .or_else(crate::env_vars::python)
            .unwrap_or_else(|| default_interpreter().to_string());
        Self::new(executable)
    }

    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Directory holding `Python.h`.
    pub fn include_dir(&self) -> Result<PathBuf> {
        self.run_script(INCLUDE_DIR_SCRIPT)
            .map(PathBuf::from)
            .context("Failed to query the Python include directory")
    }

    /// Directory holding `python3*.lib` (meaningful on Windows only).
    pub fn libs_dir(&self) -> Result<PathBuf> {
        self.run_script(LIBS_DIR_SCRIPT)
            .map(PathBuf::from)
            .context("Failed to query the Python libs directory")
    }

    fn run_script(&self, script: &str) -> Result<String> {
        let output = Command::new(&self.executable)
            .args(["-c", script])
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                self.executable.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let value = String::from_utf8(output.stdout)
            .context("Python printed a non UTF-8 path")?
            .trim()
            .to_string();

        if value.is_empty() {
            anyhow::bail!("{} printed nothing", self.executable.display());
        }

        crate::debug!("{} -> {value}", self.executable.display());
        Ok(value)
    }
}

/// Render a path with forward slashes, as Bazel expects in `WORKSPACE`.
///
/// Fails for paths that are not valid UTF-8, since they cannot be written
/// into the file unchanged.
pub fn to_posix(path: &Path) -> Result<String> {
    let Some(path) = path.to_str() else {
        anyhow::bail!("Path is not valid UTF-8: {}", path.display());
    };
    Ok(path.replace('\\', "/"))
}
