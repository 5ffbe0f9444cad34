//! Extension Builder Orchestration
//!
//! Runs Bazel for one extension at a time inside a patched `WORKSPACE` and
//! moves bare shared libraries from `bazel-bin` into the package tree.
//!
//! Build process for one extension:
//! ```bash
//! sed -i 's|<PYTHON_INCLUDE_PATH>|/usr/include/python3.12|' WORKSPACE
//! bazel build //ccpd/cc_libraries:py_constants --symlink_prefix=$TMP/bazel- ...
//! cp $TMP/bazel-bin/ccpd/cc_libraries/_constants.so build/lib/ccpd/cc_libraries/
//! git checkout WORKSPACE
//! ```

use super::invocation::{BuildInvocation, HostEnv};
use super::types::{BuildMode, BuildReport, ExtensionKind, ExtensionSpec};
use super::workspace::{WorkspaceError, with_patched_workspace};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often a running Bazel client is checked for a stop request
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors from building a single extension
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("failed to run `{invocation}`")]
    Spawn {
        invocation: String,
        #[source]
        source: io::Error,
    },

    #[error("`{invocation}` failed with {status}")]
    Failed {
        invocation: String,
        status: ExitStatus,
    },

    #[error("`{invocation}` was stopped before it finished")]
    Interrupted { invocation: String },

    #[error("failed to copy {} to {}", .from.display(), .to.display())]
    ArtifactPlacement {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    /// Check if the workspace file may be left patched.
    ///
    /// No further builds may run after such an error.
    #[must_use]
    pub const fn is_workspace_corruption(&self) -> bool {
        matches!(self, Self::Workspace(WorkspaceError::Corruption { .. }))
    }
}

/// A request to stop building, shared with the signal handler
///
/// Once set, the running Bazel client is killed and no further extension
/// starts. Shutdown still runs.
#[derive(Debug, Clone, Default)]
pub struct StopRequest(Arc<AtomicBool>);

impl StopRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything the orchestrator needs besides the extension itself
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Bazel executable
    pub bazel: PathBuf,
    /// Bazel workspace root (working directory for Bazel)
    pub project_root: PathBuf,
    /// File holding the include path placeholder, usually `WORKSPACE`
    pub workspace_file: PathBuf,
    /// Placeholder token to replace
    pub placeholder: String,
    /// Python include directory, already in forward-slash form
    pub include_path: String,
    /// Private directory for Bazel's convenience symlinks
    pub build_temp: PathBuf,
    /// Host facts that shape the command line
    pub host_env: HostEnv,
}

/// Builds extensions one at a time
///
/// The `WORKSPACE` file is shared by every build, so builds never overlap.
#[derive(Debug)]
pub struct BuildOrchestrator {
    settings: BuildSettings,
    verbose: bool,
    stop: StopRequest,
}

impl BuildOrchestrator {
    #[must_use]
    pub fn new(settings: BuildSettings, verbose: bool) -> Self {
        Self {
            settings,
            verbose,
            stop: StopRequest::new(),
        }
    }

    /// Make builds honour `stop`.
    #[must_use]
    pub fn with_stop_request(mut self, stop: StopRequest) -> Self {
        self.stop = stop;
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// `<build_temp>/bazel-`
    #[must_use]
    pub fn symlink_prefix(&self) -> PathBuf {
        self.settings.build_temp.join("bazel-")
    }

    /// `<build_temp>/bazel-bin`
    #[must_use]
    pub fn bazel_bin(&self) -> PathBuf {
        self.settings.build_temp.join("bazel-bin")
    }

    /// The command that [`build`](Self::build) would run for `spec`.
    #[must_use]
    pub fn invocation(&self, spec: &ExtensionSpec, mode: BuildMode) -> BuildInvocation {
        BuildInvocation::new(
            &self.settings.bazel,
            spec.target(),
            mode,
            &self.symlink_prefix(),
            &self.settings.host_env,
        )
    }

    /// Where Bazel leaves a bare shared library.
    #[must_use]
    pub fn source_artifact(&self, spec: &ExtensionSpec) -> PathBuf {
        spec.artifact_path_under(&self.bazel_bin(), self.suffix())
    }

    /// Where a bare shared library goes in the package tree.
    #[must_use]
    pub fn destination_artifact(&self, spec: &ExtensionSpec, destination_root: &Path) -> PathBuf {
        spec.artifact_path_under(destination_root, self.suffix())
    }

    fn suffix(&self) -> &'static str {
        self.settings.host_env.host.shared_library_suffix()
    }

    /// Build one extension.
    ///
    /// The workspace file is patched for the Bazel run and restored before
    /// this returns, on success and on failure.
    pub fn build(
        &self,
        spec: &ExtensionSpec,
        mode: BuildMode,
        destination_root: &Path,
    ) -> Result<BuildReport, BuildError> {
        let start_time = Instant::now();
        let invocation = self.invocation(spec, mode);

        if self.stop.is_requested() {
            return Err(BuildError::Interrupted {
                invocation: invocation.to_string(),
            });
        }

        crate::debug!("Building extension: {} ({})", spec.name(), spec.target());
        crate::debug!("Temporary build directory: {}", self.settings.build_temp.display());

        with_patched_workspace(
            &self.settings.workspace_file,
            &self.settings.placeholder,
            &self.settings.include_path,
            || {
                if self.verbose {
                    println!("  Running: {invocation}");
                }
                execute_until_stopped(&invocation, &self.settings.project_root, &self.stop)
            },
        )?;

        let artifact = match spec.kind() {
            ExtensionKind::BindingModule => None,
            ExtensionKind::SharedLibrary => Some(self.place_artifact(spec, destination_root)?),
        };

        crate::debug!("Extension built successfully: {}", spec.name());

        Ok(BuildReport {
            name: spec.name().to_string(),
            kind: spec.kind(),
            duration: start_time.elapsed(),
            artifact,
        })
    }

    /// Stop the Bazel server started by earlier builds.
    ///
    /// Runs to completion even after a stop request.
    pub fn shutdown(&self) -> Result<(), BuildError> {
        let invocation = BuildInvocation::shutdown(&self.settings.bazel);
        if self.verbose {
            println!("  Running: {invocation}");
        }
        execute(&invocation, &self.settings.project_root)
    }

    /// Copy `bazel-bin/<rel>/<name><suffix>` to `<destination>/<rel>/<name><suffix>`.
    fn place_artifact(
        &self,
        spec: &ExtensionSpec,
        destination_root: &Path,
    ) -> Result<PathBuf, BuildError> {
        let from = self.source_artifact(spec);
        let to = self.destination_artifact(spec, destination_root);

        crate::debug!("ext_bazel_bin_path: {}", from.display());
        crate::debug!("ext_dest_path: {}", to.display());

        let placement_error = |source| BuildError::ArtifactPlacement {
            from: from.clone(),
            to: to.clone(),
            source,
        };

        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).map_err(placement_error)?;
        }
        std::fs::copy(&from, &to).map_err(placement_error)?;

        if self.verbose {
            println!("  Copied extension: {} -> {}", from.display(), to.display());
        }

        Ok(to)
    }

    /// Summarize build reports.
    ///
    /// # Returns
    /// (`built_count`, `copied_count`, `total_duration`)
    #[must_use]
    pub fn summarize(reports: &[BuildReport]) -> (usize, usize, Duration) {
        let copied = reports.iter().filter(|r| r.artifact.is_some()).count();
        let total_duration = reports.iter().map(|r| r.duration).sum();

        (reports.len(), copied, total_duration)
    }
}

/// Run a Bazel command synchronously in `working_dir`.
pub fn execute(invocation: &BuildInvocation, working_dir: &Path) -> Result<(), BuildError> {
    crate::debug!("Running: {invocation}");

    let status = command(invocation, working_dir)
        .status()
        .map_err(|source| spawn_error(invocation, source))?;

    check_status(invocation, status)
}

/// Like [`execute`], but kills the client once `stop` is requested.
pub fn execute_until_stopped(
    invocation: &BuildInvocation,
    working_dir: &Path,
    stop: &StopRequest,
) -> Result<(), BuildError> {
    crate::debug!("Running: {invocation}");

    let mut child = command(invocation, working_dir)
        .spawn()
        .map_err(|source| spawn_error(invocation, source))?;

    let status = loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|source| spawn_error(invocation, source))?
        {
            break status;
        }

        if stop.is_requested() {
            crate::debug!("Stop requested, killing {}", invocation.program().display());
            if let Err(e) = child.kill() {
                // Exited between the two checks.
                crate::debug!("Failed to kill Bazel client: {e}");
            }
            child
                .wait()
                .map_err(|source| spawn_error(invocation, source))?;
            return Err(BuildError::Interrupted {
                invocation: invocation.to_string(),
            });
        }

        std::thread::sleep(STOP_POLL_INTERVAL);
    };

    check_status(invocation, status)
}

/// Output is inherited so Bazel's progress reaches the terminal.
fn command(invocation: &BuildInvocation, working_dir: &Path) -> Command {
    let mut command = Command::new(invocation.program());
    command.args(invocation.args()).current_dir(working_dir);
    command
}

fn spawn_error(invocation: &BuildInvocation, source: io::Error) -> BuildError {
    BuildError::Spawn {
        invocation: invocation.to_string(),
        source,
    }
}

fn check_status(invocation: &BuildInvocation, status: ExitStatus) -> Result<(), BuildError> {
    if !status.success() {
        return Err(BuildError::Failed {
            invocation: invocation.to_string(),
            status,
        });
    }

    Ok(())
}
