//! Shutdown command
//!
//! Stops a Bazel server left behind by an interrupted build.

use anyhow::{Context, Result};
use ccpd_build::{BuildInvocation, Config};
use std::path::{Path, PathBuf};

pub(crate) fn run(project_root: &Path, config_path: Option<&str>) -> Result<()> {
    let config = Config::load(project_root, config_path)?;
    let bazel = ccpd_build::env_vars::bazel()
        .or(config.bazel)
        .unwrap_or_else(|| "bazel".to_string());

    ccpd_build::extensions::execute(
        &BuildInvocation::shutdown(&PathBuf::from(bazel)),
        project_root,
    )
    .context("Failed to shut down the Bazel server")
}
