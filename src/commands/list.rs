//! List command
//!
//! Shows the configured extensions and where their artifacts end up.

use anyhow::{Context, Result};
use ccpd_build::{Config, Host};
use std::path::Path;

/// Print every configured extension.
pub(crate) fn run(project_root: &Path, config_path: Option<&str>) -> Result<()> {
    let config = Config::load(project_root, config_path)?;
    let specs = config
        .extension_specs()
        .context("Invalid extension configuration")?;

    if specs.is_empty() {
        println!("No extensions configured");
        return Ok(());
    }

    let suffix = Host::current().shared_library_suffix();
    let destination = Path::new(&config.destination);

    for spec in &specs {
        println!("{} ({})", spec.name(), spec.kind().description());
        println!("  target: {}", spec.target());
        if spec.kind().needs_copy() {
            println!(
                "  artifact: {}",
                spec.artifact_path_under(destination, suffix).display()
            );
        }
    }

    Ok(())
}
