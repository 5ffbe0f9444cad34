//! Build command
//!
//! Builds every configured native extension with Bazel, in order, then stops
//! the Bazel server. This is what the packaging step runs before collecting
//! the package tree.

use anyhow::{Context, Result};
use ccpd_build::extensions::{
    BuildError, BuildMode, BuildOrchestrator, BuildReport, BuildSettings, ExtensionSpec, HostEnv,
    StopRequest,
};
use ccpd_build::{Config, Host, Python, to_posix};
use clap::Args;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Args)]
pub(crate) struct BuildArgs {
    /// Compile with `--compilation_mode=dbg`
    #[arg(long, short = 'g')]
    debug: bool,

    /// Place shared libraries next to the sources instead of the build tree
    #[arg(long, conflicts_with = "dest")]
    inplace: bool,

    /// Destination package tree for copied shared libraries
    #[arg(long)]
    dest: Option<String>,

    /// Directory for Bazel's convenience symlinks (a fresh temp dir by default)
    #[arg(long)]
    build_temp: Option<String>,

    /// Bazel executable
    #[arg(long)]
    bazel: Option<String>,

    /// Python interpreter to take the include directory from
    #[arg(long)]
    python: Option<String>,

    /// Python include directory (skips asking the interpreter)
    #[arg(long)]
    python_include: Option<String>,

    /// Additional linker search path (Windows, repeatable)
    #[arg(long = "library-dir")]
    library_dirs: Vec<String>,

    /// Only build the named extension (repeatable)
    #[arg(long = "extension", short = 'e')]
    extensions: Vec<String>,

    /// Print the Bazel commands without patching or building anything
    #[arg(long)]
    dry_run: bool,
}

/// Build all selected extensions.
pub(crate) fn run(
    args: &BuildArgs,
    project_root: &Path,
    config_path: Option<&str>,
    verbose: bool,
    stop: &StopRequest,
) -> Result<()> {
    let config = Config::load(project_root, config_path)?;

    // Every declaration is validated before anything expensive happens.
    let specs = select(
        config
            .extension_specs()
            .context("Invalid extension configuration")?,
        &args.extensions,
    )?;

    let mode = BuildMode::from_debug_flag(args.debug);
    let destination = if args.inplace {
        project_root.to_path_buf()
    } else {
        Config::resolve(
            project_root,
            args.dest.as_deref().unwrap_or(&config.destination),
        )
    };

    let (build_temp, _temp_guard) = build_temp(args, &config, project_root)?;
    let python = Python::locate(args.python.as_deref().or(config.python.as_deref()));

    let include_path = match args
        .python_include
        .as_deref()
        .or(config.python_include.as_deref())
    {
        Some(path) => to_posix(Path::new(path))?,
        None if args.dry_run => config.placeholder.clone(),
        None => to_posix(&python.include_dir()?)?,
    };

    let host = Host::current();
    let mut library_dirs: Vec<PathBuf> = args
        .library_dirs
        .iter()
        .chain(&config.library_dirs)
        .map(PathBuf::from)
        .collect();
    if host.is_windows() && !args.dry_run {
        // setuptools links against <exec_prefix>/libs on Windows.
        library_dirs.push(python.libs_dir()?);
    }

    let bazel = args
        .bazel
        .clone()
        .or_else(ccpd_build::env_vars::bazel)
        .or_else(|| config.bazel.clone())
        .unwrap_or_else(|| "bazel".to_string());

    let orchestrator = BuildOrchestrator::new(
        BuildSettings {
            bazel: PathBuf::from(bazel),
            project_root: project_root.to_path_buf(),
            workspace_file: Config::resolve(project_root, &config.workspace),
            placeholder: config.placeholder.clone(),
            include_path,
            build_temp,
            host_env: HostEnv::detect(library_dirs),
        },
        verbose,
    )
    .with_stop_request(stop.clone());

    ccpd_build::debug!("Host: {}", orchestrator.settings().host_env.host);
    ccpd_build::debug!("Python include path: {}", orchestrator.settings().include_path);
    ccpd_build::debug!("Destination: {}", destination.display());

    if args.dry_run {
        print_plan(&orchestrator, &specs, mode, &destination);
        return Ok(());
    }

    let mut reports = Vec::with_capacity(specs.len());
    let outcome = build_all(&specs, &mut reports, |spec| {
        orchestrator.build(spec, mode, &destination)
    });

    // Stop the Bazel server even when a build failed, so no daemon is left
    // running after packaging.
    let shutdown = orchestrator.shutdown();

    outcome?;
    shutdown.context("Failed to shut down the Bazel server")?;

    let (built, copied, duration) = BuildOrchestrator::summarize(&reports);
    println!(
        "Built {built} extension(s), copied {copied} shared librar{} in {:.2}s",
        if copied == 1 { "y" } else { "ies" },
        duration.as_secs_f64()
    );

    Ok(())
}

/// Build `specs` in order, stopping at the first failure.
fn build_all<F>(specs: &[ExtensionSpec], reports: &mut Vec<BuildReport>, mut build: F) -> Result<()>
where
    F: FnMut(&ExtensionSpec) -> Result<BuildReport, BuildError>,
{
    for spec in specs {
        println!(
            "Building {} ({}, {})...",
            spec.name(),
            spec.target(),
            spec.kind().description()
        );

        match build(spec) {
            Ok(report) => {
                if let Some(artifact) = &report.artifact {
                    println!("  Installed {}", artifact.display());
                }
                reports.push(report);
            }
            Err(e) if e.is_workspace_corruption() => {
                return Err(e).context(format!(
                    "Stopped after {}: repair the workspace file before building again",
                    spec.name()
                ));
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to build extension {}", spec.name()));
            }
        }
    }

    Ok(())
}

fn print_plan(
    orchestrator: &BuildOrchestrator,
    specs: &[ExtensionSpec],
    mode: BuildMode,
    destination: &Path,
) {
    let settings = orchestrator.settings();
    println!(
        "Would patch {} ({} -> {})",
        settings.workspace_file.display(),
        settings.placeholder,
        settings.include_path
    );

    for spec in specs {
        println!("{}", orchestrator.invocation(spec, mode));
        if spec.kind().needs_copy() {
            println!(
                "  copy {} -> {}",
                orchestrator.source_artifact(spec).display(),
                orchestrator.destination_artifact(spec, destination).display()
            );
        }
    }

    println!("{}", ccpd_build::BuildInvocation::shutdown(&settings.bazel));
}

/// Keep only the requested extensions, preserving configuration order.
fn select(specs: Vec<ExtensionSpec>, names: &[String]) -> Result<Vec<ExtensionSpec>> {
    if names.is_empty() {
        return Ok(specs);
    }

    if let Some(unknown) = names
        .iter()
        .find(|name| !specs.iter().any(|spec| spec.name() == name.as_str()))
    {
        anyhow::bail!("Unknown extension: {unknown}");
    }

    Ok(specs
        .into_iter()
        .filter(|spec| names.iter().any(|name| name == spec.name()))
        .collect())
}

/// Resolve the symlink prefix directory.
///
/// The returned `TempDir` must outlive every build that uses the path.
fn build_temp(
    args: &BuildArgs,
    config: &Config,
    project_root: &Path,
) -> Result<(PathBuf, Option<TempDir>)> {
    if let Some(dir) = args.build_temp.as_deref().or(config.build_temp.as_deref()) {
        let dir = Config::resolve(project_root, dir);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create build directory: {}", dir.display()))?;
        return Ok((dir, None));
    }

    let temp = tempfile::Builder::new()
        .prefix("ccpd-build-")
        .tempdir()
        .context("Failed to create temporary build directory")?;
    Ok((temp.path().to_path_buf(), Some(temp)))
}
