//! ccpd-build command-line interface
//!
//! Builds the Bazel-defined native extensions of the ccpd package

use anyhow::Context;
use ccpd_build::StopRequest;
use clap::{Parser, Subcommand};
use signals::Termination;
use std::path::PathBuf;
use std::process;

/// Display an error with optional backtrace information
fn display_error(err: &anyhow::Error, backtrace_enabled: bool) {
    eprintln!("error: {err}");

    // Show error chain
    let mut source = err.source();
    while let Some(err) = source {
        eprintln!("caused by: {err}");
        source = err.source();
    }

    // Show backtrace if enabled
    if backtrace_enabled {
        let backtrace = err.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            eprintln!("\nBacktrace:");
            eprintln!("{backtrace}");
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "ccpd-build")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build the native extensions of the ccpd package with Bazel", long_about = None)]
struct Cli {
    /// Print debug output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Also write debug output to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Path to ccpd-build.toml
    #[arg(long, global = true)]
    config: Option<String>,

    /// Bazel workspace root (defaults to the current directory)
    #[arg(long, short = 'C', global = true)]
    project_root: Option<PathBuf>,

    /// Show backtraces for errors (requires `RUST_BACKTRACE=1`)
    #[arg(long, global = true)]
    backtrace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build all configured extensions and place them in the package tree
    Build(commands::build::BuildArgs),

    /// List configured extensions
    List,

    /// Stop the Bazel server
    Shutdown,
}

/// Run the selected command on the current (blocking) thread.
fn dispatch(cli: &Cli, stop: &StopRequest) -> anyhow::Result<()> {
    let project_root = match &cli.project_root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let config = cli.config.as_deref();

    match &cli.command {
        Commands::Build(args) => {
            commands::build::run(args, &project_root, config, cli.verbose, stop)
        }
        Commands::List => commands::list::run(&project_root, config),
        Commands::Shutdown => commands::shutdown::run(&project_root, config),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let backtrace = cli.backtrace;

    // Initialize debug mode
    ccpd_build::init_debug(cli.verbose || ccpd_build::env_vars::build_debug());

    if let Some(path) = &cli.log_file
        && let Err(e) = ccpd_build::init_log_file(path)
    {
        eprintln!("warning: cannot open log file {}: {e}", path.display());
    }

    // Builds block on Bazel. A signal never ends the process directly: it
    // stops the running Bazel client and the build unwinds through the
    // normal error path, which restores WORKSPACE.
    let mut termination = Termination::listen();
    let stop = StopRequest::new();
    let task = tokio::task::spawn_blocking({
        let stop = stop.clone();
        move || dispatch(&cli, &stop)
    });
    tokio::pin!(task);

    let mut listening = true;
    let result = loop {
        tokio::select! {
            joined = &mut task => {
                break joined.context("Build task panicked").and_then(|result| result);
            }
            signal = tokio::signal::ctrl_c(), if listening => {
                if let Err(e) = signal {
                    ccpd_build::debug!("Failed to listen for Ctrl-C: {e}");
                    listening = false;
                    continue;
                }
                eprintln!("Interrupted; waiting for Bazel to exit so WORKSPACE can be restored...");
                stop.request();
            }
            name = termination.recv() => {
                eprintln!("Received {name}; stopping Bazel so WORKSPACE can be restored...");
                stop.request();
            }
        }
    };

    if let Err(e) = result {
        // Display error with formatting
        display_error(&e, backtrace);
        process::exit(1);
    }
}

mod commands;
mod signals;
