//! Debug logging utilities
//!
//! Provides debug logging that respects the global `--verbose` flag. An
//! optional log file receives every debug line whether or not the flag is
//! set, so a packaging run that fails inside a wheel builder still leaves a
//! trace behind.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

static DEBUG_ENABLED: OnceLock<bool> = OnceLock::new();
static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();

/// Initialize debug mode from command-line flag
pub fn init_debug(enabled: bool) {
    if DEBUG_ENABLED.set(enabled).is_err() {
        debug_log("debug mode already initialized");
    }
}

/// Open (truncating) the debug log file.
///
/// Only the first call has an effect; later calls keep the original file.
pub fn init_log_file(path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    if LOG_FILE.set(Mutex::new(file)).is_err() {
        debug_log("log file already initialized");
    }
    Ok(())
}

/// Check if debug mode is enabled
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.get().copied().unwrap_or(false)
}

/// Print a debug message if debug mode is enabled
pub fn debug_log(message: &str) {
    debug_logf(format_args!("{message}"));
}

/// Print formatted debug message if debug mode is enabled
pub fn debug_logf(args: std::fmt::Arguments<'_>) {
    if is_debug_enabled() {
        eprintln!("[DEBUG] {args}");
    }

    if let Some(file) = LOG_FILE.get()
        && let Ok(mut file) = file.lock()
    {
        // A broken log file must never fail the build.
        if writeln!(file, "DEBUG: {args}").is_err() {
            eprintln!("[DEBUG] failed to write log file");
        }
    }
}

/// Macro for convenient debug logging
///
/// Usage: `debug!("message with {}", variable)`
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::debug::debug_logf(format_args!($($arg)*))
    };
}
