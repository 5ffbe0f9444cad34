//! ccpd-build internal library code
//!
//! Builds the Bazel-defined native extensions of the ccpd package and places
//! them in the installable package tree.

pub mod config;
pub mod debug;
pub mod env_vars;
pub mod extensions;
pub mod platform;
pub mod python;
pub mod test_utils;

// Re-export common types for convenience
pub use config::{CONFIG_FILE_NAME, Config, ExtensionEntry};
pub use debug::{debug_log, debug_logf, init_debug, init_log_file, is_debug_enabled};
pub use extensions::{
    BuildError, BuildInvocation, BuildMode, BuildOrchestrator, BuildReport, BuildSettings,
    ExtensionKind, ExtensionSpec, HostEnv, SpecError, StopRequest, TargetReference,
    WorkspaceError, WorkspacePatch, platform_flags, with_patched_workspace,
};
pub use platform::{Arch, Host, Os};
pub use python::{Python, to_posix};
