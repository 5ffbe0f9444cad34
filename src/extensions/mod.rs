//! Native extension building
//!
//! Builds the compiled parts of the ccpd package with Bazel. Each extension
//! is a Bazel target; the build runs with the host Python's include path
//! spliced into `WORKSPACE` and, for bare shared libraries, finishes by
//! copying the artifact into the package tree.
//!
//! Supported extension kinds:
//! - Binding modules (nanobind targets Bazel writes in place)
//! - Shared libraries (copied out of `bazel-bin`)

pub mod builder;
pub mod invocation;
pub mod types;
pub mod workspace;

pub use builder::{
    BuildError, BuildOrchestrator, BuildSettings, StopRequest, execute, execute_until_stopped,
};
pub use invocation::{BuildInvocation, HostEnv, platform_flags};
pub use types::{
    BuildMode, BuildReport, ExtensionKind, ExtensionSpec, SpecError, TargetReference,
    validate_unique,
};
pub use workspace::{
    PYTHON_INCLUDE_PATH_PLACEHOLDER, PatchTarget, WorkspaceError, WorkspacePatch,
    with_patched_workspace,
};
