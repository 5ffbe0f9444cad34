//! Bazel command line assembly
//!
//! Everything here is a pure function of its inputs so the platform branches
//! can be tested on any host without spawning Bazel.

use super::types::{BuildMode, TargetReference};
use crate::platform::{Arch, Host, Os};
use std::fmt;
use std::path::{Path, PathBuf};

/// Baseline macOS for C++17 on Intel hosts
pub const MACOS_X86_64_MINIMUM_OS: &str = "10.14";

/// Baseline macOS on Apple silicon
pub const MACOS_ARM64_MINIMUM_OS: &str = "11.0";

/// The part of the environment that shapes a Bazel invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnv {
    pub host: Host,
    /// Value of `ARCHFLAGS`
    pub archflags: Option<String>,
    /// Library search paths passed to the MSVC linker
    pub library_dirs: Vec<PathBuf>,
}

impl HostEnv {
    /// Capture the running host and its `ARCHFLAGS`.
    #[must_use]
    pub fn detect(library_dirs: Vec<PathBuf>) -> Self {
        Self {
            host: Host::current(),
            archflags: crate::env_vars::archflags(),
            library_dirs,
        }
    }

    /// Check if `ARCHFLAGS` requests an arm64 build
    #[must_use]
    pub fn wants_arm64(&self) -> bool {
        self.archflags
            .as_deref()
            .is_some_and(|flags| flags.contains("arm64"))
    }
}

/// Flags that depend on the host operating system and CPU.
///
/// Windows links against `python*.lib` through `/LIBPATH`; macOS needs a
/// minimum deployment target, and Intel macOS hosts cross-compile to arm64
/// when `ARCHFLAGS` asks for it.
#[must_use]
pub fn platform_flags(env: &HostEnv) -> Vec<String> {
    let mut flags = Vec::new();

    match (&env.host.os, &env.host.arch) {
        (Os::Windows, _) => {
            for library_dir in &env.library_dirs {
                flags.push(format!("--linkopt=/LIBPATH:{}", library_dir.display()));
            }
        }
        (Os::MacOs, Arch::X86_64) => {
            flags.push(format!("--macos_minimum_os={MACOS_X86_64_MINIMUM_OS}"));
            if env.wants_arm64() {
                flags.push("--cpu=darwin_arm64".to_string());
                flags.push("--macos_cpus=arm64".to_string());
            }
        }
        (Os::MacOs, Arch::Arm64) => {
            flags.push(format!("--macos_minimum_os={MACOS_ARM64_MINIMUM_OS}"));
        }
        _ => {}
    }

    flags
}

/// A fully assembled `bazel build` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInvocation {
    program: PathBuf,
    args: Vec<String>,
}

impl BuildInvocation {
    /// Assemble the build command for one target.
    ///
    /// `symlink_prefix` is where Bazel puts its `bazel-bin`/`bazel-out`
    /// convenience symlinks; it must live outside the source tree.
    #[must_use]
    pub fn new(
        program: &Path,
        target: &TargetReference,
        mode: BuildMode,
        symlink_prefix: &Path,
        env: &HostEnv,
    ) -> Self {
        let cxx_standard = if env.host.is_windows() {
            "/std:c++17"
        } else {
            "-std=c++17"
        };

        let mut args = vec![
            "build".to_string(),
            target.to_string(),
            "--enable_bzlmod=false".to_string(),
            format!("--symlink_prefix={}", symlink_prefix.display()),
            format!("--compilation_mode={}", mode.compilation_mode()),
            // nanobind requires C++17
            format!("--cxxopt={cxx_standard}"),
        ];
        args.extend(platform_flags(env));

        Self {
            program: program.to_path_buf(),
            args,
        }
    }

    /// `bazel shutdown`
    #[must_use]
    pub fn shutdown(program: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
            args: vec!["shutdown".to_string()],
        }
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn contains(&self, flag: &str) -> bool {
        self.args.iter().any(|arg| arg == flag)
    }
}

impl fmt::Display for BuildInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
