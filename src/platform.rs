//! Host platform detection
//!
//! Maps Rust's `std::env::consts` values onto the handful of operating systems
//! and CPU architectures that change how Bazel has to be invoked.

use std::env;
use std::fmt;
use std::sync::LazyLock;

/// Cached host detection (computed once, reused throughout execution)
static CURRENT_HOST: LazyLock<Host> =
    LazyLock::new(|| Host::from_consts(env::consts::OS, env::consts::ARCH));

/// Host operating system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Os {
    Windows,
    MacOs,
    Linux,
    Other(String),
}

/// Host CPU architecture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Arm64,
    Other(String),
}

/// Operating system and architecture pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub os: Os,
    pub arch: Arch,
}

impl Host {
    #[must_use]
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// The host this process is running on.
    #[must_use]
    pub fn current() -> Self {
        CURRENT_HOST.clone()
    }

    /// Build a host from `std::env::consts::OS` / `ARCH` style strings.
    #[must_use]
    pub fn from_consts(os: &str, arch: &str) -> Self {
        let os = match os {
            "windows" => Os::Windows,
            "macos" => Os::MacOs,
            "linux" => Os::Linux,
            other => Os::Other(other.to_string()),
        };

        // Python's platform.machine() reports "arm64" on macOS and "aarch64"
        // on Linux; both are the same target for Bazel.
        let arch = match arch {
            "x86_64" | "amd64" => Arch::X86_64,
            "aarch64" | "arm64" => Arch::Arm64,
            other => Arch::Other(other.to_string()),
        };

        Self { os, arch }
    }

    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// File suffix of a bare shared library produced by Bazel.
    #[must_use]
    pub fn shared_library_suffix(&self) -> &'static str {
        if self.is_windows() { ".dll" } else { ".so" }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => f.write_str("windows"),
            Self::MacOs => f.write_str("macos"),
            Self::Linux => f.write_str("linux"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86_64 => f.write_str("x86_64"),
            Self::Arm64 => f.write_str("arm64"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.arch, self.os)
    }
}
