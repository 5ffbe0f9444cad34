//! Extension type definitions
//!
//! A ccpd native extension is one Bazel target. Some targets are nanobind
//! modules that Bazel already places where Python imports them from; others
//! are bare shared libraries that have to be copied into the package tree
//! after the build.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while validating extension declarations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("invalid Bazel target `{target}`: {reason}")]
    InvalidTargetReference { target: String, reason: &'static str },

    #[error("invalid extension name `{name}`: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("extension `{0}` is declared more than once")]
    DuplicateName(String),
}

/// A `//<relative-path>:<target-name>` Bazel label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReference {
    relative_path: String,
    target_name: String,
}

impl TargetReference {
    /// Package path relative to the workspace root (e.g. `ccpd/cc_libraries`).
    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Target name inside the package (e.g. `py_constants`).
    #[must_use]
    pub fn target_name(&self) -> &str {
        &self.target_name
    }
}

impl FromStr for TargetReference {
    type Err = SpecError;

    /// Parse a fully qualified Bazel label.
    ///
    /// # Examples
    ///
    /// ```
    /// use ccpd_build::extensions::TargetReference;
    ///
    /// let target: TargetReference = "//ccpd/cc_libraries:py_constants".parse().unwrap();
    /// assert_eq!(target.relative_path(), "ccpd/cc_libraries");
    /// assert_eq!(target.target_name(), "py_constants");
    /// ```
    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &'static str| SpecError::InvalidTargetReference {
            target: label.to_string(),
            reason,
        };

        let stripped = label
            .strip_prefix("//")
            .ok_or_else(|| invalid("missing `//` prefix"))?;
        let (relative_path, target_name) = stripped
            .split_once(':')
            .ok_or_else(|| invalid("missing `:` separator"))?;

        if relative_path.is_empty() {
            return Err(invalid("empty package path"));
        }
        if target_name.is_empty() {
            return Err(invalid("empty target name"));
        }
        if target_name.contains(':') || relative_path.contains("//") || target_name.contains("//")
        {
            return Err(invalid("embedded `:` or `//`"));
        }
        if !label.is_ascii() {
            return Err(invalid("non-ASCII characters"));
        }

        Ok(Self {
            relative_path: relative_path.to_string(),
            target_name: target_name.to_string(),
        })
    }
}

impl fmt::Display for TargetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "//{}:{}", self.relative_path, self.target_name)
    }
}

/// How the build output of an extension reaches the package tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtensionKind {
    /// Python binding module written by Bazel directly into its final location
    BindingModule,

    /// Bare shared library that must be copied out of `bazel-bin`
    SharedLibrary,
}

impl ExtensionKind {
    /// Check if the artifact must be copied after the build
    #[must_use]
    #[inline]
    pub const fn needs_copy(self) -> bool {
        matches!(self, Self::SharedLibrary)
    }

    /// Get a human-readable description
    #[must_use]
    #[inline]
    pub const fn description(self) -> &'static str {
        match self {
            Self::BindingModule => "binding module",
            Self::SharedLibrary => "shared library",
        }
    }
}

/// One buildable native extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSpec {
    name: String,
    target: TargetReference,
    kind: ExtensionKind,
}

impl ExtensionSpec {
    /// Validate and create an extension declaration.
    ///
    /// The name becomes the artifact file stem and the Python module name, so
    /// it must be an ASCII identifier (`[A-Za-z_][A-Za-z0-9_]*`).
    pub fn new(name: &str, target: &str, kind: ExtensionKind) -> Result<Self, SpecError> {
        let invalid = |reason: &'static str| SpecError::InvalidName {
            name: name.to_string(),
            reason,
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(invalid("name starts with a digit"));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid("name is not an identifier"));
        }

        Ok(Self {
            name: name.to_string(),
            target: target.parse()?,
            kind,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn target(&self) -> &TargetReference {
        &self.target
    }

    #[must_use]
    pub const fn kind(&self) -> ExtensionKind {
        self.kind
    }

    /// Artifact file name, e.g. `_constants.so`.
    #[must_use]
    pub fn artifact_file_name(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.name)
    }

    /// `<root>/<relative-path>/<name><suffix>`
    ///
    /// Used for both sides of the copy: `root` is `bazel-bin` for the source
    /// and the package destination for the target.
    #[must_use]
    pub fn artifact_path_under(&self, root: &Path, suffix: &str) -> PathBuf {
        let mut path = root.to_path_buf();
        for component in self.target.relative_path().split('/') {
            path.push(component);
        }
        path.push(self.artifact_file_name(suffix));
        path
    }
}

/// Reject duplicate names before any build starts.
pub fn validate_unique(specs: &[ExtensionSpec]) -> Result<(), SpecError> {
    let mut seen = std::collections::HashSet::new();
    for spec in specs {
        if !seen.insert(spec.name()) {
            return Err(SpecError::DuplicateName(spec.name().to_string()));
        }
    }
    Ok(())
}

/// Bazel compilation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    Debug,
    #[default]
    Release,
}

impl BuildMode {
    #[must_use]
    pub const fn from_debug_flag(debug: bool) -> Self {
        if debug { Self::Debug } else { Self::Release }
    }

    /// Value for Bazel's `--compilation_mode`.
    #[must_use]
    pub const fn compilation_mode(self) -> &'static str {
        match self {
            Self::Debug => "dbg",
            Self::Release => "opt",
        }
    }
}

/// Result of building one extension
#[derive(Debug)]
pub struct BuildReport {
    /// Extension name
    pub name: String,

    /// Artifact handling that was applied
    pub kind: ExtensionKind,

    /// Build duration (Bazel invocation plus copy)
    pub duration: Duration,

    /// Destination of the copied artifact (shared libraries only)
    pub artifact: Option<PathBuf>,
}
