//! Configuration file management
//!
//! Reads the optional `ccpd-build.toml` that describes which Bazel targets
//! make up the package and where the build looks for its inputs. Without a
//! file, the built-in defaults describe the ccpd package itself.
//!
//! ```toml
//! workspace = "WORKSPACE"
//! destination = "build/lib"
//!
//! [[extension]]
//! name = "_constants"
//! target = "//ccpd/cc_libraries:py_constants"
//! kind = "shared-library"
//! ```

use crate::extensions::{
    ExtensionKind, ExtensionSpec, PYTHON_INCLUDE_PATH_PLACEHOLDER, SpecError, validate_unique,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Project-local config file name
pub const CONFIG_FILE_NAME: &str = "ccpd-build.toml";

/// Build configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// File carrying the include path placeholder
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Placeholder token inside the workspace file
    #[serde(default = "default_placeholder")]
    pub placeholder: String,

    /// Bazel executable
    #[serde(default)]
    pub bazel: Option<String>,

    /// Python interpreter used to look up the include directory
    #[serde(default)]
    pub python: Option<String>,

    /// Include directory to use instead of asking the interpreter
    #[serde(default)]
    pub python_include: Option<String>,

    /// Package tree that receives copied shared libraries
    #[serde(default = "default_destination")]
    pub destination: String,

    /// Fixed directory for Bazel's symlinks (a fresh temp dir otherwise)
    #[serde(default)]
    pub build_temp: Option<String>,

    /// Extra linker search paths (Windows)
    #[serde(default)]
    pub library_dirs: Vec<String>,

    /// Extensions to build, in order
    #[serde(default = "default_extensions", rename = "extension")]
    pub extensions: Vec<ExtensionEntry>,
}

/// One `[[extension]]` table
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ExtensionEntry {
    pub name: String,
    pub target: String,
    pub kind: ExtensionKind,
}

fn default_workspace() -> String {
    "WORKSPACE".to_string()
}

fn default_placeholder() -> String {
    PYTHON_INCLUDE_PATH_PLACEHOLDER.to_string()
}

fn default_destination() -> String {
    "build/lib".to_string()
}

fn default_extensions() -> Vec<ExtensionEntry> {
    vec![
        ExtensionEntry {
            name: "thermo_point".to_string(),
            target: "//ccpd/data_types:thermo_point".to_string(),
            kind: ExtensionKind::BindingModule,
        },
        ExtensionEntry {
            name: "_constants".to_string(),
            target: "//ccpd/cc_libraries:py_constants".to_string(),
            kind: ExtensionKind::SharedLibrary,
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            placeholder: default_placeholder(),
            bazel: None,
            python: None,
            python_include: None,
            destination: default_destination(),
            build_temp: None,
            library_dirs: Vec::new(),
            extensions: default_extensions(),
        }
    }
}

impl Config {
    /// Load configuration.
    /// Priority: `custom_path` -> `CCPD_BUILD_CONFIG` -> `<project_root>/ccpd-build.toml` -> defaults.
    ///
    /// An explicitly named file must exist; the project-local file is optional.
    pub fn load(project_root: &Path, custom_path: Option<&str>) -> Result<Self> {
        if let Some(path) = custom_path
            .map(str::to_string)
            .or_else(crate::env_vars::build_config)
        {
            return Self::load_from(Path::new(&path));
        }

        let local = project_root.join(CONFIG_FILE_NAME);
        if local.exists() {
            return Self::load_from(&local);
        }

        crate::debug!("No {CONFIG_FILE_NAME} found, using built-in defaults");
        Ok(Self::default())
    }

    fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        crate::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse TOML configuration.
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validated extension declarations, in configuration order.
    pub fn extension_specs(&self) -> Result<Vec<ExtensionSpec>, SpecError> {
        let specs = self
            .extensions
            .iter()
            .map(|entry| ExtensionSpec::new(&entry.name, &entry.target, entry.kind))
            .collect::<Result<Vec<_>, _>>()?;
        validate_unique(&specs)?;
        Ok(specs)
    }

    /// Resolve a configured path against the project root.
    #[must_use]
    pub fn resolve(project_root: &Path, path: &str) -> PathBuf {
        project_root.join(path)
    }
}
