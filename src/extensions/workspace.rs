//! Scoped `WORKSPACE` patching
//!
//! The Bazel `WORKSPACE` file in the ccpd repository carries a literal
//! `<PYTHON_INCLUDE_PATH>` token where the host interpreter's headers must be
//! wired in. The token is filled in for the duration of one build and the
//! original bytes are written back afterwards, whatever happened in between.
//!
//! ```text
//! open r/w -> read -> replace -> write + truncate
//!          -> run build
//!          -> seek 0 -> write original -> truncate -> sync
//! ```

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Placeholder token for the Python include directory
pub const PYTHON_INCLUDE_PATH_PLACEHOLDER: &str = "<PYTHON_INCLUDE_PATH>";

/// Errors from patching or restoring the workspace file
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The file could not be opened, read or patched. Nothing was built.
    #[error("cannot access workspace file {}", .path.display())]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing the original content back failed. The file is left in an
    /// unknown state and must be repaired by hand before building again.
    ///
    /// `failed_build` keeps the build's own error when it failed too.
    #[error(
        "failed to restore workspace file {}; it may still contain the patched include path{}",
        .path.display(),
        after_failed_build(.failed_build.as_deref())
    )]
    Corruption {
        path: PathBuf,
        #[source]
        source: io::Error,
        failed_build: Option<String>,
    },
}

fn after_failed_build(failed_build: Option<&str>) -> String {
    failed_build
        .map(|e| format!(" (the build had already failed: {e})"))
        .unwrap_or_default()
}

/// Storage behind a [`WorkspacePatch`]
pub trait PatchTarget: Read + Write + Seek {
    /// Cut the content down to `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Push written content to durable storage.
    fn sync(&mut self) -> io::Result<()>;
}

impl PatchTarget for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

/// An active patch on the workspace file
///
/// Holds the original content until [`WorkspacePatch::restore`] writes it
/// back. Dropping an unrestored patch (e.g. while unwinding from a panic)
/// restores it as well and reports failures on stderr.
#[derive(Debug)]
pub struct WorkspacePatch<T: PatchTarget = File> {
    path: PathBuf,
    target: T,
    original: Vec<u8>,
    restored: bool,
}

impl WorkspacePatch {
    /// Replace every occurrence of `placeholder` in the file at `path` with
    /// `replacement`.
    pub fn apply(path: &Path, placeholder: &str, replacement: &str) -> Result<Self, WorkspaceError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| WorkspaceError::Access {
                path: path.to_path_buf(),
                source,
            })?;

        Self::patch(path, file, placeholder, replacement)
    }
}

impl<T: PatchTarget> WorkspacePatch<T> {
    /// Patch already opened storage. `path` is only used in messages.
    pub fn patch(
        path: &Path,
        mut target: T,
        placeholder: &str,
        replacement: &str,
    ) -> Result<Self, WorkspaceError> {
        let mut original = Vec::new();
        target
            .read_to_end(&mut original)
            .map_err(|source| WorkspaceError::Access {
                path: path.to_path_buf(),
                source,
            })?;

        let patched = replace_all(&original, placeholder.as_bytes(), replacement.as_bytes());

        let mut patch = Self {
            path: path.to_path_buf(),
            target,
            original,
            restored: false,
        };

        crate::debug!(
            "Patching {} ({} -> {replacement})",
            path.display(),
            placeholder
        );

        if let Err(source) = overwrite(&mut patch.target, &patched) {
            // A partial write may already have reached the file.
            patch.restore_in_place()?;
            return Err(WorkspaceError::Access {
                path: patch.path.clone(),
                source,
            });
        }

        Ok(patch)
    }

    /// Write the original content back.
    pub fn restore(mut self) -> Result<(), WorkspaceError> {
        self.restore_in_place()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn restore_in_place(&mut self) -> Result<(), WorkspaceError> {
        self.restored = true;
        overwrite(&mut self.target, &self.original)
            .and_then(|()| self.target.sync())
            .map_err(|source| WorkspaceError::Corruption {
                path: self.path.clone(),
                source,
                failed_build: None,
            })?;
        crate::debug!("Restored {}", self.path.display());
        Ok(())
    }
}

impl<T: PatchTarget> Drop for WorkspacePatch<T> {
    fn drop(&mut self) {
        if !self.restored
            && let Err(e) = self.restore_in_place()
        {
            eprintln!("error: {e}");
            if let Some(source) = std::error::Error::source(&e) {
                eprintln!("caused by: {source}");
            }
        }
    }
}

/// Run `f` while the workspace file is patched.
///
/// The file is restored before the result of `f` is returned. A restore
/// failure takes precedence over whatever `f` returned.
pub fn with_patched_workspace<T, E, F>(
    path: &Path,
    placeholder: &str,
    replacement: &str,
    f: F,
) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<WorkspaceError> + fmt::Display,
{
    let patch = WorkspacePatch::apply(path, placeholder, replacement)?;
    run_patched(patch, f)
}

fn run_patched<P, T, E, F>(patch: WorkspacePatch<P>, f: F) -> Result<T, E>
where
    P: PatchTarget,
    F: FnOnce() -> Result<T, E>,
    E: From<WorkspaceError> + fmt::Display,
{
    let outcome = f();
    match (patch.restore(), outcome) {
        (Ok(()), outcome) => outcome,
        (Err(mut restore_error), Err(build_error)) => {
            if let WorkspaceError::Corruption { failed_build, .. } = &mut restore_error {
                *failed_build = Some(build_error.to_string());
            }
            Err(restore_error.into())
        }
        (Err(restore_error), Ok(_)) => Err(restore_error.into()),
    }
}

fn overwrite<T: PatchTarget>(target: &mut T, content: &[u8]) -> io::Result<()> {
    target.seek(SeekFrom::Start(0))?;
    target.write_all(content)?;
    target.truncate(content.len() as u64)?;
    target.flush()
}

/// Byte-level `str::replace`, so files that are not valid UTF-8 still
/// round-trip exactly.
fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() {
        return haystack.to_vec();
    }

    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while !rest.is_empty() {
        if rest.starts_with(needle) {
            out.extend_from_slice(replacement);
            rest = rest.get(needle.len()..).unwrap_or_default();
        } else if let Some((&byte, tail)) = rest.split_first() {
            out.push(byte);
            rest = tail;
        }
    }
    out
}
