//! Artifact locations under the temp folder.
//!
//! Every source file maps to a stripped copy and a compiled binary under the
//! artifact root. By default the source's absolute path is mirrored below
//! the root, so `/home/u/tools/sum.cpp` becomes
//! `<root>/home/u/tools/sum.cpp` and `<root>/home/u/tools/sum.cpp.exe`.
//! The compact layout keeps only the file name, trading collision safety
//! for shorter paths.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use seabang_common::{clean_path, relative_to_root, FileId};

use crate::error::BuildError;

/// Suffix appended to the stripped-copy path to name the binary.
pub const BINARY_SUFFIX: &str = ".exe";

/// Suffix of the advisory lock file next to the binary.
pub const LOCK_SUFFIX: &str = ".lock";

/// Suffix of in-progress writes, renamed away on success.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// How artifacts are laid out below the artifact root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Mirror the source's absolute path.
    #[default]
    Mirrored,
    /// Use only the source's file name.
    Compact,
}

impl Layout {
    /// Returns the compact layout when `compact` is set.
    pub fn from_compact(compact: bool) -> Self {
        if compact {
            Layout::Compact
        } else {
            Layout::Mirrored
        }
    }
}

/// The derived paths for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    source: PathBuf,
    temp_dir: PathBuf,
    stripped: PathBuf,
    binary: PathBuf,
}

impl ArtifactPaths {
    /// Derives the artifact paths for an absolute `source` path.
    ///
    /// Pure: touches no files. Relative `source` paths are treated as if
    /// rooted at `/`.
    pub fn derive(source: &Path, artifact_root: &Path, layout: Layout) -> Self {
        let source = clean_path(Path::new("/"), source);
        let relative = match (layout, source.file_name()) {
            (Layout::Compact, Some(name)) => PathBuf::from(name),
            _ => relative_to_root(&source),
        };
        let stripped = clean_path(Path::new("/"), &artifact_root.join(relative));
        let temp_dir = stripped
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| artifact_root.to_path_buf());
        let binary = with_suffix(&stripped, BINARY_SUFFIX);
        Self {
            source,
            temp_dir,
            stripped,
            binary,
        }
    }

    /// The source file these artifacts belong to.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Directory holding the stripped copy and binary. Also the compiler's
    /// working directory.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// The source with its launcher line removed.
    pub fn stripped(&self) -> &Path {
        &self.stripped
    }

    /// The compiled program.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Lock file serializing rebuilds of this artifact across processes.
    pub fn lock_file(&self) -> PathBuf {
        with_suffix(&self.binary, LOCK_SUFFIX)
    }

    /// Where the stripped copy is written before being renamed into place.
    pub fn partial_stripped(&self) -> PathBuf {
        with_suffix(&self.stripped, PARTIAL_SUFFIX)
    }

    /// Where the compiler writes the binary before it is renamed into place.
    pub fn partial_binary(&self) -> PathBuf {
        with_suffix(&self.binary, PARTIAL_SUFFIX)
    }

    /// Fails if the stripped copy would overwrite the source.
    ///
    /// Paths are compared both lexically and by device+inode, so a symlinked
    /// temp folder pointing back at the source tree is caught too.
    pub fn check_collision(&self) -> Result<(), BuildError> {
        if self.stripped == self.source || FileId::same_file(&self.stripped, &self.source) {
            return Err(BuildError::PathCollision {
                path: self.source.clone(),
                stripped: self.stripped.clone(),
            });
        }
        Ok(())
    }
}

/// Appends `suffix` to the final component of `path`.
fn with_suffix(path: &Path, suffix: impl AsRef<OsStr>) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}
