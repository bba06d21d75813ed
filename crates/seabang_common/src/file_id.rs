//! Filesystem identity of a file, independent of how its path is spelled.

use std::fs::Metadata;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// The device and inode pair that identifies a file on disk.
///
/// Two paths name the same file only if they resolve to the same `FileId`.
/// Symlinks, hard links and `..` traversal all collapse to one identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    /// Builds an identity from raw device and inode numbers.
    pub fn from_raw(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    /// Extracts the identity from already-fetched metadata.
    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }

    /// Stats `path` (following symlinks) and returns its identity.
    pub fn of(path: &Path) -> io::Result<Self> {
        std::fs::metadata(path).map(|m| Self::from_metadata(&m))
    }

    /// Returns `true` if both paths exist and resolve to the same file.
    ///
    /// A path that cannot be stat'ed is never the same file as anything.
    pub fn same_file(a: &Path, b: &Path) -> bool {
        match (Self::of(a), Self::of(b)) {
            (Ok(x), Ok(y)) => x == y,
            _ => false,
        }
    }
}
