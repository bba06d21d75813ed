//! Memoized modification-time queries.
//!
//! Every file in an include closure is stat'ed through the [`TimestampStore`],
//! so a header shared by many files costs a single `stat` call per run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use seabang_common::{FileId, Timestamp};

use crate::error::DepsError;

/// What one `stat` call tells us about a file: who it is and when it changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStamp {
    /// Device and inode of the file.
    pub id: FileId,
    /// Last modification time.
    pub modified: Timestamp,
    /// Whether the path names a regular file (after following symlinks).
    pub is_file: bool,
}

impl FileStamp {
    /// Stats `path` directly, without any caching.
    pub fn read(path: &Path) -> Result<Self, DepsError> {
        let meta = std::fs::metadata(path).map_err(|e| DepsError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            id: FileId::from_metadata(&meta),
            modified: Timestamp::from_metadata(&meta),
            is_file: meta.is_file(),
        })
    }
}

/// Caches file stamps keyed by path.
///
/// Entries are never invalidated: a store lives for one launch, which is
/// short enough that files changing underneath it do not matter. Missing
/// files are cached too, as `None`.
#[derive(Debug, Default)]
pub struct TimestampStore {
    entries: HashMap<PathBuf, Option<FileStamp>>,
    stat_calls: usize,
}

impl TimestampStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stamp for `path`, or `None` if it cannot be stat'ed.
    ///
    /// Only the first query for a given path touches the filesystem.
    pub fn stamp(&mut self, path: &Path) -> Option<FileStamp> {
        if let Some(cached) = self.entries.get(path) {
            return *cached;
        }
        self.stat_calls += 1;
        let stamp = FileStamp::read(path).ok();
        self.entries.insert(path.to_path_buf(), stamp);
        stamp
    }

    /// Returns the modification time of `path`, if it exists.
    pub fn modified(&mut self, path: &Path) -> Option<Timestamp> {
        self.stamp(path).map(|s| s.modified)
    }

    /// Returns `true` if `a` exists and is strictly newer than `b`.
    ///
    /// A missing `b` counts as infinitely old, so any existing `a` is newer.
    pub fn is_newer(&mut self, a: &Path, b: &Path) -> bool {
        match (self.modified(a), self.modified(b)) {
            (Some(ta), Some(tb)) => ta.is_newer_than(tb),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Number of filesystem queries issued so far.
    pub fn stat_calls(&self) -> usize {
        self.stat_calls
    }
}
