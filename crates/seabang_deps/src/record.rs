//! Per-file state kept by the resolver.
//!
//! One [`FileRecord`] per distinct file (by device+inode) holds everything the
//! resolver learns about it: the last-known timestamp, the resolved include
//! list once it has been scanned, and the run in which it was last checked.
//! Keeping these together means one lookup per visit and no parallel maps
//! that could drift apart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use seabang_common::{FileId, Timestamp};

use crate::timestamps::FileStamp;

/// Identifies one `requires_rebuild` evaluation within a resolver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(u64);

impl RunId {
    /// Returns the id of the run after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Everything known about one file in the include graph.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// The path under which the file was first reached. Quoted includes are
    /// resolved relative to this path's directory.
    pub path: PathBuf,

    /// Modification time when the file was first stat'ed.
    pub modified: Timestamp,

    /// Resolved direct includes, once the file has been scanned.
    pub includes: Option<Vec<PathBuf>>,

    /// The last run in which this file was checked against a reference time.
    pub checked_in: Option<RunId>,
}

impl FileRecord {
    /// Returns `true` if this file has already been checked during `run`.
    pub fn is_checked(&self, run: RunId) -> bool {
        self.checked_in == Some(run)
    }

    /// Returns `true` if the file's direct includes have been resolved.
    pub fn is_scanned(&self) -> bool {
        self.includes.is_some()
    }
}

/// The resolver's memo table, keyed by file identity.
#[derive(Debug, Default)]
pub struct RecordTable {
    records: HashMap<FileId, FileRecord>,
    run: RunId,
}

impl RecordTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new run. Check marks from earlier runs no longer count;
    /// timestamps and scanned includes are kept.
    pub fn begin_run(&mut self) -> RunId {
        self.run = self.run.next();
        self.run
    }

    /// The run currently in progress.
    pub fn current_run(&self) -> RunId {
        self.run
    }

    /// Returns the record for a stamped file, creating it on first sight.
    pub fn entry(&mut self, path: &Path, stamp: FileStamp) -> &mut FileRecord {
        self.records
            .entry(stamp.id)
            .or_insert_with(|| FileRecord {
                path: path.to_path_buf(),
                modified: stamp.modified,
                includes: None,
                checked_in: None,
            })
    }

    /// Marks the file checked in the current run.
    ///
    /// Returns `false` if it was already checked, in which case the caller
    /// must not visit it again.
    pub fn mark_checked(&mut self, id: FileId) -> bool {
        let run = self.run;
        match self.records.get_mut(&id) {
            Some(record) if record.is_checked(run) => false,
            Some(record) => {
                record.checked_in = Some(run);
                true
            }
            None => false,
        }
    }

    /// Looks up a record by identity.
    pub fn get(&self, id: FileId) -> Option<&FileRecord> {
        self.records.get(&id)
    }

    /// Drops every scanned include list, keeping timestamps.
    ///
    /// Include resolution depends on the search directories, so the lists
    /// must be recomputed when those change.
    pub fn forget_includes(&mut self) {
        for record in self.records.values_mut() {
            record.includes = None;
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
