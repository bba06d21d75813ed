//! Transitive include resolution and staleness checks.
//!
//! The [`Resolver`] answers one question: is a compiled artifact older than
//! its source file or anything the source transitively includes? It scans
//! each file at most once, tolerates include cycles, and stops at the first
//! dependency found to be newer than the artifact.

use std::path::{Path, PathBuf};

use seabang_common::{clean_path, FileId};
use tracing::{debug, trace};

use crate::record::RecordTable;
use crate::scanner::{scan_includes, IncludeEdge, IncludeForm};
use crate::timestamps::{FileStamp, TimestampStore};

/// Why an artifact is out of date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// The artifact does not exist.
    ArtifactMissing,
    /// The root source file is newer than the artifact, or cannot be stat'ed.
    SourceNewer,
    /// A file in the include closure is newer than the artifact.
    DependencyNewer(PathBuf),
}

/// Resolves include closures and compares them against artifact timestamps.
///
/// A resolver is created per launch. Timestamps and scanned include lists are
/// memoized for its whole lifetime; "already checked" marks are reset at the
/// start of every [`staleness`](Self::staleness) call, since they only mean
/// something relative to one artifact's timestamp.
///
/// Includes that cannot be found in any search directory are skipped, as are
/// files that exist but cannot be read. Neither forces a rebuild.
#[derive(Debug, Default)]
pub struct Resolver {
    times: TimestampStore,
    records: RecordTable,
    search_paths: Vec<PathBuf>,
    scans: usize,
}

impl Resolver {
    /// Creates a resolver with empty caches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `artifact` is missing or older than `source` or any
    /// file `source` transitively includes.
    pub fn requires_rebuild(
        &mut self,
        source: &Path,
        artifact: &Path,
        search_paths: &[PathBuf],
    ) -> bool {
        self.staleness(source, artifact, search_paths).is_some()
    }

    /// Like [`requires_rebuild`](Self::requires_rebuild), but says why.
    ///
    /// Returns `None` when the artifact is up to date with the whole closure.
    pub fn staleness(
        &mut self,
        source: &Path,
        artifact: &Path,
        search_paths: &[PathBuf],
    ) -> Option<Staleness> {
        let Some(reference) = self.times.modified(artifact) else {
            debug!(artifact = %artifact.display(), "artifact missing");
            return Some(Staleness::ArtifactMissing);
        };

        let Some(root) = self.times.stamp(source) else {
            debug!(source = %source.display(), "source cannot be stat'ed");
            return Some(Staleness::SourceNewer);
        };
        if root.modified.is_newer_than(reference) {
            debug!(source = %source.display(), "source newer than artifact");
            return Some(Staleness::SourceNewer);
        }

        if self.search_paths != search_paths {
            self.records.forget_includes();
            self.search_paths = search_paths.to_vec();
        }

        self.records.begin_run();
        self.records.entry(source, root);
        self.records.mark_checked(root.id);

        let mut pending = vec![root.id];
        while let Some(id) = pending.pop() {
            for include in self.includes_of(id) {
                let Some(stamp) = self.times.stamp(&include) else {
                    continue;
                };
                self.records.entry(&include, stamp);
                if !self.records.mark_checked(stamp.id) {
                    continue;
                }
                if stamp.modified.is_newer_than(reference) {
                    debug!(dependency = %include.display(), "dependency newer than artifact");
                    return Some(Staleness::DependencyNewer(include));
                }
                pending.push(stamp.id);
            }
        }

        debug!(artifact = %artifact.display(), "artifact up to date");
        None
    }

    /// Number of files whose contents have been scanned for includes.
    pub fn scans(&self) -> usize {
        self.scans
    }

    /// Number of `stat` calls issued through the timestamp store.
    pub fn stat_calls(&self) -> usize {
        self.times.stat_calls()
    }

    /// Returns the resolved direct includes of a recorded file, scanning it on
    /// first request.
    fn includes_of(&mut self, id: FileId) -> Vec<PathBuf> {
        let Some(record) = self.records.get(id) else {
            return Vec::new();
        };
        if let Some(includes) = &record.includes {
            return includes.clone();
        }

        let path = record.path.clone();
        let modified = record.modified;
        let includes = self.scan_file(&path);
        self.records
            .entry(
                &path,
                FileStamp {
                    id,
                    modified,
                    is_file: true,
                },
            )
            .includes = Some(includes.clone());
        includes
    }

    /// Reads a file and resolves each include edge it contains.
    fn scan_file(&mut self, path: &Path) -> Vec<PathBuf> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unreadable file");
                return Vec::new();
            }
        };
        self.scans += 1;

        let text = String::from_utf8_lossy(&bytes);
        let mut resolved = Vec::new();
        for edge in scan_includes(path, &text) {
            match self.resolve_edge(&edge) {
                Some(found) => {
                    trace!(from = %path.display(), line = edge.line, target = edge.target, found = %found.display(), "include resolved");
                    resolved.push(found);
                }
                None => {
                    trace!(from = %path.display(), line = edge.line, target = edge.target, "include not found, ignored");
                }
            }
        }
        resolved
    }

    /// Finds the file an include edge refers to.
    ///
    /// Quoted includes try the including file's directory first; both forms
    /// then try each search directory in order. The first regular file wins.
    fn resolve_edge(&mut self, edge: &IncludeEdge<'_>) -> Option<PathBuf> {
        let local = match edge.form {
            IncludeForm::Quoted => edge.source.parent().map(Path::to_path_buf),
            IncludeForm::Angled => None,
        };
        let target = Path::new(edge.target);

        let candidates: Vec<PathBuf> = local
            .into_iter()
            .chain(self.search_paths.iter().cloned())
            .map(|dir| clean_path(&dir, target))
            .collect();

        candidates
            .into_iter()
            .find(|candidate| self.times.stamp(candidate).is_some_and(|s| s.is_file))
    }
}
