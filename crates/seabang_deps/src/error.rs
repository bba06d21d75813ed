//! Error types for dependency scanning.

use std::path::PathBuf;

/// Errors that can occur while reading files during dependency resolution.
///
/// Resolution is optimistic: the resolver treats these as "no further
/// dependencies" rather than failing the launch. The enum exists so the
/// lower layers can report what went wrong before the resolver decides
/// to skip the file.
#[derive(Debug, thiserror::Error)]
pub enum DepsError {
    /// An I/O error occurred while stat'ing or reading a file.
    #[error("dependency I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
