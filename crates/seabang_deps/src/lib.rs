//! Include-closure staleness checks for single-file programs.
//!
//! This crate decides whether a compiled artifact must be rebuilt by walking
//! the textual `#include` graph rooted at a source file and comparing every
//! reachable file's modification time against the artifact's. Timestamps and
//! scanned include lists are memoized, so a header shared by many files is
//! stat'ed and read once.

#![warn(missing_docs)]

pub mod error;
pub mod record;
pub mod resolver;
pub mod scanner;
pub mod timestamps;

pub use error::DepsError;
pub use resolver::{Resolver, Staleness};
pub use scanner::{parse_include_line, scan_includes, IncludeEdge, IncludeForm};
pub use timestamps::{FileStamp, TimestampStore};
