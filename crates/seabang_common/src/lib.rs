//! Shared foundational types used across the seabang launcher.
//!
//! This crate provides nanosecond-resolution modification timestamps,
//! device+inode file identity, lexical path cleaning, and the verbosity
//! level threaded through a launch.

#![warn(missing_docs)]

pub mod file_id;
pub mod path;
pub mod timestamp;
pub mod verbosity;

pub use file_id::FileId;
pub use path::{clean_path, relative_to_root};
pub use timestamp::Timestamp;
pub use verbosity::Verbosity;
