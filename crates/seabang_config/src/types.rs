//! Configuration types deserialized from `seabang.toml`.

use serde::Deserialize;
use std::path::PathBuf;

/// The contents of a `seabang.toml` file.
///
/// Every key is optional; an absent file behaves like an empty one.
///
/// ```toml
/// compiler = "/usr/bin/clang++"
/// temp_folder = "/var/tmp"
/// compact = true
/// include_paths = ["/opt/boost/include"]
/// std = "c++20"
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// C++ compiler executable.
    #[serde(default)]
    pub compiler: Option<PathBuf>,
    /// Directory under which the `seabang/` artifact tree is created.
    #[serde(default)]
    pub temp_folder: Option<PathBuf>,
    /// Flatten artifacts to the source file name instead of mirroring its path.
    #[serde(default)]
    pub compact: Option<bool>,
    /// Include roots searched after the invocation directory.
    /// Replaces the defaults rather than extending them.
    #[serde(default)]
    pub include_paths: Option<Vec<PathBuf>>,
    /// Language standard passed as `-std=<value>`.
    #[serde(default)]
    pub std: Option<String>,
}

impl FileConfig {
    /// Returns `true` if no key was set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
