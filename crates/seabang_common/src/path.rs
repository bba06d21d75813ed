//! Lexical path normalization.

use std::path::{Component, Path, PathBuf};

/// Makes `path` absolute against `base` and removes `.` and `..` components.
///
/// This is purely lexical: symlinks are not resolved, and `..` at the root
/// stays at the root. Identity checks must still go through
/// [`FileId`](crate::FileId).
pub fn clean_path(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Never pop past the root.
                if out.parent().is_some() {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Strips the root from an absolute path so it can be re-rooted under another
/// directory: `/home/a/b.cpp` becomes `home/a/b.cpp`.
pub fn relative_to_root(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}
