//! Per-artifact advisory locking.
//!
//! Two launches of the same script may both decide to rebuild. The
//! [`RebuildLock`] makes the second one wait until the first has finished
//! writing the stripped copy and binary, so nobody ever executes a
//! half-written program.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use tracing::debug;

/// A `flock` held on a lock file. Released when dropped.
///
/// Rebuilds take it exclusively. Launches take it shared while they hand
/// off to the binary, so a concurrent rebuild cannot delete the binary
/// between the existence check and the exec.
///
/// The lock file itself is left in place; deleting it would let a third
/// process lock a fresh inode while a second still waits on the old one.
#[derive(Debug)]
pub struct RebuildLock {
    file: File,
    path: PathBuf,
}

impl RebuildLock {
    /// Blocks until the exclusive lock on `path` is acquired, creating the
    /// file if needed.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        Self::lock(path, libc::LOCK_EX, "exclusive")
    }

    /// Blocks until a shared lock on `path` is acquired. Shared holders
    /// only exclude exclusive ones.
    pub fn acquire_shared(path: &Path) -> io::Result<Self> {
        Self::lock(path, libc::LOCK_SH, "shared")
    }

    /// Tries to acquire the exclusive lock without blocking. Returns
    /// `Ok(None)` if another process holds it.
    #[cfg(test)]
    pub(crate) fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        let file = open_lock_file(path)?;
        match flock(&file, libc::LOCK_EX | libc::LOCK_NB) {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn lock(path: &Path, operation: libc::c_int, mode: &str) -> io::Result<Self> {
        let file = open_lock_file(path)?;
        debug!(lock = %path.display(), mode, "waiting for rebuild lock");
        flock(&file, operation)?;
        debug!(lock = %path.display(), mode, "rebuild lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RebuildLock {
    fn drop(&mut self) {
        // Closing the descriptor would release it too.
        let _ = flock(&self.file, libc::LOCK_UN);
        debug!(lock = %self.path.display(), "rebuild lock released");
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
    loop {
        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}
