//! Modification timestamps with nanosecond resolution.

use std::fmt;
use std::fs::Metadata;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A file modification time, split into whole seconds and a sub-second part.
///
/// Ordering compares seconds first and breaks ties on the nanosecond
/// component, so two writes within the same second still order correctly
/// on filesystems that record sub-second times.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    secs: i64,
    nanos: u32,
}

impl Timestamp {
    /// Creates a timestamp from seconds and nanoseconds relative to the Unix epoch.
    ///
    /// `nanos` values of one second or more are carried into `secs`.
    pub fn new(secs: i64, nanos: u32) -> Self {
        let carry = i64::from(nanos / 1_000_000_000);
        Self {
            secs: secs + carry,
            nanos: nanos % 1_000_000_000,
        }
    }

    /// Converts a [`SystemTime`], including times before the epoch.
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Self::new(after.as_secs() as i64, after.subsec_nanos()),
            Err(err) => {
                let before: Duration = err.duration();
                if before.subsec_nanos() == 0 {
                    Self::new(-(before.as_secs() as i64), 0)
                } else {
                    Self::new(
                        -(before.as_secs() as i64) - 1,
                        1_000_000_000 - before.subsec_nanos(),
                    )
                }
            }
        }
    }

    /// Reads the modification time out of file metadata.
    pub fn from_metadata(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self::new(meta.mtime(), meta.mtime_nsec() as u32)
    }

    /// Whole seconds since the Unix epoch.
    pub fn secs(self) -> i64 {
        self.secs
    }

    /// Sub-second component in nanoseconds.
    pub fn nanos(self) -> u32 {
        self.nanos
    }

    /// Returns `true` if `self` is strictly later than `other`.
    pub fn is_newer_than(self, other: Timestamp) -> bool {
        self > other
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nanos)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({self})")
    }
}
