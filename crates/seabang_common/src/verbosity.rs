//! Verbosity carried explicitly through the call chain.

/// How chatty a launch should be.
///
/// Passed down as part of the build options instead of living in a global,
/// so the core can be driven as a library and tested without setup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Only errors and the launched program's own output.
    #[default]
    Normal,
    /// Report decisions, paths, and compiler output even on success.
    Verbose,
}

impl Verbosity {
    /// Maps a `--verbose` flag to a verbosity.
    pub fn from_flag(verbose: bool) -> Self {
        if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    /// Returns `true` for [`Verbosity::Verbose`].
    pub fn is_verbose(self) -> bool {
        self == Self::Verbose
    }
}
