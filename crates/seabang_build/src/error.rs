//! Error types for the build-and-run sequence.

use std::path::PathBuf;

use seabang_config::ConfigError;

/// Everything that can end a launch before the program runs.
///
/// Every variant is terminal: the orchestrator never retries. The binary
/// reports the message on stderr and exits with [`BuildError::exit_code`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The source file does not exist or cannot be opened.
    #[error("source file {path} not found: {source}")]
    SourceNotFound {
        /// The path that was given.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The first line of the source is not a `#!` launcher directive.
    #[error("{path} does not start with a `#!` line")]
    MalformedSource {
        /// The offending source file.
        path: PathBuf,
    },

    /// The stripped copy would overwrite the source file itself.
    #[error("stripped copy {stripped} is the source file {path}")]
    PathCollision {
        /// The source file.
        path: PathBuf,
        /// The derived stripped-copy path.
        stripped: PathBuf,
    },

    /// The artifact directory could not be created.
    #[error("cannot create temp directory {path}: {source}")]
    TempDirUnwritable {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The compiler exited unsuccessfully.
    #[error("compilation of {path} failed ({status})")]
    CompileFailure {
        /// The stripped copy handed to the compiler.
        path: PathBuf,
        /// Human-readable exit status of the compiler.
        status: String,
        /// Combined stdout and stderr of the compiler.
        output: String,
    },

    /// The compiler reported success but produced no binary.
    #[error("compiler reported success but {path} was not produced")]
    ArtifactMissingAfterCompile {
        /// The expected binary path.
        path: PathBuf,
    },

    /// The compiled program could not be started.
    #[error("failed to execute {path}: {source}")]
    ExecFailure {
        /// The binary that failed to start.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An I/O error that fits no more specific category.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Settings could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BuildError {
    /// The process exit code to report for this error. Never zero.
    ///
    /// Failures to start the program use 126, as shells do for a command
    /// that was found but could not be executed; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::ExecFailure { .. } => 126,
            _ => 1,
        }
    }

    /// The raw compiler output, for compile failures.
    pub fn compiler_output(&self) -> Option<&str> {
        match self {
            BuildError::CompileFailure { output, .. } => Some(output),
            _ => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}
