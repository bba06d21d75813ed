//! Compiler invocation.
//!
//! The orchestrator talks to the compiler only through the [`Toolchain`]
//! trait. [`SystemToolchain`] runs a real C++ compiler; tests substitute
//! their own implementation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use seabang_common::Verbosity;
use tracing::{debug, info};

use crate::error::BuildError;

/// Optimization profile of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildProfile {
    /// Optimized, no debug info.
    #[default]
    Release,
    /// Debug info, no optimization.
    Debug,
}

impl BuildProfile {
    /// Returns the debug profile when `debug` is set.
    pub fn from_debug(debug: bool) -> Self {
        if debug {
            BuildProfile::Debug
        } else {
            BuildProfile::Release
        }
    }

    /// Compiler flags selecting this profile.
    pub fn flags(self) -> &'static [&'static str] {
        match self {
            BuildProfile::Release => &["-O2", "-g0", "-DRELEASE_BUILD", "-DNDEBUG"],
            BuildProfile::Debug => &["-g2", "-DDEBUG_BUILD"],
        }
    }
}

/// Libraries every program is linked against.
pub const LINK_LIBRARIES: [&str; 3] = ["-lm", "-lstdc++", "-lpthread"];

/// One compiler invocation.
#[derive(Debug, Clone)]
pub struct CompileRequest<'a> {
    /// The stripped copy to compile.
    pub source: &'a Path,
    /// Where the compiler must write the binary.
    pub output: &'a Path,
    /// Working directory of the compiler process.
    pub working_dir: &'a Path,
    /// Directory the launcher was invoked from, added with `-I`.
    pub invocation_dir: &'a Path,
    /// Release or debug flags.
    pub profile: BuildProfile,
    /// Value for `-std=`.
    pub standard: &'a str,
    /// Adds `-v` when verbose.
    pub verbosity: Verbosity,
    /// Pass-through flags from the launcher line, in order.
    pub extra_flags: &'a [String],
}

impl CompileRequest<'_> {
    /// Builds the compiler's argument list.
    ///
    /// Order: source, profile flags, `-I<invocation dir>`, `-std=`, `-Wall`,
    /// link libraries, `-v` when verbose, pass-through flags, `-o <output>`.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![self.source.as_os_str().to_owned()];
        args.extend(self.profile.flags().iter().map(OsString::from));

        let mut include = OsString::from("-I");
        include.push(self.invocation_dir);
        args.push(include);

        args.push(format!("-std={}", self.standard).into());
        args.push("-Wall".into());
        args.extend(LINK_LIBRARIES.iter().map(OsString::from));
        if self.verbosity.is_verbose() {
            args.push("-v".into());
        }
        args.extend(self.extra_flags.iter().map(OsString::from));
        args.push("-o".into());
        args.push(self.output.as_os_str().to_owned());
        args
    }
}

/// What a compiler run reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutcome {
    /// Whether the compiler exited with status zero.
    pub success: bool,
    /// Human-readable exit status.
    pub status: String,
    /// Combined stdout and stderr.
    pub output: String,
}

/// Something that can turn a stripped copy into a binary.
pub trait Toolchain {
    /// Runs one compilation. `Err` means the compiler could not be run at
    /// all; a compiler that ran and failed is an `Ok` with `success: false`.
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutcome, BuildError>;
}

impl<T: Toolchain + ?Sized> Toolchain for &T {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutcome, BuildError> {
        (**self).compile(request)
    }
}

/// Invokes a C++ compiler executable.
#[derive(Debug, Clone)]
pub struct SystemToolchain {
    compiler: PathBuf,
}

impl SystemToolchain {
    /// Creates a toolchain running `compiler`, looked up on `PATH` when it
    /// has no directory part.
    pub fn new(compiler: impl Into<PathBuf>) -> Self {
        Self {
            compiler: compiler.into(),
        }
    }

    /// The compiler executable.
    pub fn compiler(&self) -> &Path {
        &self.compiler
    }
}

impl Toolchain for SystemToolchain {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutcome, BuildError> {
        let mut cmd = Command::new(&self.compiler);
        cmd.args(request.args()).current_dir(request.working_dir);
        info!(compiler = %self.compiler.display(), source = %request.source.display(), "compiling");
        run_captured(cmd, &self.compiler)
    }
}

/// Runs `cmd` to completion, capturing its output.
pub(crate) fn run_captured(
    mut cmd: Command,
    program: &Path,
) -> Result<CompileOutcome, BuildError> {
    debug!(command = ?cmd, "spawning compiler");
    let output = cmd.output().map_err(|e| BuildError::io(program, e))?;
    let outcome = outcome_from(output);
    info!(success = outcome.success, status = %outcome.status, "compiler finished");
    Ok(outcome)
}

fn outcome_from(output: Output) -> CompileOutcome {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    CompileOutcome {
        success: output.status.success(),
        status: output.status.to_string(),
        output: text,
    }
}
