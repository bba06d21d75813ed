//! The build-and-run state machine.
//!
//! A launch moves through these stages:
//!
//! ```text
//! Init -> PathsComputed -> DecisionPending -+-> UpToDate -------------+-> Executing -> Terminal(code)
//!                                           +-> Rebuilding -> Compiled +
//! ```
//!
//! Any I/O failure moves to `Error`, which is terminal. Nothing is retried.

use std::ffi::OsString;
use std::fmt;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use seabang_common::{clean_path, Verbosity};
use seabang_config::Settings;
use seabang_deps::{Resolver, Staleness, TimestampStore};
use tracing::{debug, info};

use crate::artifact::{ArtifactPaths, Layout};
use crate::error::BuildError;
use crate::lock::RebuildLock;
use crate::strip::write_stripped_copy;
use crate::toolchain::{BuildProfile, CompileRequest, Toolchain};

/// Everything the orchestrator needs besides the source path.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Rebuild even if nothing is stale.
    pub force_rebuild: bool,
    /// Release or debug compiler flags.
    pub profile: BuildProfile,
    /// Mirrored or compact artifact layout.
    pub layout: Layout,
    /// Whether compiler output is surfaced on success and `-v` is passed.
    pub verbosity: Verbosity,
    /// Single-dash flags passed through to the compiler, in order.
    pub compiler_flags: Vec<String>,
    /// Include roots searched after the invocation directory.
    pub include_roots: Vec<PathBuf>,
    /// Value of `-std=`.
    pub language_standard: String,
    /// Root of the artifact tree, usually `<temp folder>/seabang`.
    pub artifact_root: PathBuf,
    /// Directory the launcher was started from.
    pub invocation_dir: PathBuf,
}

impl BuildOptions {
    /// Builds options from resolved settings, with everything else off.
    pub fn from_settings(settings: &Settings, invocation_dir: PathBuf) -> Self {
        Self {
            force_rebuild: false,
            profile: BuildProfile::Release,
            layout: Layout::from_compact(settings.compact_layout.value),
            verbosity: Verbosity::Normal,
            compiler_flags: Vec::new(),
            include_roots: settings.include_roots.value.clone(),
            language_standard: settings.language_standard.value.clone(),
            artifact_root: settings.artifact_root(),
            invocation_dir,
        }
    }

    /// Directories searched for includes: the invocation directory, the
    /// include roots, then any `-I<dir>` pass-through flags.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.invocation_dir.clone()];
        paths.extend(self.include_roots.iter().cloned());
        paths.extend(
            self.compiler_flags
                .iter()
                .filter_map(|flag| flag.strip_prefix("-I"))
                .filter(|dir| !dir.is_empty())
                .map(|dir| clean_path(&self.invocation_dir, Path::new(dir))),
        );
        paths
    }
}

/// Why a rebuild is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
    /// The caller asked for it.
    ForcedByCaller,
    /// The stripped copy is missing or older than the source.
    StrippedCopyMissingOrStale,
    /// The named file in the include closure is newer than the binary.
    DependencyStale(PathBuf),
    /// There is no binary.
    ArtifactMissing,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildReason::ForcedByCaller => write!(f, "rebuild forced"),
            RebuildReason::StrippedCopyMissingOrStale => {
                write!(f, "stripped copy missing or out of date")
            }
            RebuildReason::DependencyStale(path) => {
                write!(f, "{} is newer than the binary", path.display())
            }
            RebuildReason::ArtifactMissing => write!(f, "binary missing"),
        }
    }
}

/// Outcome of the staleness checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildDecision {
    /// The binary can be run as is.
    UpToDate,
    /// The binary must be rebuilt first.
    RebuildRequired(RebuildReason),
}

impl RebuildDecision {
    /// Returns `true` for [`RebuildDecision::RebuildRequired`].
    pub fn requires_rebuild(&self) -> bool {
        matches!(self, RebuildDecision::RebuildRequired(_))
    }
}

/// Where a launch currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Nothing done yet.
    Init,
    /// Artifact paths derived and checked.
    PathsComputed,
    /// Staleness being evaluated.
    DecisionPending,
    /// The existing binary is current.
    UpToDate,
    /// Stripping and compiling.
    Rebuilding,
    /// The compiler has run.
    Compiled,
    /// The program is running.
    Executing,
    /// The program finished with this exit code.
    Terminal(i32),
    /// The launch failed.
    Error,
}

/// How control is passed to the compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Handoff {
    /// Spawn the program, wait, and return its exit code.
    #[default]
    RunToCompletion,
    /// Replace the current process with the program. Only returns on failure.
    ReplaceProcess,
}

/// Result of making sure a binary is ready.
#[derive(Debug, Clone)]
pub struct Prepared {
    /// The artifact locations.
    pub paths: ArtifactPaths,
    /// What the staleness checks decided.
    pub decision: RebuildDecision,
    /// Whether the compiler ran during this launch.
    pub compiled: bool,
    /// Compiler output, kept only in verbose mode.
    pub compiler_output: Option<String>,
}

/// Drives one launch of one source file.
///
/// Created fresh for every invocation; its caches do not outlive it.
#[derive(Debug)]
pub struct Orchestrator<T> {
    toolchain: T,
    options: BuildOptions,
    resolver: Resolver,
    stage: Stage,
}

impl<T: Toolchain> Orchestrator<T> {
    /// Creates an orchestrator using `toolchain` to compile.
    pub fn new(toolchain: T, options: BuildOptions) -> Self {
        Self {
            toolchain,
            options,
            resolver: Resolver::new(),
            stage: Stage::Init,
        }
    }

    /// The stage reached so far.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Builds `source` if needed, then runs it with `program_args`.
    ///
    /// Returns the program's exit code. With [`Handoff::ReplaceProcess`]
    /// this only returns on failure.
    pub fn launch(
        &mut self,
        source: &Path,
        program_args: &[OsString],
        handoff: Handoff,
    ) -> Result<i32, BuildError> {
        let result = self
            .prepare(source)
            .and_then(|prepared| self.execute(&prepared.paths, program_args, handoff));
        self.stage = match &result {
            Ok(code) => Stage::Terminal(*code),
            Err(_) => Stage::Error,
        };
        result
    }

    /// Makes sure an up-to-date binary exists for `source`, compiling it if
    /// necessary.
    pub fn prepare(&mut self, source: &Path) -> Result<Prepared, BuildError> {
        let result = self.prepare_inner(source);
        if result.is_err() {
            self.stage = Stage::Error;
        }
        result
    }

    fn prepare_inner(&mut self, source: &Path) -> Result<Prepared, BuildError> {
        let paths = self.artifact_paths(source)?;

        std::fs::create_dir_all(paths.temp_dir()).map_err(|e| BuildError::TempDirUnwritable {
            path: paths.temp_dir().to_path_buf(),
            source: e,
        })?;

        let decision = self.decide(&paths);
        let (compiled, output) = match &decision {
            RebuildDecision::UpToDate => {
                self.stage = Stage::UpToDate;
                debug!(binary = %paths.binary().display(), "binary up to date");
                (false, None)
            }
            RebuildDecision::RebuildRequired(reason) => {
                info!(source = %paths.source().display(), %reason, "rebuilding");
                match self.rebuild(&paths, reason)? {
                    Some(output) => (true, Some(output)),
                    None => (false, None),
                }
            }
        };

        let compiler_output = output.filter(|_| self.options.verbosity.is_verbose());
        Ok(Prepared {
            paths,
            decision,
            compiled,
            compiler_output,
        })
    }

    /// Derives and checks the artifact paths for `source`.
    pub fn artifact_paths(&mut self, source: &Path) -> Result<ArtifactPaths, BuildError> {
        let absolute = clean_path(&self.options.invocation_dir, source);
        std::fs::metadata(&absolute).map_err(|e| BuildError::SourceNotFound {
            path: absolute.clone(),
            source: e,
        })?;

        let root = clean_path(&self.options.invocation_dir, &self.options.artifact_root);
        let paths = ArtifactPaths::derive(&absolute, &root, self.options.layout);
        paths.check_collision()?;

        debug!(
            stripped = %paths.stripped().display(),
            binary = %paths.binary().display(),
            "artifact paths"
        );
        self.stage = Stage::PathsComputed;
        Ok(paths)
    }

    /// Runs the staleness checks in order, stopping at the first that fires:
    /// forced rebuild, stripped copy, include closure, binary existence.
    pub fn decide(&mut self, paths: &ArtifactPaths) -> RebuildDecision {
        self.stage = Stage::DecisionPending;

        if self.options.force_rebuild {
            return RebuildDecision::RebuildRequired(RebuildReason::ForcedByCaller);
        }

        let mut times = TimestampStore::new();
        let stripped_missing = times.stamp(paths.stripped()).is_none();
        if stripped_missing || times.is_newer(paths.source(), paths.stripped()) {
            return RebuildDecision::RebuildRequired(RebuildReason::StrippedCopyMissingOrStale);
        }

        let search_paths = self.options.search_paths();
        let stale = self
            .resolver
            .staleness(paths.source(), paths.binary(), &search_paths)
            .map(|staleness| match staleness {
                Staleness::ArtifactMissing => RebuildReason::ArtifactMissing,
                Staleness::SourceNewer => {
                    RebuildReason::DependencyStale(paths.source().to_path_buf())
                }
                Staleness::DependencyNewer(path) => RebuildReason::DependencyStale(path),
            });
        if let Some(reason) = stale {
            return RebuildDecision::RebuildRequired(reason);
        }

        if !paths.binary().is_file() {
            return RebuildDecision::RebuildRequired(RebuildReason::ArtifactMissing);
        }
        RebuildDecision::UpToDate
    }

    /// Strips and compiles under the artifact's rebuild lock.
    ///
    /// Returns the compiler output, or `None` if a concurrent launch
    /// produced a fresh binary while this one waited for the lock.
    fn rebuild(
        &mut self,
        paths: &ArtifactPaths,
        reason: &RebuildReason,
    ) -> Result<Option<String>, BuildError> {
        self.stage = Stage::Rebuilding;
        let _lock = RebuildLock::acquire(&paths.lock_file()).map_err(|e| {
            BuildError::TempDirUnwritable {
                path: paths.temp_dir().to_path_buf(),
                source: e,
            }
        })?;

        if *reason != RebuildReason::ForcedByCaller {
            self.resolver = Resolver::new();
            if self.decide(paths) == RebuildDecision::UpToDate {
                info!(binary = %paths.binary().display(), "binary rebuilt by a concurrent launch");
                self.stage = Stage::UpToDate;
                return Ok(None);
            }
            self.stage = Stage::Rebuilding;
        }

        write_stripped_copy(paths)?;
        remove_if_present(paths.binary())?;
        let partial = paths.partial_binary();
        remove_if_present(&partial)?;

        let request = CompileRequest {
            source: paths.stripped(),
            output: &partial,
            working_dir: paths.temp_dir(),
            invocation_dir: &self.options.invocation_dir,
            profile: self.options.profile,
            standard: &self.options.language_standard,
            verbosity: self.options.verbosity,
            extra_flags: &self.options.compiler_flags,
        };
        let outcome = self.toolchain.compile(&request)?;
        self.stage = Stage::Compiled;

        if !outcome.success {
            let _ = std::fs::remove_file(&partial);
            return Err(BuildError::CompileFailure {
                path: paths.stripped().to_path_buf(),
                status: outcome.status,
                output: outcome.output,
            });
        }
        if !partial.is_file() {
            return Err(BuildError::ArtifactMissingAfterCompile {
                path: paths.binary().to_path_buf(),
            });
        }
        std::fs::rename(&partial, paths.binary())
            .map_err(|e| BuildError::io(paths.binary(), e))?;

        info!(binary = %paths.binary().display(), "build finished");
        Ok(Some(outcome.output))
    }

    /// Runs the compiled binary from the invocation directory.
    pub fn execute(
        &mut self,
        paths: &ArtifactPaths,
        program_args: &[OsString],
        handoff: Handoff,
    ) -> Result<i32, BuildError> {
        let binary = paths.binary();
        let lock_file = paths.lock_file();
        // Held until the program has started. The descriptor is
        // close-on-exec, so a replaced process drops it once the kernel has
        // loaded the binary.
        let handoff_lock =
            RebuildLock::acquire_shared(&lock_file).map_err(|e| BuildError::io(&lock_file, e))?;
        if !binary.is_file() {
            return Err(BuildError::ArtifactMissingAfterCompile {
                path: binary.to_path_buf(),
            });
        }
        self.stage = Stage::Executing;

        let mut cmd = Command::new(binary);
        cmd.args(program_args)
            .current_dir(&self.options.invocation_dir);
        debug!(binary = %binary.display(), ?handoff, "handing off");

        let exec_failure = |e: std::io::Error| BuildError::ExecFailure {
            path: binary.to_path_buf(),
            source: e,
        };
        match handoff {
            Handoff::RunToCompletion => {
                let mut child = cmd.spawn().map_err(exec_failure)?;
                drop(handoff_lock);
                let status = child.wait().map_err(|e| BuildError::io(binary, e))?;
                Ok(exit_code_of(status))
            }
            Handoff::ReplaceProcess => Err(exec_failure(cmd.exec())),
        }
    }
}

/// Maps a child's status to an exit code the way shells do: a signal `n`
/// becomes `128 + n`.
fn exit_code_of(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

fn remove_if_present(path: &Path) -> Result<(), BuildError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::{CompileOutcome, SystemToolchain};
    use std::cell::RefCell;
    use std::time::{Duration, SystemTime};

    /// Stands in for a C++ compiler: "compiles" by prefixing the source with
    /// `#!/bin/sh`, so test programs are shell scripts. Fails when given
    /// `-DFAIL_BUILD`.
    const FAKE_COMPILER: &str = r#"
src="$1"; out=""; prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
case " $* " in
  *" -DFAIL_BUILD "*) echo "fake: error: build failed" >&2; exit 1 ;;
esac
{ echo '#!/bin/sh'; cat "$src"; } > "$out"
chmod +x "$out"
echo "fake: compiled $src"
"#;

    /// Records every compile request and runs a shell script in place of the
    /// compiler. The script runs in a child process, so the test process
    /// never holds the produced binary open for writing.
    struct ShellToolchain {
        script: &'static str,
        calls: RefCell<Vec<Vec<OsString>>>,
    }

    impl ShellToolchain {
        fn new() -> Self {
            Self::with_script(FAKE_COMPILER)
        }

        fn with_script(script: &'static str) -> Self {
            Self {
                script,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn compile_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl Toolchain for ShellToolchain {
        fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutcome, BuildError> {
            let args = request.args();
            self.calls.borrow_mut().push(args.clone());
            let mut cmd = Command::new("sh");
            cmd.arg("-c")
                .arg(self.script)
                .arg("fake-c++")
                .args(&args)
                .current_dir(request.working_dir);
            crate::toolchain::run_captured(cmd, Path::new("sh"))
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn options(&self) -> BuildOptions {
            BuildOptions {
                force_rebuild: false,
                profile: BuildProfile::Release,
                layout: Layout::Mirrored,
                verbosity: Verbosity::Normal,
                compiler_flags: Vec::new(),
                include_roots: Vec::new(),
                language_standard: "c++17".to_string(),
                artifact_root: self.root().join("tmp").join("seabang"),
                invocation_dir: self.root().to_path_buf(),
            }
        }

        fn write(&self, name: &str, content: &str) -> PathBuf {
            let path = self.root().join(name);
            std::fs::write(&path, content).unwrap();
            path
        }

        fn paths(&self, source: &Path) -> ArtifactPaths {
            ArtifactPaths::derive(
                source,
                &self.root().join("tmp").join("seabang"),
                Layout::Mirrored,
            )
        }
    }

    fn launch(
        toolchain: &ShellToolchain,
        options: BuildOptions,
        source: &Path,
        args: &[&str],
    ) -> Result<i32, BuildError> {
        let args: Vec<OsString> = args.iter().map(OsString::from).collect();
        Orchestrator::new(toolchain, options).launch(source, &args, Handoff::RunToCompletion)
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }

    fn an_hour_from_now() -> SystemTime {
        SystemTime::now() + Duration::from_secs(3600)
    }

    #[test]
    fn first_launch_compiles_and_forwards_exit_code() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 7\n");
        let toolchain = ShellToolchain::new();

        let mut orch = Orchestrator::new(&toolchain, fx.options());
        let code = orch.launch(&source, &[], Handoff::RunToCompletion).unwrap();

        assert_eq!(code, 7);
        assert_eq!(orch.stage(), Stage::Terminal(7));
        assert_eq!(toolchain.compile_count(), 1);
        assert!(fx.paths(&source).binary().is_file());
        assert!(!fx.paths(&source).partial_binary().exists());
    }

    #[test]
    fn compiler_receives_deterministic_arguments() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 0\n");
        let toolchain = ShellToolchain::new();
        let mut options = fx.options();
        options.compiler_flags = vec!["-lncurses".to_string()];

        launch(&toolchain, options, &source, &[]).unwrap();

        let paths = fx.paths(&source);
        let calls = toolchain.calls.borrow();
        let args: Vec<String> = calls[0]
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let include = format!("-I{}", fx.root().display());
        let output = paths.partial_binary().display().to_string();
        let stripped = paths.stripped().display().to_string();
        assert_eq!(
            args,
            [
                stripped.as_str(),
                "-O2",
                "-g0",
                "-DRELEASE_BUILD",
                "-DNDEBUG",
                include.as_str(),
                "-std=c++17",
                "-Wall",
                "-lm",
                "-lstdc++",
                "-lpthread",
                "-lncurses",
                "-o",
                output.as_str(),
            ]
        );
    }

    #[test]
    fn second_launch_reuses_binary() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 0\n");
        let toolchain = ShellToolchain::new();

        assert_eq!(launch(&toolchain, fx.options(), &source, &[]).unwrap(), 0);
        assert_eq!(launch(&toolchain, fx.options(), &source, &[]).unwrap(), 0);
        assert_eq!(toolchain.compile_count(), 1);
    }

    #[test]
    fn up_to_date_launch_reports_decision() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 0\n");
        let toolchain = ShellToolchain::new();
        launch(&toolchain, fx.options(), &source, &[]).unwrap();

        let mut orch = Orchestrator::new(&toolchain, fx.options());
        let prepared = orch.prepare(&source).unwrap();
        assert_eq!(prepared.decision, RebuildDecision::UpToDate);
        assert!(!prepared.compiled);
        assert_eq!(orch.stage(), Stage::UpToDate);
    }

    #[test]
    fn forced_rebuild_compiles_unchanged_source() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 0\n");
        let toolchain = ShellToolchain::new();
        launch(&toolchain, fx.options(), &source, &[]).unwrap();

        let mut options = fx.options();
        options.force_rebuild = true;
        let mut orch = Orchestrator::new(&toolchain, options);
        let prepared = orch.prepare(&source).unwrap();

        assert_eq!(
            prepared.decision,
            RebuildDecision::RebuildRequired(RebuildReason::ForcedByCaller)
        );
        assert!(prepared.compiled);
        assert_eq!(toolchain.compile_count(), 2);
    }

    #[test]
    fn touched_header_triggers_rebuild() {
        let fx = Fixture::new();
        let header = fx.write("config.h", "// settings\n");
        let source = fx.write("a.src", "#!/usr/bin/seabang\n#include \"config.h\"\nexit 0\n");
        let toolchain = ShellToolchain::new();
        launch(&toolchain, fx.options(), &source, &[]).unwrap();

        set_mtime(&header, an_hour_from_now());

        let mut orch = Orchestrator::new(&toolchain, fx.options());
        let prepared = orch.prepare(&source).unwrap();
        assert_eq!(
            prepared.decision,
            RebuildDecision::RebuildRequired(RebuildReason::DependencyStale(header))
        );
        assert_eq!(toolchain.compile_count(), 2);
    }

    #[test]
    fn header_found_through_pass_through_include_dir() {
        let fx = Fixture::new();
        std::fs::create_dir(fx.root().join("inc")).unwrap();
        let header = fx.write("inc/lib.h", "");
        let source = fx.write("a.src", "#!/usr/bin/seabang\n#include <lib.h>\nexit 0\n");
        let toolchain = ShellToolchain::new();
        let mut options = fx.options();
        options.compiler_flags = vec!["-Iinc".to_string()];
        launch(&toolchain, options.clone(), &source, &[]).unwrap();

        set_mtime(&header, an_hour_from_now());
        launch(&toolchain, options, &source, &[]).unwrap();
        assert_eq!(toolchain.compile_count(), 2);
    }

    #[test]
    fn touched_source_refreshes_stripped_copy() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 1\n");
        let toolchain = ShellToolchain::new();
        assert_eq!(launch(&toolchain, fx.options(), &source, &[]).unwrap(), 1);

        std::fs::write(&source, "#!/usr/bin/seabang\nexit 2\n").unwrap();
        set_mtime(&source, an_hour_from_now());

        let mut orch = Orchestrator::new(&toolchain, fx.options());
        assert_eq!(
            orch.decide(&fx.paths(&source)),
            RebuildDecision::RebuildRequired(RebuildReason::StrippedCopyMissingOrStale)
        );
        assert_eq!(launch(&toolchain, fx.options(), &source, &[]).unwrap(), 2);
        assert_eq!(toolchain.compile_count(), 2);
    }

    #[test]
    fn deleted_binary_is_rebuilt() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 0\n");
        let toolchain = ShellToolchain::new();
        launch(&toolchain, fx.options(), &source, &[]).unwrap();

        let paths = fx.paths(&source);
        std::fs::remove_file(paths.binary()).unwrap();

        let mut orch = Orchestrator::new(&toolchain, fx.options());
        assert_eq!(
            orch.decide(&paths),
            RebuildDecision::RebuildRequired(RebuildReason::ArtifactMissing)
        );
    }

    #[test]
    fn malformed_source_produces_nothing() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "exit 0\n");
        let toolchain = ShellToolchain::new();

        let mut orch = Orchestrator::new(&toolchain, fx.options());
        let err = orch.launch(&source, &[], Handoff::RunToCompletion).unwrap_err();

        assert!(matches!(err, BuildError::MalformedSource { .. }));
        assert_eq!(orch.stage(), Stage::Error);
        assert_eq!(toolchain.compile_count(), 0);
        let paths = fx.paths(&source);
        assert!(!paths.stripped().exists());
        assert!(!paths.binary().exists());
    }

    #[test]
    fn compile_failure_surfaces_output_and_removes_binary() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 0\n");
        let toolchain = ShellToolchain::new();
        launch(&toolchain, fx.options(), &source, &[]).unwrap();

        let mut options = fx.options();
        options.force_rebuild = true;
        options.compiler_flags = vec!["-DFAIL_BUILD".to_string()];
        let err = launch(&toolchain, options, &source, &[]).unwrap_err();

        assert!(matches!(err, BuildError::CompileFailure { .. }));
        assert!(err
            .compiler_output()
            .is_some_and(|out| out.contains("fake: error: build failed")));
        let paths = fx.paths(&source);
        assert!(!paths.binary().exists());
        assert!(!paths.partial_binary().exists());
    }

    #[test]
    fn silent_compiler_success_is_detected() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 0\n");
        let toolchain = ShellToolchain::with_script("exit 0");

        let err = launch(&toolchain, fx.options(), &source, &[]).unwrap_err();
        assert!(matches!(err, BuildError::ArtifactMissingAfterCompile { .. }));
    }

    #[test]
    fn missing_compiler_is_reported() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 0\n");
        let toolchain = SystemToolchain::new("/nonexistent/bin/c++");

        let err = Orchestrator::new(toolchain, fx.options())
            .launch(&source, &[], Handoff::RunToCompletion)
            .unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
    }

    #[test]
    fn missing_source_is_reported() {
        let fx = Fixture::new();
        let toolchain = ShellToolchain::new();
        let err = launch(&toolchain, fx.options(), &fx.root().join("gone.src"), &[]).unwrap_err();
        assert!(matches!(err, BuildError::SourceNotFound { .. }));
    }

    #[test]
    fn path_collision_is_rejected() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 0\n");
        let link = fx.root().join("artifacts");
        std::os::unix::fs::symlink(fx.root(), &link).unwrap();

        let mut options = fx.options();
        options.layout = Layout::Compact;
        options.artifact_root = link;
        let toolchain = ShellToolchain::new();

        let err = launch(&toolchain, options, &source, &[]).unwrap_err();
        assert!(matches!(err, BuildError::PathCollision { .. }));
        assert_eq!(
            std::fs::read_to_string(&source).unwrap(),
            "#!/usr/bin/seabang\nexit 0\n"
        );
    }

    #[test]
    fn unwritable_temp_dir_is_reported() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 0\n");
        let blocker = fx.write("not-a-dir", "");

        let mut options = fx.options();
        options.artifact_root = blocker.join("seabang");
        let toolchain = ShellToolchain::new();

        let err = launch(&toolchain, options, &source, &[]).unwrap_err();
        assert!(matches!(err, BuildError::TempDirUnwritable { .. }));
    }

    #[test]
    fn program_arguments_and_directory_are_forwarded() {
        let fx = Fixture::new();
        let expected = fx.root().canonicalize().unwrap();
        let source = fx.write(
            "a.src",
            "#!/usr/bin/seabang\n[ \"$(pwd -P)\" = \"$1\" ] || exit 99\nexit $#\n",
        );
        let toolchain = ShellToolchain::new();
        let dir = expected.to_string_lossy().into_owned();

        let code = launch(&toolchain, fx.options(), &source, &[&dir, "b", "c"]).unwrap();
        assert_eq!(code, 3);
    }

    #[test]
    fn signal_maps_to_128_plus_signal() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nkill -TERM $$\n");
        let toolchain = ShellToolchain::new();
        assert_eq!(
            launch(&toolchain, fx.options(), &source, &[]).unwrap(),
            128 + libc::SIGTERM
        );
    }

    #[test]
    fn verbose_mode_keeps_compiler_output() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 0\n");
        let toolchain = ShellToolchain::new();

        let mut quiet = Orchestrator::new(&toolchain, fx.options());
        assert_eq!(quiet.prepare(&source).unwrap().compiler_output, None);

        let mut options = fx.options();
        options.verbosity = Verbosity::Verbose;
        options.force_rebuild = true;
        let mut verbose = Orchestrator::new(&toolchain, options);
        let output = verbose.prepare(&source).unwrap().compiler_output.unwrap();
        assert!(output.contains("fake: compiled"));
        assert!(toolchain.calls.borrow()[1].contains(&OsString::from("-v")));
    }

    #[test]
    fn compact_layout_flattens_artifacts() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 0\n");
        let toolchain = ShellToolchain::new();
        let mut options = fx.options();
        options.layout = Layout::Compact;

        launch(&toolchain, options, &source, &[]).unwrap();
        assert!(fx.root().join("tmp/seabang/a.src.exe").is_file());
    }

    #[test]
    fn concurrent_rebuild_is_not_repeated() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 0\n");
        let toolchain = ShellToolchain::new();

        // The second launch decides before the first one builds...
        let mut late = Orchestrator::new(&toolchain, fx.options());
        let paths = late.artifact_paths(&source).unwrap();
        std::fs::create_dir_all(paths.temp_dir()).unwrap();
        let decision = late.decide(&paths);
        assert!(decision.requires_rebuild());

        launch(&toolchain, fx.options(), &source, &[]).unwrap();
        assert_eq!(toolchain.compile_count(), 1);

        // ...and finds a fresh binary once it holds the lock.
        let RebuildDecision::RebuildRequired(reason) = decision else {
            unreachable!()
        };
        assert_eq!(late.rebuild(&paths, &reason).unwrap(), None);
        assert_eq!(toolchain.compile_count(), 1);
    }

    #[test]
    fn handoff_waits_for_running_rebuild() {
        let fx = Fixture::new();
        let source = fx.write("a.src", "#!/usr/bin/seabang\nexit 5\n");
        let toolchain = ShellToolchain::new();
        let mut orch = Orchestrator::new(&toolchain, fx.options());
        let prepared = orch.prepare(&source).unwrap();

        // A forced rebuild elsewhere holds the lock and has removed the binary.
        let binary = prepared.paths.binary().to_path_buf();
        let moved = fx.root().join("a.src.exe.moved");
        let lock = RebuildLock::acquire(&prepared.paths.lock_file()).unwrap();
        std::fs::rename(&binary, &moved).unwrap();
        let rebuilder = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            std::fs::rename(&moved, &binary).unwrap();
            drop(lock);
        });

        let code = orch
            .execute(&prepared.paths, &[], Handoff::RunToCompletion)
            .unwrap();
        rebuilder.join().unwrap();
        assert_eq!(code, 5);
    }

    #[test]
    fn search_paths_order() {
        let fx = Fixture::new();
        let mut options = fx.options();
        options.include_roots = vec![PathBuf::from("/usr/include")];
        options.compiler_flags = vec![
            "-O3".to_string(),
            "-Ilocal".to_string(),
            "-I/opt/inc".to_string(),
        ];
        assert_eq!(
            options.search_paths(),
            vec![
                fx.root().to_path_buf(),
                PathBuf::from("/usr/include"),
                fx.root().join("local"),
                PathBuf::from("/opt/inc"),
            ]
        );
    }

    #[test]
    fn reason_display() {
        assert_eq!(RebuildReason::ArtifactMissing.to_string(), "binary missing");
        assert_eq!(
            RebuildReason::DependencyStale(PathBuf::from("/a/b.h")).to_string(),
            "/a/b.h is newer than the binary"
        );
    }
}
