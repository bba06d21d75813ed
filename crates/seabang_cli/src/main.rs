//! seabang: run C and C++ source files as scripts.
//!
//! Placed on the `#!` line of a source file, `seabang` compiles the file to a
//! cached binary the first time it runs (and again whenever the file or one
//! of its headers changes), then replaces itself with that binary.

#![warn(missing_docs)]

mod args;

use std::ffi::OsString;
use std::path::PathBuf;
use std::process;

use clap::CommandFactory;
use seabang_build::{
    BuildError, BuildOptions, BuildProfile, Handoff, Orchestrator, SystemToolchain,
};
use seabang_common::Verbosity;
use seabang_config::{resolve_settings, Overrides, ProcessEnv};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::args::{ArgsError, Invocation, LauncherArgs, Parsed};

/// Environment variable overriding the log filter.
const LOG_ENV: &str = "SEABANG_LOG";

fn main() {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("error: cannot determine current directory: {e}");
            process::exit(1);
        }
    };

    let invocation = match args::parse(&argv, &cwd) {
        Ok(Parsed::Run(invocation)) => invocation,
        Ok(Parsed::NoArguments) => {
            if let Err(e) = LauncherArgs::command().print_long_help() {
                eprintln!("error: cannot print help: {e}");
            }
            process::exit(1);
        }
        Err(ArgsError::Clap(e)) => e.exit(),
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("run `seabang --help` for usage");
            process::exit(2);
        }
    };

    let verbosity = Verbosity::from_flag(invocation.launcher.verbose);
    init_logging(verbosity);

    match run(invocation, cwd, verbosity) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            if let Some(output) = e.compiler_output() {
                eprint!("{output}");
            }
            process::exit(e.exit_code());
        }
    }
}

/// Builds the script if needed and hands the process over to it.
///
/// Only returns on failure, since a successful handoff replaces the process.
fn run(invocation: Invocation, cwd: PathBuf, verbosity: Verbosity) -> Result<i32, BuildError> {
    let Invocation {
        launcher,
        compiler_flags,
        source,
        program_args,
    } = invocation;
    debug!(
        source = %source.display(),
        ?compiler_flags,
        ?program_args,
        "partitioned arguments"
    );

    let overrides = Overrides {
        compiler: launcher.compiler,
        temp_folder: launcher.temp_folder,
        compact: launcher.compact,
    };
    let settings = resolve_settings(&overrides, &ProcessEnv)?;
    debug!(
        compiler = %settings.compiler.value.display(),
        artifact_root = %settings.artifact_root().display(),
        "using settings"
    );

    let mut options = BuildOptions::from_settings(&settings, cwd);
    options.force_rebuild = launcher.rebuild;
    options.profile = BuildProfile::from_debug(launcher.debug);
    options.verbosity = verbosity;
    options.compiler_flags = compiler_flags;

    let toolchain = SystemToolchain::new(settings.compiler.value);
    let mut orchestrator = Orchestrator::new(toolchain, options);
    let prepared = orchestrator.prepare(&source)?;
    if let Some(output) = prepared.compiler_output.as_deref() {
        eprint!("{output}");
    }

    info!(binary = %prepared.paths.binary().display(), "running");
    orchestrator.execute(&prepared.paths, &program_args, Handoff::ReplaceProcess)
}

/// Installs the stderr log subscriber. `SEABANG_LOG` overrides the level
/// implied by `--verbose`.
fn init_logging(verbosity: Verbosity) {
    let default_level = if verbosity.is_verbose() { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();
}
