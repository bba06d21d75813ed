//! Splitting a `#!` invocation into launcher options, source and program
//! arguments.
//!
//! The kernel hands everything after the interpreter path on a `#!` line to
//! the interpreter as a single argument, followed by the script path and the
//! script's own arguments. So for
//!
//! ```text
//! #!/usr/bin/seabang --debug -lncurses
//! ```
//!
//! running `./game.cpp easy` yields argv
//! `["/usr/bin/seabang", "--debug -lncurses", "./game.cpp", "easy"]`,
//! while a bare `#!/usr/bin/seabang` line yields
//! `["/usr/bin/seabang", "./game.cpp", "easy"]`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::Parser;

/// Launcher options recognized on the `#!` line.
#[derive(Parser, Debug, Default, PartialEq, Eq)]
#[command(
    name = "seabang",
    version,
    about = "Run C and C++ source files as scripts",
    long_about = "Run C and C++ source files as scripts.\n\n\
        Not meant to be run directly: put it on the first line of a source file,\n\
        for example `#!/usr/bin/seabang --debug -lncurses`, make the file\n\
        executable and run it. The file is compiled on first use and whenever it\n\
        or a header it includes changes; otherwise the cached binary runs directly.",
    after_long_help = "Single-dash options such as -lncurses or -DNAME=1 are passed to the compiler.\n\n\
        Environment:\n  \
        SEABANG_CXX_COMPILER  compiler to use when --seabang-compiler is not given\n  \
        SEABANG_TEMP_FOLDER   temp folder when --seabang-temp is not given\n  \
        SEABANG_CONFIG        path of the seabang.toml config file\n  \
        SEABANG_LOG           log filter, e.g. `debug`"
)]
pub struct LauncherArgs {
    /// Log build decisions and show compiler output.
    #[arg(long)]
    pub verbose: bool,

    /// Rebuild even if the binary is up to date.
    #[arg(long)]
    pub rebuild: bool,

    /// Build with debug info and without optimization.
    #[arg(long)]
    pub debug: bool,

    /// Store artifacts by file name only instead of mirroring the source path.
    ///
    /// Scripts with the same file name then share one binary, so switching
    /// between them rebuilds each time.
    #[arg(long)]
    pub compact: bool,

    /// C++ compiler to use.
    #[arg(long = "seabang-compiler", value_name = "PATH")]
    pub compiler: Option<PathBuf>,

    /// Folder under which the `seabang/` artifact tree is kept.
    #[arg(long = "seabang-temp", value_name = "PATH")]
    pub temp_folder: Option<PathBuf>,
}

/// A fully partitioned invocation.
#[derive(Debug)]
pub struct Invocation {
    /// Parsed launcher options.
    pub launcher: LauncherArgs,
    /// Single-dash flags for the compiler, in order.
    pub compiler_flags: Vec<String>,
    /// The script to build and run.
    pub source: PathBuf,
    /// Arguments for the compiled program.
    pub program_args: Vec<OsString>,
}

/// What the command line asks for.
#[derive(Debug)]
pub enum Parsed {
    /// Build and run a script.
    Run(Invocation),
    /// No arguments at all: print help and fail.
    NoArguments,
}

/// Reasons the command line cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    /// clap rejected the long options, or asked for help or version output.
    #[error(transparent)]
    Clap(#[from] clap::Error),

    /// A token is neither a long option nor a compiler flag.
    #[error("unrecognized launcher option '{0}'")]
    UnknownOption(String),

    /// Options were given but no source file followed them.
    #[error("no source file given after launcher options")]
    MissingSource,

    /// The launcher option string is not valid UTF-8.
    #[error("launcher options are not valid UTF-8")]
    NotUnicode,
}

/// Partitions `argv` (including the program name) into an [`Invocation`].
///
/// The first argument is the source when it names an existing file under
/// `cwd`, or when it is the only argument and not a long option.
pub fn parse(argv: &[OsString], cwd: &Path) -> Result<Parsed, ArgsError> {
    let Some(first) = argv.get(1) else {
        return Ok(Parsed::NoArguments);
    };

    let lone_source = argv.len() == 2 && !first.to_string_lossy().starts_with("--");
    if lone_source || cwd.join(first).is_file() {
        return Ok(Parsed::Run(Invocation {
            launcher: LauncherArgs::default(),
            compiler_flags: Vec::new(),
            source: PathBuf::from(first),
            program_args: argv[2..].to_vec(),
        }));
    }

    let options = first.to_str().ok_or(ArgsError::NotUnicode)?;
    let (launcher, compiler_flags) = parse_launcher_options(options)?;
    let source = argv.get(2).ok_or(ArgsError::MissingSource)?;
    Ok(Parsed::Run(Invocation {
        launcher,
        compiler_flags,
        source: PathBuf::from(source),
        program_args: argv.get(3..).unwrap_or_default().to_vec(),
    }))
}

/// Splits a launcher option string on whitespace into long options (parsed
/// by clap) and compiler pass-through flags.
pub fn parse_launcher_options(options: &str) -> Result<(LauncherArgs, Vec<String>), ArgsError> {
    let mut long = vec!["seabang".to_string()];
    let mut compiler_flags = Vec::new();
    for token in options.split_whitespace() {
        if token.starts_with("--") {
            long.push(token.to_string());
        } else if is_compiler_flag(token) {
            compiler_flags.push(token.to_string());
        } else {
            return Err(ArgsError::UnknownOption(token.to_string()));
        }
    }
    let launcher = LauncherArgs::try_parse_from(long)?;
    Ok((launcher, compiler_flags))
}

/// `-X…` where `X` is a letter or digit.
fn is_compiler_flag(token: &str) -> bool {
    token
        .strip_prefix('-')
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_alphanumeric())
}
