//! Settings resolution: flag, then environment, then config file, then default.

use crate::error::ConfigError;
use crate::loader::{config_file_path, load_config};
use crate::types::FileConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable selecting the C++ compiler.
pub const COMPILER_ENV: &str = "SEABANG_CXX_COMPILER";

/// Environment variable selecting the temp folder.
pub const TEMP_FOLDER_ENV: &str = "SEABANG_TEMP_FOLDER";

/// Compiler used when nothing else names one. Packagers may bake in a
/// different default by setting `SEABANG_CXX_COMPILER` at build time.
pub const DEFAULT_COMPILER: &str = match option_env!("SEABANG_CXX_COMPILER") {
    Some(compiler) => compiler,
    None => "c++",
};

/// Language standard used when the config file does not set `std`.
pub const DEFAULT_STANDARD: &str = "c++17";

/// Include roots searched after the invocation directory by default.
pub const DEFAULT_INCLUDE_ROOTS: [&str; 2] = ["/usr/include", "/usr/local/include"];

/// Name of the directory created under the temp folder for artifacts.
pub const ARTIFACT_DIR: &str = "seabang";

/// Read access to environment variables.
///
/// Production code uses [`ProcessEnv`]; tests use [`MapEnv`] so they never
/// touch the real process environment.
pub trait Environment {
    /// Returns the value of `key`, or `None` if it is unset or empty.
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// An in-memory environment.
#[derive(Debug, Default, Clone)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    /// Creates an environment with no variables set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the environment with `key` set to `value`.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }
}

impl Environment for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

/// Values given explicitly on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// `--seabang-compiler=PATH`.
    pub compiler: Option<PathBuf>,
    /// `--seabang-temp=PATH`.
    pub temp_folder: Option<PathBuf>,
    /// `--compact`. Only a set flag counts as an override.
    pub compact: bool,
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingSource {
    /// An explicit command-line flag.
    Flag,
    /// An environment variable.
    Environment,
    /// The config file.
    ConfigFile,
    /// The built-in default.
    Default,
}

impl std::fmt::Display for SettingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SettingSource::Flag => "flag",
            SettingSource::Environment => "environment",
            SettingSource::ConfigFile => "config file",
            SettingSource::Default => "default",
        };
        f.write_str(name)
    }
}

/// A resolved value and its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting<T> {
    /// The value in effect.
    pub value: T,
    /// Which layer supplied it.
    pub source: SettingSource,
}

impl<T> Setting<T> {
    fn new(value: T, source: SettingSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved launcher settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// C++ compiler executable.
    pub compiler: Setting<PathBuf>,
    /// Directory holding the `seabang/` artifact tree.
    pub temp_folder: Setting<PathBuf>,
    /// Whether artifacts use the flattened layout.
    pub compact_layout: Setting<bool>,
    /// Include roots searched after the invocation directory.
    pub include_roots: Setting<Vec<PathBuf>>,
    /// Value of the `-std=` compiler flag.
    pub language_standard: Setting<String>,
    /// The config file that was consulted, if any location was known.
    pub config_file: Option<PathBuf>,
}

impl Settings {
    /// Root of the artifact tree: `<temp folder>/seabang`.
    pub fn artifact_root(&self) -> PathBuf {
        self.temp_folder.value.join(ARTIFACT_DIR)
    }
}

/// Resolves settings from flags, the process environment and the config file.
///
/// Fails only if the config file exists but is unreadable or malformed.
pub fn resolve_settings(
    overrides: &Overrides,
    env: &dyn Environment,
) -> Result<Settings, ConfigError> {
    let config_file = config_file_path(env);
    let file = match &config_file {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    let mut settings = resolve_settings_with(overrides, env, &file);
    settings.config_file = config_file;
    Ok(settings)
}

/// Resolves settings against an already loaded config file.
pub fn resolve_settings_with(
    overrides: &Overrides,
    env: &dyn Environment,
    file: &FileConfig,
) -> Settings {
    let compiler = layered(
        overrides.compiler.clone(),
        env.var(COMPILER_ENV).map(PathBuf::from),
        file.compiler.clone(),
        || PathBuf::from(DEFAULT_COMPILER),
    );
    let temp_folder = layered(
        overrides.temp_folder.clone(),
        env.var(TEMP_FOLDER_ENV).map(PathBuf::from),
        file.temp_folder.clone(),
        || default_temp_folder(env),
    );
    let compact_layout = layered(
        overrides.compact.then_some(true),
        None,
        file.compact,
        || false,
    );
    let include_roots = layered(None, None, file.include_paths.clone(), || {
        DEFAULT_INCLUDE_ROOTS.into_iter().map(PathBuf::from).collect()
    });
    let language_standard = layered(None, None, file.std.clone(), || {
        DEFAULT_STANDARD.to_string()
    });

    debug!(
        compiler = %compiler.value.display(),
        compiler_source = %compiler.source,
        temp_folder = %temp_folder.value.display(),
        temp_folder_source = %temp_folder.source,
        compact = compact_layout.value,
        "settings resolved"
    );

    Settings {
        compiler,
        temp_folder,
        compact_layout,
        include_roots,
        language_standard,
        config_file: None,
    }
}

/// `$HOME/tmp` when that directory exists, otherwise `/tmp`.
pub fn default_temp_folder(env: &dyn Environment) -> PathBuf {
    env.var("HOME")
        .map(|home| Path::new(&home).join("tmp"))
        .filter(|candidate| candidate.is_dir())
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

fn layered<T>(
    flag: Option<T>,
    env: Option<T>,
    file: Option<T>,
    default: impl FnOnce() -> T,
) -> Setting<T> {
    if let Some(v) = flag {
        return Setting::new(v, SettingSource::Flag);
    }
    if let Some(v) = env {
        return Setting::new(v, SettingSource::Environment);
    }
    if let Some(v) = file {
        return Setting::new(v, SettingSource::ConfigFile);
    }
    Setting::new(default(), SettingSource::Default)
}
