//! Locating, reading and validating the config file.

use crate::error::ConfigError;
use crate::resolve::Environment;
use crate::types::FileConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SEABANG_CONFIG";

/// Returns where the config file is expected to live.
///
/// `$SEABANG_CONFIG` wins outright; otherwise the XDG location is used,
/// falling back to `$HOME/.config`. Returns `None` when none of these
/// variables is set.
pub fn config_file_path(env: &dyn Environment) -> Option<PathBuf> {
    if let Some(explicit) = env.var(CONFIG_ENV) {
        return Some(PathBuf::from(explicit));
    }
    let base = env
        .var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env.var("HOME").map(|home| Path::new(&home).join(".config")))?;
    Some(base.join("seabang").join("seabang.toml"))
}

/// Loads the config file at `path`.
///
/// A file that does not exist yields an empty configuration; one that exists
/// but cannot be read or parsed is an error.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file");
            return Ok(FileConfig::default());
        }
        Err(e) => return Err(ConfigError::IoError(e)),
    };
    debug!(path = %path.display(), "loading config file");
    load_config_from_str(&content).map_err(|e| match e {
        ConfigError::ParseError(msg) => {
            ConfigError::ParseError(format!("{}: {msg}", path.display()))
        }
        other => other,
    })
}

/// Parses and validates a config file from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<FileConfig, ConfigError> {
    let config: FileConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Rejects values that would produce an unusable compiler invocation.
fn validate_config(config: &FileConfig) -> Result<(), ConfigError> {
    if config.compiler.as_ref().is_some_and(|c| c.as_os_str().is_empty()) {
        return Err(ConfigError::ValidationError(
            "`compiler` must not be empty".to_string(),
        ));
    }
    if config.temp_folder.as_ref().is_some_and(|t| t.as_os_str().is_empty()) {
        return Err(ConfigError::ValidationError(
            "`temp_folder` must not be empty".to_string(),
        ));
    }
    if let Some(std) = &config.std {
        if std.is_empty() || std.contains(char::is_whitespace) {
            return Err(ConfigError::ValidationError(format!(
                "`std` must be a single word, got {std:?}"
            )));
        }
    }
    if let Some(paths) = &config.include_paths {
        if paths.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(ConfigError::ValidationError(
                "`include_paths` entries must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}
