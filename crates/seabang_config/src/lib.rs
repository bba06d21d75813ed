//! Settings resolution for the seabang launcher.
//!
//! Each overridable setting is taken from the first of: an explicit flag on
//! the invocation, an environment variable, the optional `seabang.toml`
//! config file, or a build-time default. The resolved [`Settings`] remember
//! which of these supplied every value.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{config_file_path, load_config, load_config_from_str};
pub use resolve::{
    resolve_settings, resolve_settings_with, Environment, MapEnv, Overrides, ProcessEnv, Setting,
    SettingSource, Settings,
};
pub use types::FileConfig;
