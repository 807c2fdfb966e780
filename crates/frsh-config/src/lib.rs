//! Configuration system for frsh.
//!
//! Provides TOML-based configuration with:
//! - `[session]` root path and session lifetime
//! - `[sweep]` worker concurrency and primary-record rechecks
//! - `[logging]` file log directory and console filter
//! - Config file layering (user config dir + project-local `frsh.toml`)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, Layer, LoadedConfig, load_config, load_config_file, load_config_with_options,
    save_config, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
