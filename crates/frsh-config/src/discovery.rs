//! Locating config files and folding them into one [`FrshConfig`].
//!
//! Two layers are searched, lowest precedence first: the user file
//! (`$FRSH_CONFIG_DIR/config.toml`, else `<platform config dir>/frsh/config.toml`)
//! and the project file `frsh.toml`. A layer that exists but cannot be read
//! or parsed is skipped with a warning instead of failing the load.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{ConfigError, FrshConfig, Result};

const PROJECT_CONFIG_FILE: &str = "frsh.toml";
const USER_CONFIG_FILE: &str = "config.toml";
const APP_NAME: &str = "frsh";

/// Overrides the user config directory when set and non-empty.
const CONFIG_DIR_ENV: &str = "FRSH_CONFIG_DIR";

/// The role a config file plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    User,
    Project,
    /// A single file named by the caller, bypassing the search.
    Explicit,
}

impl Layer {
    pub fn label(self) -> &'static str {
        match self {
            Layer::User => "user",
            Layer::Project => "project",
            Layer::Explicit => "explicit",
        }
    }
}

/// One searched location.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub layer: Layer,
    pub path: PathBuf,
    /// False when the file is absent or was rejected.
    pub loaded: bool,
}

/// The merged configuration plus an account of how it was assembled.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: FrshConfig,
    /// Every searched location, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of the files that contributed to `config`.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }

    fn absorb(mut self, layer: Layer, path: PathBuf) -> Self {
        let loaded = match read_optional(&path) {
            Ok(Some(found)) => {
                self.config.merge(found);
                true
            }
            Ok(None) => false,
            Err(e) => {
                self.warnings
                    .push(format!("Skipped {} config {}: {}", layer.label(), path.display(), e));
                false
            }
        };
        self.sources.push(ConfigSource {
            layer,
            path,
            loaded,
        });
        self
    }
}

/// Discover and merge config layers, looking for `frsh.toml` in
/// `project_dir` (the working directory when `None`).
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Like [`load_config`], with `config_dir` taking the place of the user
/// config directory.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let loaded = search_path(project_dir, config_dir)
        .into_iter()
        .fold(LoadedConfig::default(), |acc, (layer, path)| {
            acc.absorb(layer, path)
        });
    Ok(loaded)
}

/// Read one file. Unlike discovery, a missing file is an error.
pub fn load_config_file(path: &Path) -> Result<FrshConfig> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    FrshConfig::from_toml(&contents)
}

/// Write `config` as TOML, creating missing parent directories.
pub fn save_config(config: &FrshConfig, path: &Path) -> Result<()> {
    let write_failed = |at: &Path| {
        let at = at.display().to_string();
        move |source| ConfigError::WriteFile { path: at, source }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_failed(parent))?;
    }
    std::fs::write(path, config.to_toml()?).map_err(write_failed(path))
}

pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

pub fn user_config_dir() -> Option<PathBuf> {
    std::env::var_os(CONFIG_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::config_dir().map(|d| d.join(APP_NAME)))
}

fn search_path(project_dir: Option<&Path>, config_dir: Option<&Path>) -> Vec<(Layer, PathBuf)> {
    let user = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    let project = project_dir.map_or_else(
        || PathBuf::from(PROJECT_CONFIG_FILE),
        |dir| dir.join(PROJECT_CONFIG_FILE),
    );

    user.map(|path| (Layer::User, path))
        .into_iter()
        .chain([(Layer::Project, project)])
        .collect()
}

/// `Ok(None)` when nothing exists at `path`.
fn read_optional(path: &Path) -> Result<Option<FrshConfig>> {
    match load_config_file(path) {
        Ok(config) => Ok(Some(config)),
        Err(ConfigError::ReadFile { source, .. }) if source.kind() == ErrorKind::NotFound => {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
