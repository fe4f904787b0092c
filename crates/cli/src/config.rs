use std::path::{Path, PathBuf};

use anyhow::{Context as AnyhowContext, Result};
use context_session::CONTEXT_TREE_DIR;
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Settings read from `config.toml`; every field may be overridden by a flag
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub workspace_name: Option<String>,
    pub workspace_root: Option<PathBuf>,
    pub session_file: Option<PathBuf>,
}

impl Config {
    /// Load an explicit config file, or `~/.context-tree/config.toml` when it
    /// exists. A missing default file is not an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match default_config_file() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Flag values win over file values
    pub fn overlay(mut self, overrides: Config) -> Self {
        if overrides.workspace_name.is_some() {
            self.workspace_name = overrides.workspace_name;
        }
        if overrides.workspace_root.is_some() {
            self.workspace_root = overrides.workspace_root;
        }
        if overrides.session_file.is_some() {
            self.session_file = overrides.session_file;
        }
        self
    }
}

pub fn default_config_file() -> Option<PathBuf> {
    Some(dirs::home_dir()?.join(CONTEXT_TREE_DIR).join(CONFIG_FILE_NAME))
}
