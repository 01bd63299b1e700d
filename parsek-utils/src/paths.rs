//! Path utilities for parsek
//!
//! Resolves where configuration files live for the global scope and for
//! each plugin scope, and where the host keeps its own state (logs).

use directories::ProjectDirs;
use std::path::{Component, Path, PathBuf};

use crate::{ParsekError, Result};

/// Application identifier for XDG directories
const APP_NAME: &str = "parsek";

/// File name used by every configuration scope
pub const CONFIG_FILE_NAME: &str = "config.conf";

/// Default plugins root, relative to the working directory
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// Environment variable overriding the global config file path
pub const CONFIG_FILE_ENV: &str = "PARSEK_CONFIG_FILE";

/// Environment variable overriding the plugin data directory
pub const PLUGIN_DATA_DIR_ENV: &str = "PARSEK_PLUGIN_DATA_DIR";

/// Filesystem layout of a running host.
///
/// Built once at startup and handed to every store by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    /// Global configuration file
    pub config_file: PathBuf,
    /// Directory plugins are loaded from
    pub plugins_root: PathBuf,
    /// Directory holding per-plugin configuration folders
    pub plugin_data_dir: PathBuf,
}

impl HostPaths {
    /// Layout with no overrides: `config.conf` in the working directory and
    /// plugin data stored next to the plugins themselves.
    pub fn new(plugins_root: impl Into<PathBuf>) -> Self {
        let plugins_root = plugins_root.into();
        Self {
            config_file: PathBuf::from(CONFIG_FILE_NAME),
            plugin_data_dir: plugins_root.clone(),
            plugins_root,
        }
    }

    /// Layout honoring `PARSEK_CONFIG_FILE` and `PARSEK_PLUGIN_DATA_DIR`
    pub fn from_env(plugins_root: impl Into<PathBuf>) -> Self {
        let mut paths = Self::new(plugins_root);
        if let Some(file) = env_path(CONFIG_FILE_ENV) {
            paths.config_file = file;
        }
        if let Some(dir) = env_path(PLUGIN_DATA_DIR_ENV) {
            paths.plugin_data_dir = dir;
        }
        paths
    }

    /// Override the global config file path
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = path.into();
        self
    }

    /// Override the plugin data directory
    pub fn with_plugin_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_data_dir = dir.into();
        self
    }

    /// Config file for a plugin scope
    ///
    /// Location: `<plugin_data_dir>/<plugin_id>/config.conf`. Callers
    /// handling untrusted ids check them with [`validate_plugin_id`] first.
    pub fn plugin_config_file(&self, plugin_id: &str) -> PathBuf {
        self.plugin_data_dir.join(plugin_id).join(CONFIG_FILE_NAME)
    }
}

impl Default for HostPaths {
    fn default() -> Self {
        Self::new(DEFAULT_PLUGINS_DIR)
    }
}

/// Check that `plugin_id` names exactly one folder under the plugin data
/// directory: not empty, no separators, not `.` or `..`
pub fn validate_plugin_id(plugin_id: &str) -> Result<()> {
    let mut components = Path::new(plugin_id).components();
    let single_folder = match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => name == plugin_id,
        _ => false,
    };

    if single_folder && !plugin_id.contains(['/', '\\']) {
        Ok(())
    } else {
        Err(ParsekError::config(format!("Invalid plugin id '{}'", plugin_id)))
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Get project directories
fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Get the state directory
///
/// Location: `$XDG_STATE_HOME/parsek` or `~/.local/state/parsek`
pub fn state_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(fallback_state_dir)
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/parsek/log`
pub fn log_dir() -> PathBuf {
    state_dir().join("log")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn fallback_state_dir() -> PathBuf {
    home_dir().join(".local").join("state").join(APP_NAME)
}
