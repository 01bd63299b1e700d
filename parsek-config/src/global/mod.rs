//! Global (process-wide) configuration scope

mod defaults;
mod migrations;

pub use defaults::DEFAULT_CONFIG_TOML;
pub use migrations::{add_server_config, global_migrations, split_plugins};

use serde::{Deserialize, Serialize};
use toml::Value;

use parsek_utils::{HostPaths, Result};

use crate::schema::ConfigSchema;
use crate::scope::Scope;
use crate::store::ConfigStore;
use crate::tree::Tree;

/// Root configuration of the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(rename = "config-version")]
    pub config_version: u32,
    /// Absent in files written before the router section existed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router: Option<RouterConfig>,
    pub server: ServerConfig,
}

/// REST routing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RouterConfig {
    pub api_prefix: String,
}

/// HTTP listener settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` form for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ConfigSchema for GlobalConfig {
    fn scope_defaults() -> Tree {
        let mut router = Tree::new();
        router.insert("api-prefix".into(), Value::String("/api".into()));

        let mut defaults = Tree::new();
        defaults.insert("router".into(), Value::Table(router));
        defaults.insert("server".into(), Value::Table(migrations::default_server()));
        defaults
    }

    fn template() -> Option<&'static str> {
        Some(DEFAULT_CONFIG_TOML)
    }
}

/// Store for the global scope with the built-in migrations
pub fn global_store(paths: &HostPaths) -> Result<ConfigStore<GlobalConfig>> {
    let scope = Scope::Global;
    let path = scope.config_file(paths);
    ConfigStore::new(scope, path, global_migrations(paths))
}
