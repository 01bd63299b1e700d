//! Schema-less plugin configuration

use serde::{Deserialize, Serialize};
use toml::Value;

use crate::schema::ConfigSchema;
use crate::tree::{self, Tree};

/// Configuration of a plugin that does not declare a typed schema.
///
/// Keeps the mandatory version plus every other key verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub version: u32,
    #[serde(flatten)]
    pub values: Tree,
}

impl PluginConfig {
    /// Look up a value by dotted path
    pub fn get(&self, path: &str) -> Option<&Value> {
        tree::get_path(&self.values, path)
    }
}

impl ConfigSchema for PluginConfig {}
