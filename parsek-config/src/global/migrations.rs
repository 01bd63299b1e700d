//! Built-in migrations of the global configuration

use toml::Value;
use tracing::{info, warn};

use parsek_utils::{validate_plugin_id, HostPaths};

use crate::backend::TomlBackend;
use crate::migration::MigrationStep;
use crate::scope::Scope;
use crate::tree::{self, Tree};

/// All global migrations, in no particular order
pub fn global_migrations(paths: &HostPaths) -> Vec<MigrationStep> {
    vec![add_server_config(), split_plugins(paths.clone())]
}

pub(super) fn default_server() -> Tree {
    let mut server = Tree::new();
    server.insert("host".into(), Value::String("0.0.0.0".into()));
    server.insert("port".into(), Value::Integer(8088));
    server
}

/// 1 -> 2: introduce the `server` section
pub fn add_server_config() -> MigrationStep {
    MigrationStep::new(1, 2, "Add server config", |mut tree: Tree| {
        tree.insert("server".into(), Value::Table(default_server()));
        Ok(tree)
    })
}

/// 2 -> 3: move each entry of the top-level `plugins` table into that
/// plugin's own config file, then drop the section.
///
/// Plugin files that already exist are left untouched.
pub fn split_plugins(paths: HostPaths) -> MigrationStep {
    MigrationStep::new(
        2,
        3,
        "Split plugins section into specific folders",
        move |mut tree: Tree| {
            let plugins = match tree.remove("plugins") {
                Some(Value::Table(plugins)) => plugins,
                Some(other) => {
                    warn!("Dropping plugins section of unexpected type {}", other.type_str());
                    return Ok(tree);
                }
                None => return Ok(tree),
            };

            for (plugin_id, plugin_config) in plugins {
                let Value::Table(mut plugin_tree) = plugin_config else {
                    warn!(plugin = %plugin_id, "Skipping non-table plugin config");
                    continue;
                };

                if let Err(e) = validate_plugin_id(&plugin_id) {
                    warn!("Skipping plugin config: {}", e);
                    continue;
                }

                let path = paths.plugin_config_file(&plugin_id);
                if path.exists() {
                    warn!(
                        plugin = %plugin_id,
                        "Plugin already has a config file at {}, leaving it untouched",
                        path.display()
                    );
                    continue;
                }

                if !plugin_tree.contains_key(Scope::PLUGIN_VERSION_KEY) {
                    tree::stamp_version(&mut plugin_tree, Scope::PLUGIN_VERSION_KEY, 1);
                }

                TomlBackend::new(&path).write(&plugin_tree)?;
                info!(plugin = %plugin_id, "Migrated \"{}\" plugin config to specific folder.", plugin_id);
            }

            Ok(tree)
        },
    )
}
