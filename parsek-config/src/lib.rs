//! Versioned configuration store for parsek
//!
//! Persists human-editable configuration, synthesizes defaults for new
//! installations, migrates old files forward through an explicit chain of
//! steps and hot-reloads external edits. The same machinery serves the
//! process-wide configuration and every plugin's configuration.

mod backend;
mod global;
mod migration;
mod plugin;
mod schema;
mod scope;
mod store;
pub mod tree;
mod watcher;

pub use backend::{parse_tree, render_tree, TomlBackend};
pub use global::{
    add_server_config, global_migrations, global_store, split_plugins, GlobalConfig,
    RouterConfig, ServerConfig, DEFAULT_CONFIG_TOML,
};
pub use migration::{AppliedStep, MigrationChain, MigrationReport, MigrationStep};
pub use plugin::PluginConfig;
pub use schema::{default_tree, from_tree, to_tree, ConfigSchema, Configuration};
pub use scope::Scope;
pub use store::{ConfigHandle, ConfigStore, LoadOutcome};
pub use tree::Tree;
pub use watcher::ConfigWatcher;
