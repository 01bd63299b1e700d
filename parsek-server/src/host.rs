//! Owns every configuration store of a running host

use std::collections::BTreeMap;
use std::fmt;
use std::fs;

use tracing::{debug, info, warn};

use parsek_config::{global_store, ConfigStore, GlobalConfig, LoadOutcome, PluginConfig, Scope};
use parsek_utils::{HostPaths, ParsekError, Result, CONFIG_FILE_NAME};

/// Result of initializing one scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeOutcome {
    pub scope: Scope,
    pub outcome: LoadOutcome,
}

impl ScopeOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self.outcome, LoadOutcome::Fallback { .. })
    }
}

impl fmt::Display for ScopeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            LoadOutcome::Created => write!(f, "{}: created default configuration", self.scope),
            LoadOutcome::Loaded(report) if report.is_noop() => {
                write!(f, "{}: up to date at version {}", self.scope, report.to)
            }
            LoadOutcome::Loaded(report) => {
                write!(
                    f,
                    "{}: migrated from version {} to {} ({} step(s))",
                    self.scope,
                    report.from,
                    report.to,
                    report.applied.len()
                )?;
                if !report.persisted {
                    write!(f, ", not saved")?;
                }
                Ok(())
            }
            LoadOutcome::Fallback { reason } => {
                write!(f, "{}: using defaults ({})", self.scope, reason)
            }
        }
    }
}

/// Global store plus one store per plugin scope
pub struct Host {
    paths: HostPaths,
    requested: Vec<String>,
    global: ConfigStore<GlobalConfig>,
    plugins: BTreeMap<String, ConfigStore<PluginConfig>>,
}

impl Host {
    /// Build the global store. Plugin stores are created by
    /// [`initialize`](Self::initialize).
    pub fn new(paths: HostPaths, requested: Vec<String>) -> Result<Self> {
        let global = global_store(&paths)?;
        Ok(Self {
            paths,
            requested,
            global,
            plugins: BTreeMap::new(),
        })
    }

    /// Initialize the global scope, then every plugin scope.
    ///
    /// The global scope goes first because its migrations may hand
    /// sections over to plugin files.
    pub fn initialize(&mut self) -> Result<Vec<ScopeOutcome>> {
        let mut outcomes = vec![ScopeOutcome {
            scope: Scope::Global,
            outcome: self.global.initialize(),
        }];

        for plugin_id in self.plugin_ids() {
            if self.plugins.contains_key(&plugin_id) {
                continue;
            }
            let store: ConfigStore<PluginConfig> =
                ConfigStore::for_plugin(&self.paths, &plugin_id, Vec::new())?;
            outcomes.push(ScopeOutcome {
                scope: store.scope().clone(),
                outcome: store.initialize(),
            });
            self.plugins.insert(plugin_id, store);
        }

        info!(plugins = self.plugins.len(), "Host configuration loaded");
        Ok(outcomes)
    }

    /// Arm hot-reload on every scope
    pub fn listen(&self) -> Result<()> {
        self.global.listen()?;
        for store in self.plugins.values() {
            store.listen()?;
        }
        Ok(())
    }

    /// Stop every watcher
    pub fn shutdown(&self) {
        self.global.close();
        for store in self.plugins.values() {
            store.close();
        }
        info!("Host shut down");
    }

    pub fn paths(&self) -> &HostPaths {
        &self.paths
    }

    pub fn global(&self) -> &ConfigStore<GlobalConfig> {
        &self.global
    }

    pub fn plugin(&self, plugin_id: &str) -> Option<&ConfigStore<PluginConfig>> {
        self.plugins.get(plugin_id)
    }

    /// Like [`plugin`](Self::plugin), failing for unknown ids
    pub fn require_plugin(&self, plugin_id: &str) -> Result<&ConfigStore<PluginConfig>> {
        self.plugin(plugin_id)
            .ok_or_else(|| ParsekError::config(format!("Unknown plugin: {}", plugin_id)))
    }

    pub fn plugin_ids_loaded(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// Requested plugins plus every folder under the plugin data directory
    /// that already holds a config file, sorted and deduplicated
    fn plugin_ids(&self) -> Vec<String> {
        let mut ids = self.requested.clone();
        ids.extend(discover_plugins(&self.paths));
        ids.sort();
        ids.dedup();
        ids
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("paths", &self.paths)
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Plugin ids that have a config folder in the plugin data directory
pub fn discover_plugins(paths: &HostPaths) -> Vec<String> {
    let entries = match fs::read_dir(&paths.plugin_data_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(
                "No plugin data directory at {}: {}",
                paths.plugin_data_dir.display(),
                e
            );
            return Vec::new();
        }
    };

    let mut ids = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable plugin data entry: {}", e);
                continue;
            }
        };
        if !entry.path().join(CONFIG_FILE_NAME).is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(id) => ids.push(id),
            Err(name) => warn!("Skipping plugin folder with non UTF-8 name {:?}", name),
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn paths(root: &Path) -> HostPaths {
        HostPaths::new(root.join("plugins")).with_config_file(root.join("config.conf"))
    }

    #[test]
    fn test_fresh_host() {
        let dir = tempdir().unwrap();
        let mut host = Host::new(paths(dir.path()), vec!["auth".into()]).unwrap();

        let outcomes = host.initialize().unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].scope, Scope::Global);
        assert_eq!(outcomes[0].outcome, LoadOutcome::Created);
        assert_eq!(outcomes[1].scope, Scope::plugin("auth"));
        assert_eq!(outcomes[1].outcome, LoadOutcome::Created);
        assert_eq!(outcomes[0].to_string(), "global: created default configuration");

        assert!(host.paths().plugin_config_file("auth").exists());
        assert_eq!(host.plugin("auth").unwrap().version(), 1);
        assert!(host.require_plugin("missing").is_err());
    }

    #[test]
    fn test_migrated_plugins_are_discovered() {
        let dir = tempdir().unwrap();
        let paths = paths(dir.path());
        fs::write(
            &paths.config_file,
            "config-version = 2\n\n[server]\nhost = \"0.0.0.0\"\nport = 8088\n\n[plugins.search]\nindex = \"main\"\n",
        )
        .unwrap();

        let mut host = Host::new(paths, Vec::new()).unwrap();
        let outcomes = host.initialize().unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            outcomes[0].to_string(),
            "global: migrated from version 2 to 3 (1 step(s))"
        );
        assert!(!outcomes.iter().any(ScopeOutcome::is_fallback));
        assert_eq!(host.plugin_ids_loaded().collect::<Vec<_>>(), vec!["search"]);
        let search = host.plugin("search").unwrap().config();
        assert_eq!(
            search.get("index").and_then(toml::Value::as_str),
            Some("main")
        );
    }

    #[test]
    fn test_requested_plugin_outside_data_dir_is_refused() {
        let dir = tempdir().unwrap();
        let mut host = Host::new(paths(dir.path()), vec!["../outside".into()]).unwrap();

        let err = host.initialize().unwrap_err();
        assert!(matches!(err, ParsekError::Config(_)));
        assert!(!dir.path().join("outside").exists());
    }

    #[test]
    fn test_discover_ignores_folders_without_config() {
        let dir = tempdir().unwrap();
        let paths = paths(dir.path());
        fs::create_dir_all(paths.plugin_data_dir.join("empty")).unwrap();
        fs::create_dir_all(paths.plugin_data_dir.join("auth")).unwrap();
        fs::write(paths.plugin_config_file("auth"), "version = 1\n").unwrap();

        assert_eq!(discover_plugins(&paths), vec!["auth".to_string()]);
    }

    #[test]
    fn test_discover_without_data_dir() {
        let dir = tempdir().unwrap();
        assert!(discover_plugins(&paths(dir.path())).is_empty());
    }

    #[tokio::test]
    async fn test_listen_and_shutdown() {
        let dir = tempdir().unwrap();
        let mut host = Host::new(paths(dir.path()), vec!["auth".into()]).unwrap();
        host.initialize().unwrap();

        host.listen().unwrap();
        assert!(host.global().is_listening());
        assert!(host.plugin("auth").unwrap().is_listening());

        host.shutdown();
        assert!(!host.global().is_listening());
        assert!(!host.plugin("auth").unwrap().is_listening());
    }
}
