//! Versioned configuration store
//!
//! A [`ConfigStore`] owns the current configuration of one scope. On
//! [`initialize`](ConfigStore::initialize) it either synthesizes a default
//! file for a fresh install or loads the existing file and walks it forward
//! through the scope's migration chain, persisting once at the end.
//!
//! Readers go through an `ArcSwap`, so they never see a half-built
//! configuration. Writers (initialize, migrate, save, watcher reloads) are
//! serialized by a per-scope mutex.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use parsek_utils::{validate_plugin_id, HostPaths, ParsekError, Result};

use crate::backend::TomlBackend;
use crate::migration::{AppliedStep, MigrationChain, MigrationReport, MigrationStep};
use crate::schema::{to_tree, ConfigSchema, Configuration};
use crate::scope::Scope;
use crate::tree::{self, Tree};
use crate::watcher::ConfigWatcher;

/// Shared, lock-free handle to a scope's current configuration
pub type ConfigHandle<T> = Arc<ArcSwap<Configuration<T>>>;

/// How [`ConfigStore::initialize`] obtained the current configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No file existed; defaults were written at the latest version
    Created,
    /// The file was loaded and brought up to date
    Loaded(MigrationReport),
    /// Loading failed; in-memory defaults are in use and nothing was written
    Fallback { reason: String },
}

/// Everything the write paths (including the watcher task) need
struct Shared<T> {
    scope: Scope,
    backend: TomlBackend,
    current: ConfigHandle<T>,
    write_lock: Mutex<()>,
    latest_version: u32,
}

impl<T: ConfigSchema> Shared<T> {
    /// Reparse the file and adopt it as-is. No migration runs here.
    fn reload(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        let tree = self.backend.load()?;
        let configuration = Configuration::bind(tree, self.scope.version_key())?;

        if configuration.version() < self.latest_version {
            warn!(
                scope = %self.scope,
                version = configuration.version(),
                latest = self.latest_version,
                "Reloaded config is out of date; it will be migrated on next start"
            );
        }

        self.current.store(Arc::new(configuration));
        info!(scope = %self.scope, "Configuration reloaded successfully");
        Ok(())
    }
}

/// Configuration store for one scope
pub struct ConfigStore<T: ConfigSchema> {
    shared: Arc<Shared<T>>,
    chain: MigrationChain,
    initialized: AtomicBool,
    watcher: Mutex<Option<ConfigWatcher>>,
}

impl<T: ConfigSchema> ConfigStore<T> {
    /// Create a store for `scope` backed by the file at `path`.
    ///
    /// Fails if the migration set is invalid (duplicate source versions or
    /// steps that do not advance) or if the schema's defaults do not bind.
    /// Until [`initialize`](Self::initialize) runs, readers see defaults.
    pub fn new(
        scope: Scope,
        path: impl Into<PathBuf>,
        steps: impl IntoIterator<Item = MigrationStep>,
    ) -> Result<Self> {
        let chain = MigrationChain::new(&scope, steps)?;
        let latest_version = chain.latest_version();
        debug!(
            scope = %scope,
            migrations = chain.len(),
            latest = latest_version,
            "Registered config migrations"
        );
        for step in chain.steps() {
            debug!(
                scope = %scope,
                from = step.from_version(),
                to = step.to_version(),
                "Registered migration: {}",
                step.description()
            );
        }
        let defaults = Configuration::<T>::defaults(scope.version_key(), latest_version)?;

        Ok(Self {
            shared: Arc::new(Shared {
                scope,
                backend: TomlBackend::new(path),
                current: Arc::new(ArcSwap::from_pointee(defaults)),
                write_lock: Mutex::new(()),
                latest_version,
            }),
            chain,
            initialized: AtomicBool::new(false),
            watcher: Mutex::new(None),
        })
    }

    /// Store for a plugin scope, located under the host's plugin data dir.
    ///
    /// Fails with a config error if `plugin_id` does not name a single
    /// folder.
    pub fn for_plugin(
        paths: &HostPaths,
        plugin_id: &str,
        steps: impl IntoIterator<Item = MigrationStep>,
    ) -> Result<Self> {
        validate_plugin_id(plugin_id)?;
        let scope = Scope::plugin(plugin_id);
        let path = scope.config_file(paths);
        Self::new(scope, path, steps)
    }

    /// Load the configuration, creating or migrating the file as needed.
    ///
    /// Never fails: read, parse or migration errors are logged and the
    /// store falls back to in-memory defaults.
    pub fn initialize(&self) -> LoadOutcome {
        let shared = &self.shared;
        info!(scope = %shared.scope, path = %self.path().display(), "Initializing config");

        let _guard = shared.write_lock.lock();
        let outcome = if shared.backend.exists() {
            match shared.backend.load().and_then(|tree| self.migrate_tree(tree)) {
                Ok(report) => LoadOutcome::Loaded(report),
                Err(e) => self.fall_back(e),
            }
        } else {
            self.create_default()
        };

        self.initialized.store(true, Ordering::Release);
        outcome
    }

    /// Re-run the migration pass on the current configuration.
    ///
    /// Once the configuration is current this is a no-op that writes nothing.
    pub fn migrate(&self) -> Result<MigrationReport> {
        let _guard = self.shared.write_lock.lock();
        let tree = self.shared.current.load().tree().clone();
        self.migrate_tree(tree)
    }

    /// Write `tree` to the scope's file and adopt it as current.
    ///
    /// The tree must bind to the schema; nothing is written otherwise.
    /// Errors are returned as-is, without retry.
    pub fn save(&self, tree: Tree) -> Result<()> {
        let shared = &self.shared;
        let _guard = shared.write_lock.lock();

        let configuration = Configuration::<T>::bind(tree, shared.scope.version_key())?;
        shared.backend.write(configuration.tree())?;
        shared.current.store(Arc::new(configuration));

        debug!(scope = %shared.scope, "Config saved");
        Ok(())
    }

    /// Save a typed configuration, keeping the current version when the
    /// schema does not carry one
    pub fn save_config(&self, config: &T) -> Result<()> {
        let mut tree = to_tree(config)?;
        let key = self.shared.scope.version_key();
        if !tree.contains_key(key) {
            tree::stamp_version(&mut tree, key, self.version());
        }
        self.save(tree)
    }

    /// Write the current configuration back to disk
    pub fn save_current(&self) -> Result<()> {
        self.save(self.tree())
    }

    /// Reparse the file and adopt it without migrating.
    ///
    /// This is what the watcher does on every external edit.
    pub fn reload(&self) -> Result<()> {
        self.shared.reload()
    }

    /// Start hot-reloading external edits of the scope's file.
    ///
    /// Must be called after [`initialize`](Self::initialize), from within a
    /// tokio runtime. Calling it again while armed does nothing.
    pub fn listen(&self) -> Result<()> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(ParsekError::config(format!(
                "listen() called before initialize() for scope {}",
                self.shared.scope
            )));
        }

        let mut slot = self.watcher.lock();
        if slot.is_some() {
            debug!(scope = %self.shared.scope, "Config watcher already running");
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let watcher = ConfigWatcher::spawn(self.path(), move || {
            if let Err(e) = shared.reload() {
                error!(scope = %shared.scope, "Config reload failed (keeping previous): {}", e);
            }
        })?;

        *slot = Some(watcher);
        Ok(())
    }

    /// Stop hot-reloading. Safe to call any number of times.
    pub fn close(&self) {
        if let Some(mut watcher) = self.watcher.lock().take() {
            watcher.close();
            info!(scope = %self.shared.scope, "Config watcher closed");
        }
    }

    pub fn is_listening(&self) -> bool {
        self.watcher.lock().is_some()
    }

    /// Snapshot of the current configuration
    pub fn current(&self) -> Arc<Configuration<T>> {
        self.shared.current.load_full()
    }

    /// Copy of the current typed configuration
    pub fn config(&self) -> T {
        self.shared.current.load().config().clone()
    }

    /// Copy of the current tree
    pub fn tree(&self) -> Tree {
        self.shared.current.load().tree().clone()
    }

    pub fn version(&self) -> u32 {
        self.shared.current.load().version()
    }

    pub fn latest_version(&self) -> u32 {
        self.shared.latest_version
    }

    /// Handle that keeps observing swaps after being cloned out
    pub fn handle(&self) -> ConfigHandle<T> {
        Arc::clone(&self.shared.current)
    }

    pub fn scope(&self) -> &Scope {
        &self.shared.scope
    }

    pub fn path(&self) -> &Path {
        self.shared.backend.path()
    }

    /// Walk `tree` forward to the end of the chain, persist if any step
    /// fired, and adopt the result. Caller holds the write lock.
    fn migrate_tree(&self, mut tree: Tree) -> Result<MigrationReport> {
        let shared = &self.shared;
        let key = shared.scope.version_key();

        info!(scope = %shared.scope, "Checking available config migrations");

        let start = tree::read_version(&tree, key)?;
        let mut version = start;
        let mut applied = Vec::new();

        while let Some(step) = self.chain.resolve(version) {
            info!(
                scope = %shared.scope,
                from = step.from_version(),
                to = step.to_version(),
                "Migration found! Migrating config from version {} to {}: {}",
                step.from_version(),
                step.to_version(),
                step.description()
            );

            tree = step.apply(tree)?;
            tree::stamp_version(&mut tree, key, step.to_version());
            version = step.to_version();
            applied.push(AppliedStep::from(step));
        }

        let configuration = Configuration::<T>::bind(tree, key)?;

        let mut persisted = false;
        if !applied.is_empty() {
            match shared.backend.write(configuration.tree()) {
                Ok(()) => persisted = true,
                Err(e) => error!(
                    scope = %shared.scope,
                    "Failed to save migrated config, keeping it in memory only: {}", e
                ),
            }
        }

        shared.current.store(Arc::new(configuration));

        Ok(MigrationReport {
            from: start,
            to: version,
            applied,
            persisted,
        })
    }

    fn create_default(&self) -> LoadOutcome {
        let shared = &self.shared;
        warn!(scope = %shared.scope, "Couldn't find config. Saving default config");

        let configuration =
            match Configuration::<T>::defaults(shared.scope.version_key(), shared.latest_version) {
                Ok(configuration) => configuration,
                Err(e) => return self.fall_back(e),
            };

        if let Some(template) = T::template() {
            if let Err(e) = shared.backend.seed(template) {
                warn!(scope = %shared.scope, "Ignoring invalid config template: {}", e);
            }
        }

        if let Err(e) = shared.backend.write(configuration.tree()) {
            error!(scope = %shared.scope, "Failed to save default config: {}", e);
        }

        shared.current.store(Arc::new(configuration));
        LoadOutcome::Created
    }

    fn fall_back(&self, e: ParsekError) -> LoadOutcome {
        let shared = &self.shared;
        error!(scope = %shared.scope, "Error occurred while loading config file! Error: {}", e);
        info!(scope = %shared.scope, "Using default config!");

        // Defaults bound successfully in new(), so this only repeats that work.
        if let Ok(defaults) =
            Configuration::<T>::defaults(shared.scope.version_key(), shared.latest_version)
        {
            shared.current.store(Arc::new(defaults));
        }

        LoadOutcome::Fallback {
            reason: e.to_string(),
        }
    }
}

impl<T: ConfigSchema> Drop for ConfigStore<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: ConfigSchema> std::fmt::Debug for ConfigStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("scope", &self.shared.scope)
            .field("path", &self.path())
            .field("version", &self.version())
            .field("latest_version", &self.shared.latest_version)
            .finish()
    }
}
