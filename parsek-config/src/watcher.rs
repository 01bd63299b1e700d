//! File watcher for configuration hot-reload

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use parsek_utils::{ParsekError, Result};

/// Watches one configuration file and invokes a callback when it changes
pub struct ConfigWatcher {
    /// Directory being watched
    dir: PathBuf,
    /// Task draining debounced events
    task: Option<JoinHandle<()>>,
    /// Debouncer handle (kept alive while armed)
    debouncer: Option<Debouncer<RecommendedWatcher, FileIdMap>>,
}

impl ConfigWatcher {
    /// Watch `path` and call `on_change` after each create/modify of it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(path: &Path, on_change: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| ParsekError::watch("config watcher requires a tokio runtime"))?;

        let file_name = path
            .file_name()
            .ok_or_else(|| ParsekError::watch(format!("Not a file path: {}", path.display())))?
            .to_os_string();

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        // Ensure directory exists
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| ParsekError::FileWrite {
                path: dir.clone(),
                source: e,
            })?;
        }

        let (tx, rx) = mpsc::unbounded_channel();

        // Create debounced watcher
        let mut debouncer = new_debouncer(
            Duration::from_millis(100),
            None,
            move |result: DebounceEventResult| {
                let events = result
                    .map(|events| events.into_iter().map(|e| e.event).collect())
                    .map_err(|errs| ParsekError::watch(format!("{:?}", errs)));
                let _ = tx.send(events);
            },
        )
        .map_err(|e| ParsekError::watch(format!("Failed to create watcher: {}", e)))?;

        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| ParsekError::watch(format!("Failed to watch {}: {}", dir.display(), e)))?;

        tracing::info!("Config watcher started for {:?}", path);
        let task = runtime.spawn(Self::run(rx, file_name, on_change));

        Ok(Self {
            dir,
            task: Some(task),
            debouncer: Some(debouncer),
        })
    }

    /// Drain events, firing the callback once per batch that touches the file
    async fn run<F>(
        mut rx: mpsc::UnboundedReceiver<Result<Vec<Event>>>,
        file_name: OsString,
        on_change: F,
    ) where
        F: Fn(),
    {
        while let Some(result) = rx.recv().await {
            match result {
                Ok(events) => {
                    if events.iter().any(|e| Self::is_config_change(e, &file_name)) {
                        tracing::info!("Config file changed, reloading...");
                        on_change();
                    }
                }
                Err(e) => {
                    tracing::error!("Config watch error: {}", e);
                }
            }
        }
    }

    /// Check if an event is a change to the watched file
    fn is_config_change(event: &Event, file_name: &OsStr) -> bool {
        matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
            && event
                .paths
                .iter()
                .any(|p| p.file_name().map(|n| n == file_name).unwrap_or(false))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Unsubscribe. Idempotent.
    pub fn close(&mut self) {
        // Dropping the debouncer stops notifications and closes the channel
        self.debouncer.take();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.debouncer.is_none()
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn modify_event(path: &str) -> Event {
        Event {
            kind: EventKind::Modify(notify::event::ModifyKind::Data(
                notify::event::DataChange::Content,
            )),
            paths: vec![PathBuf::from(path)],
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_is_config_change() {
        let event = modify_event("/srv/parsek/config.conf");
        assert!(ConfigWatcher::is_config_change(&event, OsStr::new("config.conf")));
    }

    #[test]
    fn test_is_not_config_change() {
        let event = modify_event("/srv/parsek/other.conf");
        assert!(!ConfigWatcher::is_config_change(&event, OsStr::new("config.conf")));
    }

    #[test]
    fn test_remove_is_not_config_change() {
        let event = Event {
            kind: EventKind::Remove(notify::event::RemoveKind::File),
            paths: vec![PathBuf::from("/srv/parsek/config.conf")],
            attrs: Default::default(),
        };
        assert!(!ConfigWatcher::is_config_change(&event, OsStr::new("config.conf")));
    }

    #[test]
    fn test_spawn_requires_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigWatcher::spawn(&dir.path().join("config.conf"), || {});
        assert!(matches!(result, Err(ParsekError::Watch(_))));
    }

    #[tokio::test]
    async fn test_callback_fires_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.conf");
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let mut watcher = ConfigWatcher::spawn(&path, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert_eq!(watcher.dir(), dir.path());

        std::fs::write(&path, "version = 1\n").unwrap();

        for _ in 0..50 {
            if hits.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(hits.load(Ordering::SeqCst) > 0);

        watcher.close();
        watcher.close();
        assert!(watcher.is_closed());
    }
}
