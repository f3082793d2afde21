//! Hot-reload support for script modules
//!
//! Watches the active module file and reports when it has changed and the
//! changes have settled. The reload itself is performed by
//! [`ScriptBridge::reload_script_module`](crate::bridge::ScriptBridge::reload_script_module).

use crate::config::HotReloadConfig;
use crate::error::{BridgeError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::{Duration, Instant};

/// A module file being watched
#[derive(Debug)]
struct WatchedModule {
    path: PathBuf,
    dir: PathBuf,
    file_name: OsString,
}

/// Watches the active script module for rebuilds
pub struct ModuleWatcher {
    debounce: Duration,
    /// The file watcher
    watcher: Option<RecommendedWatcher>,
    /// Receiver for file events
    event_receiver: Option<Receiver<notify::Result<Event>>>,
    watched: Option<WatchedModule>,
    /// Time the last change was seen
    pending_since: Option<Instant>,
}

impl ModuleWatcher {
    /// Create a new watcher
    pub fn new(config: &HotReloadConfig) -> Result<Self> {
        let (tx, rx) = channel();

        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(|e| BridgeError::HotReloadFailed(e.to_string()))?;

        Ok(Self {
            debounce: config.debounce(),
            watcher: Some(watcher),
            event_receiver: Some(rx),
            watched: None,
            pending_since: None,
        })
    }

    /// A watcher that never reports changes
    pub fn disabled() -> Self {
        Self {
            debounce: Duration::ZERO,
            watcher: None,
            event_receiver: None,
            watched: None,
            pending_since: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.watcher.is_some()
    }

    /// Start watching `path`, replacing any previously watched module
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        self.unwatch();

        let path = path.canonicalize()?;
        let (Some(dir), Some(file_name)) = (path.parent(), path.file_name()) else {
            return Err(BridgeError::HotReloadFailed(format!(
                "cannot watch '{}'",
                path.display()
            )));
        };
        let watched = WatchedModule {
            dir: dir.to_path_buf(),
            file_name: file_name.to_os_string(),
            path: path.clone(),
        };

        if let Some(watcher) = self.watcher.as_mut() {
            watcher
                .watch(&watched.dir, RecursiveMode::NonRecursive)
                .map_err(|e| BridgeError::HotReloadFailed(e.to_string()))?;
            log::debug!("Watching script module for hot-reload: {}", path.display());
        }

        self.watched = Some(watched);
        Ok(())
    }

    /// Stop watching the current module
    pub fn unwatch(&mut self) {
        if let Some(watched) = self.watched.take() {
            if let Some(watcher) = self.watcher.as_mut() {
                let _ = watcher.unwatch(&watched.dir);
            }
        }
        self.pending_since = None;
    }

    pub fn watched_path(&self) -> Option<&Path> {
        self.watched.as_ref().map(|w| w.path.as_path())
    }

    pub fn has_pending_change(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Drain file events; returns the module path once a change has
    /// settled for the debounce period.
    pub fn poll(&mut self) -> Option<PathBuf> {
        if let Some(rx) = &self.event_receiver {
            let events: Vec<Event> = rx.try_iter().filter_map(|res| res.ok()).collect();
            for event in &events {
                self.handle_event(event);
            }
        }

        let since = self.pending_since?;
        if since.elapsed() < self.debounce {
            return None;
        }

        self.pending_since = None;
        let path = self.watched.as_ref().map(|w| w.path.clone())?;
        log::info!("Script module changed: {}", path.display());
        Some(path)
    }

    /// Handle a file system event
    fn handle_event(&mut self, event: &Event) {
        let Some(watched) = &self.watched else {
            return;
        };

        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return;
        }

        let touches_module = event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(watched.file_name.as_os_str()));
        if touches_module {
            // Each new event restarts the debounce window
            self.pending_since = Some(Instant::now());
            log::debug!("Detected change in module: {}", watched.path.display());
        }
    }
}

impl Drop for ModuleWatcher {
    fn drop(&mut self) {
        log::debug!("Shutting down module watcher");
    }
}

impl std::fmt::Debug for ModuleWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleWatcher")
            .field("enabled", &self.is_enabled())
            .field("watched", &self.watched_path())
            .field("pending", &self.has_pending_change())
            .finish()
    }
}
