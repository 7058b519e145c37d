//! Configuration file watcher for hot reload of the backend pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::load_config;
use crate::load_balancer::StaticBackends;

/// Watches the config file and swaps new backend lists into `backends`.
pub struct ConfigWatcher {
    path: PathBuf,
    backends: Arc<StaticBackends>,
}

impl ConfigWatcher {
    pub fn new(path: &Path, backends: Arc<StaticBackends>) -> Self {
        Self {
            path: path.to_path_buf(),
            backends,
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for reloads to keep happening.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let backends = self.backends;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        reload(&path, &backends);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Reload `path` and apply its backend list. Invalid files change nothing.
pub fn reload(path: &Path, backends: &StaticBackends) -> bool {
    tracing::info!(path = ?path, "Config file change detected, reloading");
    match load_config(path) {
        Ok(config) => {
            backends.replace(config.backends.addresses);
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to reload config, keeping current backends");
            false
        }
    }
}
