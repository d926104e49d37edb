//! Configuration file watcher for hot reload.
//!
//! Only `retries` and `timeouts.request_ms` take effect without a restart
//! (see `HttpExecutor::reload`). A revision is published when one of those
//! changed; edits that only touch other settings are logged and skipped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ClientConfig;

/// Quiet period after a file event before the file is read.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Publishes validated, hot-reloadable revisions of a config file.
pub struct ConfigWatcher {
    path: PathBuf,
    current: ClientConfig,
    debounce: Duration,
    update_tx: mpsc::UnboundedSender<ClientConfig>,
}

impl ConfigWatcher {
    /// `current` is the configuration already in use; revisions are compared
    /// against it.
    pub fn new(path: &Path, current: ClientConfig) -> (Self, mpsc::UnboundedReceiver<ClientConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                current,
                debounce: DEFAULT_DEBOUNCE,
                update_tx,
            },
            update_rx,
        )
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching. Must be called from within a Tokio runtime.
    ///
    /// Dropping the returned watcher stops the watch and ends the reload task.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, debounce_ms = self.debounce.as_millis() as u64, "Config watcher started");
        tokio::spawn(self.reload_loop(event_rx));
        Ok(watcher)
    }

    async fn reload_loop(mut self, mut events: mpsc::UnboundedReceiver<()>) {
        while events.recv().await.is_some() {
            // One save can emit several events; read once they settle.
            tokio::time::sleep(self.debounce).await;
            while events.try_recv().is_ok() {}

            if let Some(revision) = self.next_revision() {
                if self.update_tx.send(revision).is_err() {
                    tracing::debug!("Config receiver dropped, stopping watcher");
                    return;
                }
            }
        }
    }

    fn next_revision(&mut self) -> Option<ClientConfig> {
        let next = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(
                    path = ?self.path,
                    error = %e,
                    "Failed to reload config, keeping current configuration"
                );
                return None;
            }
        };

        let restart_only = restart_only_changes(&self.current, &next);
        if !restart_only.is_empty() {
            tracing::warn!(
                sections = ?restart_only,
                "Config changes need a restart to take effect"
            );
        }

        let publish = reloadable_changed(&self.current, &next);
        self.current = next;
        if publish {
            tracing::info!(path = ?self.path, "Config reloaded");
            Some(self.current.clone())
        } else {
            tracing::debug!(path = ?self.path, "No hot-reloadable change, skipping");
            None
        }
    }
}

/// True when a setting the executor can swap at runtime differs.
fn reloadable_changed(current: &ClientConfig, next: &ClientConfig) -> bool {
    current.retries != next.retries || current.timeouts.request_ms != next.timeouts.request_ms
}

/// Settings that differ but are fixed at startup.
fn restart_only_changes(current: &ClientConfig, next: &ClientConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if current.timeouts.connect_ms != next.timeouts.connect_ms {
        changed.push("timeouts.connect_ms");
    }
    if current.circuit_breaker != next.circuit_breaker {
        changed.push("circuit_breaker");
    }
    if current.observability != next.observability {
        changed.push("observability");
    }
    if current.assistant != next.assistant {
        changed.push("assistant");
    }
    changed
}
