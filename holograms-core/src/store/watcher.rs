use super::JsonFileStore;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// A definition was written; reload it.
    Changed(String),
    /// A definition was deleted; unregister it.
    Removed(String),
}

/// Watches a [`JsonFileStore`] directory. Dropping it stops the watch.
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
}

impl StoreWatcher {
    pub fn new(dir: &Path, tx: mpsc::Sender<StoreChange>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let (sync_tx, sync_rx) = std::sync::mpsc::channel();

        let mut watcher = RecommendedWatcher::new(sync_tx, Config::default())?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        // Bridge the blocking notify channel into tokio.
        tokio::task::spawn_blocking(move || {
            for res in sync_rx {
                match res {
                    Ok(event) => {
                        for change in classify(event) {
                            if tx.blocking_send(change).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => tracing::error!("Watch error: {:?}", e),
                }
            }
        });

        tracing::info!(dir = %dir.display(), "watching hologram storage");
        Ok(Self { _watcher: watcher })
    }
}

impl std::fmt::Debug for StoreWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreWatcher").finish_non_exhaustive()
    }
}

fn classify(event: Event) -> Vec<StoreChange> {
    let removed = match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => false,
        EventKind::Remove(_) => true,
        _ => return Vec::new(),
    };
    event
        .paths
        .iter()
        .filter_map(|p| JsonFileStore::name_of(p))
        .map(|name| {
            if removed {
                StoreChange::Removed(name)
            } else {
                StoreChange::Changed(name)
            }
        })
        .collect()
}
