use crate::action::ActionExecutor;
use crate::config::EngineConfig;
use crate::registry::HologramRegistry;
use crate::services::Services;
use crate::store::{HologramStore, StoreWatcher};
use anyhow::{Context, Result};
use holograms_io::{Transport, ViewerDirectory, ViewerEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// The main entry point for the hologram engine.
/// The host holds one instance of this.
#[derive(Debug)]
pub struct HologramEngine {
    pub services: Arc<Services>,
    pub registry: Arc<HologramRegistry>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    watcher: Mutex<Option<StoreWatcher>>,
}

impl HologramEngine {
    /// Starts the engine: wires the services, starts ticking, loads stored holograms.
    pub async fn start(
        config: EngineConfig,
        transport: Arc<dyn Transport>,
        directory: Arc<dyn ViewerDirectory>,
        actions: Arc<dyn ActionExecutor>,
        store: Arc<dyn HologramStore>,
        events: broadcast::Receiver<ViewerEvent>,
    ) -> Result<Self> {
        let services = Arc::new(Services::new(config, transport, directory, actions));
        Self::start_with(services, store, events).await
    }

    /// Starts the engine around services the host has already customised.
    pub async fn start_with(
        services: Arc<Services>,
        store: Arc<dyn HologramStore>,
        mut events: broadcast::Receiver<ViewerEvent>,
    ) -> Result<Self> {
        // 1. Registry
        let registry = Arc::new(HologramRegistry::new(services.clone(), store));
        let mut tasks = Vec::new();

        // 2. Ticker loop
        tasks.push(services.ticker.spawn());

        // 3. Viewer event listener
        let registry_for_events = registry.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ViewerEvent::Disconnected(viewer)) => {
                        registry_for_events.on_viewer_disconnect(viewer);
                    }
                    // Connections are picked up by the next visibility pass.
                    Ok(ViewerEvent::Connected(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "viewer events lagged; visibility passes will catch up");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));

        // 4. Stored holograms
        registry
            .load_all()
            .await
            .context("loading stored holograms")?;

        let engine = Self {
            services: services.clone(),
            registry: registry.clone(),
            tasks: Mutex::new(tasks),
            watcher: Mutex::new(None),
        };

        // 5. Storage watcher
        if services.config.watch_storage {
            let (tx, mut rx) = mpsc::channel(32);
            let watcher = StoreWatcher::new(&services.config.storage_dir, tx)
                .context("watching hologram storage")?;
            *engine.watcher.lock() = Some(watcher);

            let registry_for_store = registry.clone();
            engine.tasks.lock().push(tokio::spawn(async move {
                while let Some(change) = rx.recv().await {
                    registry_for_store.apply_change(change);
                }
            }));
        }

        tracing::info!(
            holograms = registry.len(),
            tick_ms = services.config.tick_period_ms,
            "hologram engine started"
        );
        Ok(engine)
    }

    /// Stops ticking first, then destroys every hologram.
    pub fn shutdown(&self) {
        self.services.ticker.shutdown();
        self.watcher.lock().take();
        self.registry.shutdown();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        tracing::info!("hologram engine stopped");
    }
}
