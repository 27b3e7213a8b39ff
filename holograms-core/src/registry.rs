use crate::error::HologramError;
use crate::hologram::Hologram;
use crate::services::Services;
use crate::store::{HologramStore, StoreChange, StoreError};
use dashmap::DashMap;
use holograms_io::{Location, ViewerId};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Change events for a file this registry just wrote are ignored for this long.
const OWN_WRITE_GRACE: Duration = Duration::from_secs(2);

/// Every live hologram, by name.
pub struct HologramRegistry {
    services: Arc<Services>,
    store: Arc<dyn HologramStore>,
    holograms: Arc<DashMap<String, Arc<Hologram>>>,
    recent_saves: DashMap<String, Instant>,
}

impl fmt::Debug for HologramRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HologramRegistry")
            .field("holograms", &self.names())
            .finish_non_exhaustive()
    }
}

impl HologramRegistry {
    pub fn new(services: Arc<Services>, store: Arc<dyn HologramStore>) -> Self {
        Self {
            services,
            store,
            holograms: Arc::new(DashMap::new()),
            recent_saves: DashMap::new(),
        }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn get(&self, name: &str) -> Option<Arc<Hologram>> {
        self.holograms.get(name).map(|h| h.clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.holograms.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn all(&self) -> Vec<Arc<Hologram>> {
        self.holograms.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.holograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holograms.is_empty()
    }

    // ───────────────────────────────────────────────────────────────
    // Registration
    // ───────────────────────────────────────────────────────────────

    /// Creates a hologram with the configured default settings and starts ticking it.
    pub fn create(&self, name: &str, location: Location) -> Result<Arc<Hologram>, HologramError> {
        let hologram = Hologram::new(
            name,
            self.services.clone(),
            location,
            self.services.config.defaults.clone(),
        );
        self.register(hologram.clone())?;
        Ok(hologram)
    }

    pub fn register(&self, hologram: Arc<Hologram>) -> Result<(), HologramError> {
        use dashmap::mapref::entry::Entry;

        match self.holograms.entry(hologram.name().to_string()) {
            Entry::Occupied(_) => Err(HologramError::DuplicateName(hologram.name().to_string())),
            Entry::Vacant(slot) => {
                hologram.start_ticking();
                slot.insert(hologram.clone());
                tracing::info!(hologram = %hologram.name(), "hologram registered");
                Ok(())
            }
        }
    }

    /// Removes and destroys a hologram.
    pub fn unregister(&self, name: &str) -> Option<Arc<Hologram>> {
        let (_, hologram) = self.holograms.remove(name)?;
        hologram.destroy();
        Some(hologram)
    }

    // ───────────────────────────────────────────────────────────────
    // Persistence
    // ───────────────────────────────────────────────────────────────

    /// Registers a pending hologram right away and fills it from the store in
    /// the background. Await [`Hologram::wait_ready`] for the outcome; a failed
    /// load destroys and unregisters it. Needs a tokio runtime.
    pub fn load(&self, name: &str) -> Result<Arc<Hologram>, HologramError> {
        let hologram = Hologram::pending(
            name,
            self.services.clone(),
            Location::default(),
            self.services.config.defaults.clone(),
        );
        self.register(hologram.clone())?;

        let store = self.store.clone();
        let holograms = self.holograms.clone();
        let pending = hologram.clone();
        tokio::spawn(async move {
            let name = pending.name().to_string();
            let result = match store.load(&name).await {
                Ok(definition) => pending.apply_definition(&definition),
                Err(e) => Err(e.into()),
            };

            match result {
                Ok(()) => {
                    pending.mark_ready();
                    tracing::info!(hologram = %name, pages = pending.page_count(), "hologram loaded");
                }
                Err(e) => {
                    tracing::warn!(hologram = %name, error = %e, "hologram failed to load");
                    holograms.remove_if(&name, |_, h| Arc::ptr_eq(h, &pending));
                    pending.destroy();
                }
            }
        });

        Ok(hologram)
    }

    /// Starts loading every stored hologram that is not registered yet.
    pub async fn load_all(&self) -> Result<Vec<Arc<Hologram>>, HologramError> {
        let mut loaded = Vec::new();
        for name in self.store.list().await? {
            if self.holograms.contains_key(&name) {
                continue;
            }
            loaded.push(self.load(&name)?);
        }
        tracing::info!(count = loaded.len(), "loading stored holograms");
        Ok(loaded)
    }

    /// Destroys the live hologram and loads it again from the store.
    pub fn reload(&self, name: &str) -> Result<Arc<Hologram>, HologramError> {
        self.unregister(name);
        self.load(name)
    }

    /// Saves a hologram. Non-persistent holograms are skipped.
    pub async fn save(&self, name: &str) -> Result<(), HologramError> {
        let hologram = self
            .get(name)
            .ok_or_else(|| HologramError::UnknownHologram(name.to_string()))?;
        if !hologram.settings().persistent {
            tracing::debug!(hologram = %name, "not persistent, skipping save");
            return Ok(());
        }
        self.recent_saves.insert(name.to_string(), Instant::now());
        self.store.save(&hologram.to_definition()).await?;
        Ok(())
    }

    pub async fn save_all(&self) -> Result<(), HologramError> {
        for name in self.names() {
            self.save(&name).await?;
        }
        Ok(())
    }

    /// Unregisters a hologram and removes it from the store.
    pub async fn delete(&self, name: &str) -> Result<(), HologramError> {
        let existed = self.unregister(name).is_some();
        match self.store.delete(name).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) if existed => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Applies a change seen in storage. Echoes of this registry's own saves are ignored.
    pub fn apply_change(&self, change: StoreChange) {
        match change {
            StoreChange::Changed(name) => {
                let own_write = self
                    .recent_saves
                    .get(&name)
                    .is_some_and(|at| at.elapsed() < OWN_WRITE_GRACE);
                if own_write {
                    return;
                }
                tracing::info!(hologram = %name, "stored definition changed, reloading");
                if let Err(e) = self.reload(&name) {
                    tracing::warn!(hologram = %name, error = %e, "reload failed");
                }
            }
            StoreChange::Removed(name) => {
                if self.unregister(&name).is_some() {
                    tracing::info!(hologram = %name, "stored definition removed, unregistered");
                }
            }
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Viewers & teardown
    // ───────────────────────────────────────────────────────────────

    pub fn on_viewer_disconnect(&self, viewer: ViewerId) {
        for hologram in self.all() {
            hologram.forget_viewer(viewer);
        }
    }

    /// Destroys every hologram.
    pub fn shutdown(&self) {
        let names = self.names();
        for name in &names {
            self.unregister(name);
        }
        tracing::info!(count = names.len(), "registry shut down");
    }
}
