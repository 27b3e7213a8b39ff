//! Persistence of hologram definitions.
//!
//! The engine only ever loads and saves whole [`HologramDefinition`]s through a
//! [`HologramStore`]; where and how they are kept is up to the store.

mod definition;
mod json;
mod watcher;

pub use definition::{HologramDefinition, LineDefinition, PageDefinition};
pub use json::JsonFileStore;
pub use watcher::{StoreChange, StoreWatcher};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no stored hologram named '{0}'")]
    NotFound(String),

    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed hologram definition: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait HologramStore: Send + Sync {
    async fn load(&self, name: &str) -> Result<HologramDefinition, StoreError>;

    async fn save(&self, definition: &HologramDefinition) -> Result<(), StoreError>;

    /// Names of every stored hologram.
    async fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Deleting a missing hologram is not an error.
    async fn delete(&self, name: &str) -> Result<(), StoreError>;
}

/// Keeps definitions in memory. For tests and hosts without storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    definitions: DashMap<String, HologramDefinition>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, definition: HologramDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[async_trait]
impl HologramStore for MemoryStore {
    async fn load(&self, name: &str) -> Result<HologramDefinition, StoreError> {
        self.definitions
            .get(name)
            .map(|d| d.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn save(&self, definition: &HologramDefinition) -> Result<(), StoreError> {
        let mut stored = definition.clone();
        stored.saved_at = Some(chrono::Utc::now());
        self.definitions.insert(stored.name.clone(), stored);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.definitions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.definitions.remove(name);
        Ok(())
    }
}
