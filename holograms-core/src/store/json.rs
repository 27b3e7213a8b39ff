use super::{HologramDefinition, HologramStore, StoreError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One pretty-printed `<name>.json` per hologram.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// The hologram a file in the store directory belongs to.
    pub fn name_of(path: &Path) -> Option<String> {
        if path.extension()? != "json" {
            return None;
        }
        path.file_stem()?.to_str().map(str::to_string)
    }
}

#[async_trait]
impl HologramStore for JsonFileStore {
    async fn load(&self, name: &str) -> Result<HologramDefinition, StoreError> {
        let path = self.path_for(name);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let mut definition: HologramDefinition = serde_json::from_str(&text)?;
        // The file name wins over a stale name inside the file.
        definition.name = name.to_string();
        Ok(definition)
    }

    async fn save(&self, definition: &HologramDefinition) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut stored = definition.clone();
        stored.saved_at = Some(chrono::Utc::now());
        let json = serde_json::to_string_pretty(&stored)?;

        // Write-then-rename so a watcher never reads half a file.
        let path = self.path_for(&definition.name);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(hologram = %definition.name, path = %path.display(), "hologram saved");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = Self::name_of(&entry.path()) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
