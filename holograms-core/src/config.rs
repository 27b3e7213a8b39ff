use crate::hologram::HologramSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine-wide knobs. Every field has a default, so a partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Period of the scheduler pulse.
    pub tick_period_ms: u64,
    /// Minimum gap between two visibility passes of one hologram.
    pub visibility_interval_ms: u64,
    /// Length of one "update interval" tick for content passes.
    pub content_tick_ms: u64,
    pub storage_dir: PathBuf,
    /// Reload a hologram when its stored definition changes on disk.
    pub watch_storage: bool,
    /// Settings given to holograms created without explicit ones.
    pub defaults: HologramSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 50,
            visibility_interval_ms: 500,
            content_tick_ms: 50,
            storage_dir: default_storage_dir(),
            watch_storage: false,
            defaults: HologramSettings::default(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "DrTomLLC", "Holograms")
        .map(|dirs| dirs.data_dir().join("holograms"))
        .unwrap_or_else(|| PathBuf::from("holograms"))
}

impl EngineConfig {
    /// Reads a JSON config. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;

        tracing::info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms.max(1))
    }

    pub fn visibility_interval(&self) -> Duration {
        Duration::from_millis(self.visibility_interval_ms)
    }

    /// Gap between content passes for a hologram updating every `ticks` ticks.
    pub fn content_interval(&self, ticks: u32) -> Duration {
        Duration::from_millis(self.content_tick_ms.saturating_mul(u64::from(ticks)))
    }
}
