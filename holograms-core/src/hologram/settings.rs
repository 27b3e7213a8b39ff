use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HologramSettings {
    pub enabled: bool,
    /// Saved to the store.
    pub persistent: bool,
    /// Clicks on the hologram run click actions.
    pub interactive: bool,
    pub rotate_heads: bool,
    pub rotate_vertical: bool,
    pub rotate_horizontal: bool,
    /// The position is the bottom of the page rather than the top.
    pub down_origin: bool,
    pub view_distance: f64,
    pub update_distance: f64,
    /// Content refresh cadence, in ticks.
    pub update_interval: u32,
    /// Content passes run at all.
    pub updating: bool,
}

impl Default for HologramSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            persistent: true,
            interactive: false,
            rotate_heads: true,
            rotate_vertical: true,
            rotate_horizontal: true,
            down_origin: false,
            view_distance: 48.0,
            update_distance: 48.0,
            update_interval: 20,
            updating: true,
        }
    }
}

impl HologramSettings {
    pub fn rotates(&self) -> bool {
        self.rotate_heads || self.rotate_vertical || self.rotate_horizontal
    }
}
