use serde::{Deserialize, Serialize};

/// A point in a named world, with an optional facing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
}

impl Location {
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    pub fn with_rotation(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }

    /// Returns a copy moved by the given deltas. Facing is kept.
    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            world: self.world.clone(),
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
            yaw: self.yaw,
            pitch: self.pitch,
        }
    }

    pub fn same_world(&self, other: &Location) -> bool {
        self.world == other.world
    }

    /// Squared distance, or `None` when the two points are in different worlds.
    pub fn distance_squared(&self, other: &Location) -> Option<f64> {
        if !self.same_world(other) {
            return None;
        }
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        Some(dx * dx + dy * dy + dz * dz)
    }

    /// True when `other` is in this world and strictly closer than `radius`.
    pub fn within(&self, other: &Location, radius: f64) -> bool {
        self.distance_squared(other)
            .is_some_and(|d2| d2 < radius * radius)
    }

    /// Unit vector of the facing, using the world engine's yaw/pitch convention
    /// (yaw 0 looks towards +Z, pitch 90 looks straight down).
    pub fn direction(&self) -> (f64, f64, f64) {
        let yaw = (self.yaw as f64).to_radians();
        let pitch = (self.pitch as f64).to_radians();
        let xz = pitch.cos();
        (-xz * yaw.sin(), -pitch.sin(), xz * yaw.cos())
    }

    /// Snaps the position to the centre of the block it is in.
    pub fn block_centre(&self) -> Self {
        Self {
            world: self.world.clone(),
            x: self.x.floor() + 0.5,
            y: self.y.floor() + 0.5,
            z: self.z.floor() + 0.5,
            yaw: self.yaw,
            pitch: self.pitch,
        }
    }

    /// Position-only comparison with a small tolerance, used to skip redundant teleports.
    pub fn approx_eq(&self, other: &Location) -> bool {
        const EPSILON: f64 = 1e-6;
        self.same_world(other)
            && (self.x - other.x).abs() < EPSILON
            && (self.y - other.y).abs() < EPSILON
            && (self.z - other.z).abs() < EPSILON
    }
}
