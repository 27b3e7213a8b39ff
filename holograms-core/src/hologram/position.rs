use holograms_io::{Location, ViewerDirectory, ViewerId};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// What a binder can look at when asked where the hologram is.
pub struct BindContext<'a> {
    pub directory: &'a dyn ViewerDirectory,
    pub down_origin: bool,
    /// Height of the page the given viewer is looking at.
    pub page_height: &'a dyn Fn(ViewerId) -> f64,
}

/// A moving position. `None` keeps the last known location.
pub trait LocationBinder: Send + Sync + fmt::Debug {
    fn bind(&self, ctx: &BindContext<'_>) -> Option<Location>;
}

#[derive(Debug, Clone)]
pub enum Position {
    Fixed(Location),
    Bound(Arc<dyn LocationBinder>),
}

impl Position {
    pub fn is_bound(&self) -> bool {
        matches!(self, Position::Bound(_))
    }
}

/// Holds the hologram in front of a viewer's eyes, centred on its page.
/// Snaps to the block centre while the viewer sneaks.
#[derive(Debug)]
pub struct ViewerAnchor {
    viewer: ViewerId,
    distance: AtomicU32,
}

impl ViewerAnchor {
    pub const MIN_DISTANCE: u32 = 3;
    pub const MAX_DISTANCE: u32 = 13;
    pub const DEFAULT_DISTANCE: u32 = 5;
    const EYE_HEIGHT: f64 = 1.62;

    pub fn new(viewer: ViewerId) -> Self {
        Self::with_distance(viewer, Self::DEFAULT_DISTANCE)
    }

    pub fn with_distance(viewer: ViewerId, distance: u32) -> Self {
        Self {
            viewer,
            distance: AtomicU32::new(distance),
        }
    }

    pub fn viewer(&self) -> ViewerId {
        self.viewer
    }

    pub fn distance(&self) -> u32 {
        self.distance.load(Ordering::Relaxed)
    }

    pub fn increase_distance(&self) {
        let _ = self
            .distance
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                (d < Self::MAX_DISTANCE).then_some(d + 1)
            });
    }

    pub fn decrease_distance(&self) {
        let _ = self
            .distance
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                (d > Self::MIN_DISTANCE).then_some(d - 1)
            });
    }
}

impl LocationBinder for ViewerAnchor {
    fn bind(&self, ctx: &BindContext<'_>) -> Option<Location> {
        let feet = ctx.directory.location(self.viewer)?;
        let eye = feet.offset(0.0, Self::EYE_HEIGHT, 0.0);
        let (dx, dy, dz) = eye.direction();
        let reach = f64::from(self.distance());

        let height = (ctx.page_height)(self.viewer);
        let mut lift = height / 2.0;
        if ctx.down_origin {
            lift -= height;
        }

        let location = eye.offset(dx * reach, dy * reach + lift, dz * reach);
        if ctx.directory.is_sneaking(self.viewer) {
            Some(location.block_centre())
        } else {
            Some(location)
        }
    }
}
