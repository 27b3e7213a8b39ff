//! Line renderers.
//!
//! A [`LineRenderer`] owns the virtual entities that draw one line and knows
//! which viewers currently have them spawned. A viewer is in that set if and
//! only if the last thing the renderer did for them was a successful `display`.
//!
//! Variants differ only in entity layout and geometry; those live behind
//! [`RenderVariant`], one file per variant.

mod entity;
mod head;
mod icon;
mod text;

pub use entity::EntityLine;
pub use head::HeadLine;
pub use icon::IconLine;
pub use text::TextLine;

use crate::services::Services;
use holograms_io::{
    EntityId, EntityMetadata, EntitySpawn, Location, TransportError, ViewerId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineType {
    Text,
    Icon,
    Head,
    SmallHead,
    Entity,
}

impl LineType {
    /// Space the line takes in the page layout.
    pub fn height(self) -> f64 {
        match self {
            LineType::Text => 0.3,
            LineType::Icon => 0.55,
            LineType::Head => 0.75,
            LineType::SmallHead => 0.6,
            LineType::Entity => 1.0,
        }
    }

    /// Vertical offset from the line's slot to where its entities spawn.
    pub fn offset_y(self) -> f64 {
        match self {
            LineType::Text => -0.5,
            LineType::Icon => -0.55,
            LineType::Head => -2.0,
            LineType::SmallHead => -1.1875,
            LineType::Entity => 0.0,
        }
    }
}

impl fmt::Display for LineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LineType::Text => "text",
            LineType::Icon => "icon",
            LineType::Head => "head",
            LineType::SmallHead => "small_head",
            LineType::Entity => "entity",
        };
        f.write_str(name)
    }
}

/// One viewer's view of one line at the moment of rendering.
pub struct RenderFrame<'a> {
    pub viewer: ViewerId,
    pub services: &'a Services,
    pub location: &'a Location,
}

/// Per-variant entity layout.
pub trait RenderVariant {
    fn line_type(&self) -> LineType;

    fn height(&self) -> f64 {
        self.line_type().height()
    }

    fn width(&self) -> f64 {
        0.0
    }

    /// Number of entities one copy of the line needs. Fixed for a variant.
    fn entity_count(&self) -> usize {
        1
    }

    fn spawns(&self, ids: &[EntityId], frame: &RenderFrame<'_>) -> Vec<EntitySpawn>;

    fn metadata(&self, ids: &[EntityId], frame: &RenderFrame<'_>) -> Vec<(EntityId, EntityMetadata)>;
}

/// What a renderer draws.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(TextLine),
    Icon(IconLine),
    Head(HeadLine),
    Entity(EntityLine),
}

impl Payload {
    fn variant(&self) -> &dyn RenderVariant {
        match self {
            Payload::Text(p) => p,
            Payload::Icon(p) => p,
            Payload::Head(p) => p,
            Payload::Entity(p) => p,
        }
    }

    pub fn line_type(&self) -> LineType {
        self.variant().line_type()
    }

    /// Whether `other` spawns the same entities, so a shown line can switch to
    /// it with metadata alone. Living entity lines fix their type at spawn.
    pub fn same_layout(&self, other: &Payload) -> bool {
        match (self, other) {
            (Payload::Entity(a), Payload::Entity(b)) => a.entity_type == b.entity_type,
            (a, b) => a.line_type() == b.line_type(),
        }
    }
}

/// What became of the sends to one viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The transport refused. A refused display leaves nothing spawned.
    Failed,
    /// The viewer is unreachable and has been dropped from the line.
    Gone,
}

pub struct LineRenderer {
    payload: Payload,
    entities: Vec<EntityId>,
    viewers: HashSet<ViewerId>,
}

impl fmt::Debug for LineRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineRenderer")
            .field("type", &self.line_type())
            .field("entities", &self.entities)
            .field("viewers", &self.viewers.len())
            .finish()
    }
}

impl LineRenderer {
    pub fn new(payload: Payload, services: &Services) -> Self {
        let entities = services.entity_ids.take(payload.variant().entity_count());
        Self {
            payload,
            entities,
            viewers: HashSet::new(),
        }
    }

    pub fn line_type(&self) -> LineType {
        self.payload.line_type()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Swaps the payload in place. Refused when the entity layout would change,
    /// since spawned entities cannot change under a viewer; the payload is
    /// handed back instead.
    pub fn set_payload(&mut self, payload: Payload) -> Result<(), Payload> {
        if !self.payload.same_layout(&payload) {
            return Err(payload);
        }
        self.payload = payload;
        Ok(())
    }

    pub fn height(&self) -> f64 {
        self.payload.variant().height()
    }

    pub fn width(&self) -> f64 {
        self.payload.variant().width()
    }

    pub fn offset_y(&self) -> f64 {
        self.line_type().offset_y()
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn owns(&self, entity: EntityId) -> bool {
        self.entities.contains(&entity)
    }

    pub fn is_shown_to(&self, viewer: ViewerId) -> bool {
        self.viewers.contains(&viewer)
    }

    pub fn viewers(&self) -> Vec<ViewerId> {
        self.viewers.iter().copied().collect()
    }

    // ───────────────────────────────────────────────────────────────
    // Per-viewer operations
    // ───────────────────────────────────────────────────────────────

    /// Spawns the line for a viewer. The viewer only counts as shown once every
    /// spawn went out; a refused spawn despawns what was already sent.
    pub fn display(&mut self, services: &Services, viewer: ViewerId, location: &Location) -> Delivery {
        if self.viewers.contains(&viewer) {
            tracing::debug!(%viewer, line_type = %self.line_type(), "line already displayed");
            return Delivery::Sent;
        }

        let frame = RenderFrame {
            viewer,
            services,
            location,
        };
        let spawns = self.payload.variant().spawns(&self.entities, &frame);

        let mut sent = Vec::with_capacity(spawns.len());
        for spawn in &spawns {
            let result = services.transport.spawn_entity(viewer, spawn);
            match self.settle(viewer, "spawn", result) {
                Delivery::Sent => sent.push(spawn.id),
                Delivery::Failed => {
                    self.roll_back(services, viewer, &sent);
                    return Delivery::Failed;
                }
                Delivery::Gone => return Delivery::Gone,
            }
        }
        self.viewers.insert(viewer);
        Delivery::Sent
    }

    /// No-op unless the line is shown to the viewer.
    pub fn update(&mut self, services: &Services, viewer: ViewerId, location: &Location) -> Delivery {
        if !self.viewers.contains(&viewer) {
            return Delivery::Sent;
        }

        let frame = RenderFrame {
            viewer,
            services,
            location,
        };
        for (entity, metadata) in self.payload.variant().metadata(&self.entities, &frame) {
            let result = services
                .transport
                .update_entity_metadata(viewer, entity, &metadata);
            match self.settle(viewer, "metadata", result) {
                Delivery::Sent => {}
                other => return other,
            }
        }
        Delivery::Sent
    }

    /// Drops a viewer without sending anything; their client is already gone.
    pub fn forget(&mut self, viewer: ViewerId) {
        self.viewers.remove(&viewer);
    }

    fn roll_back(&self, services: &Services, viewer: ViewerId, sent: &[EntityId]) {
        if sent.is_empty() {
            return;
        }
        if let Err(e) = services.transport.despawn_entity(viewer, sent) {
            tracing::warn!(%viewer, error = %e, "could not despawn partially displayed line");
        }
    }

    pub fn hide(&mut self, services: &Services, viewer: ViewerId) {
        if !self.viewers.remove(&viewer) {
            return;
        }
        match services.transport.despawn_entity(viewer, &self.entities) {
            Ok(()) => {}
            Err(TransportError::ViewerGone(_)) => {
                tracing::debug!(%viewer, "viewer gone before despawn");
            }
            Err(e) => {
                tracing::warn!(%viewer, error = %e, "despawn failed");
            }
        }
    }

    pub fn teleport(&mut self, services: &Services, viewer: ViewerId, location: &Location) {
        if !self.viewers.contains(&viewer) {
            return;
        }
        for i in 0..self.entities.len() {
            let entity = self.entities[i];
            let result = services.transport.teleport_entity(viewer, entity, location);
            if self.settle(viewer, "teleport", result) != Delivery::Sent {
                return;
            }
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Bulk operations
    // ───────────────────────────────────────────────────────────────

    pub fn display_all(&mut self, services: &Services, viewers: &[ViewerId], location: &Location) {
        for &viewer in viewers {
            self.display(services, viewer, location);
        }
    }

    pub fn update_all(&mut self, services: &Services, location: &Location) {
        for viewer in self.viewers() {
            self.update(services, viewer, location);
        }
    }

    /// Hides from everyone and returns who had it shown.
    pub fn hide_all(&mut self, services: &Services) -> Vec<ViewerId> {
        let viewers = self.viewers();
        for &viewer in &viewers {
            self.hide(services, viewer);
        }
        viewers
    }

    pub fn teleport_all(&mut self, services: &Services, location: &Location) {
        for viewer in self.viewers() {
            self.teleport(services, viewer, location);
        }
    }

    /// Anything but `Sent` means stop sending to this viewer. A gone viewer is forgotten.
    fn settle(&mut self, viewer: ViewerId, op: &str, result: Result<(), TransportError>) -> Delivery {
        match result {
            Ok(()) => Delivery::Sent,
            Err(TransportError::ViewerGone(_)) => {
                tracing::debug!(%viewer, op, "viewer gone, dropping line state");
                self.viewers.remove(&viewer);
                Delivery::Gone
            }
            Err(e) => {
                tracing::warn!(%viewer, op, error = %e, "transport error");
                Delivery::Failed
            }
        }
    }
}

/// Shared base for invisible stands used as nameplates and item holders.
pub(crate) fn stand_metadata() -> EntityMetadata {
    EntityMetadata {
        invisible: true,
        marker: true,
        no_gravity: true,
        ..EntityMetadata::default()
    }
}
