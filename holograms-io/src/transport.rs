//! Entity transport.
//!
//! The engine never encodes packets. It describes virtual entities and hands
//! spawn/metadata/despawn/teleport operations to a [`Transport`], keyed by
//! (viewer, entity). Implementations pick the wire layout for the viewer's
//! protocol revision.

use crate::location::Location;
use crate::version::ProtocolVersion;
use crate::viewer::{ViewerDirectory, ViewerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;

/// Client-side id of a virtual entity. The same id is reused for every viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out entity ids from a range the world engine does not use.
#[derive(Debug)]
pub struct EntityIdAllocator {
    next: AtomicI32,
}

impl EntityIdAllocator {
    /// Real entities count up from zero; virtual ones start far above them.
    pub const DEFAULT_BASE: i32 = 1_000_000_000;

    pub fn new() -> Self {
        Self::starting_at(Self::DEFAULT_BASE)
    }

    pub fn starting_at(base: i32) -> Self {
        Self {
            next: AtomicI32::new(base),
        }
    }

    pub fn next(&self) -> EntityId {
        EntityId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    pub fn take(&self, count: usize) -> Vec<EntityId> {
        (0..count).map(|_| self.next()).collect()
    }
}

impl Default for EntityIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// An item as shown on an icon or worn as a head.
///
/// Text form: `MATERIAL`, optionally followed by `(extra)` (a texture or
/// head id) and/or the `!ENCHANTED` flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub material: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    #[serde(default)]
    pub enchanted: bool,
}

impl ItemStack {
    pub fn new(material: impl Into<String>) -> Self {
        Self {
            material: material.into(),
            extra: None,
            enchanted: false,
        }
    }

    /// Lenient parse; unknown or empty input falls back to `STONE`.
    pub fn parse(input: &str) -> Self {
        let mut rest = input.trim().to_string();

        let enchanted = rest.contains("!ENCHANTED");
        if enchanted {
            rest = rest.replace("!ENCHANTED", "");
        }

        let mut extra = None;
        if let (Some(open), Some(close)) = (rest.find('('), rest.rfind(')')) {
            if open < close {
                let inner = rest[open + 1..close].trim();
                if !inner.is_empty() {
                    extra = Some(inner.to_string());
                }
                rest = format!("{}{}", &rest[..open], &rest[close + 1..]);
            }
        }

        let material = rest
            .split_whitespace()
            .next()
            .map(|m| m.to_ascii_uppercase())
            .unwrap_or_else(|| "STONE".to_string());

        Self {
            material,
            extra,
            enchanted,
        }
    }
}

impl FromStr for ItemStack {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ItemStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.material)?;
        if let Some(extra) = &self.extra {
            write!(f, " ({extra})")?;
        }
        if self.enchanted {
            f.write_str(" !ENCHANTED")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    ArmorStand,
    DroppedItem,
    /// A living entity by its engine type name, e.g. `ZOMBIE`.
    Living(String),
}

/// The metadata fields a hologram entity can carry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub custom_name: Option<String>,
    pub custom_name_visible: bool,
    pub invisible: bool,
    pub small: bool,
    pub marker: bool,
    pub no_gravity: bool,
    pub helmet: Option<ItemStack>,
    pub item: Option<ItemStack>,
    /// The entity this one rides on.
    pub vehicle: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpawn {
    pub id: EntityId,
    pub kind: EntityKind,
    pub location: Location,
    pub metadata: EntityMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The viewer left between the decision to send and the send itself.
    #[error("viewer {0} is no longer connected")]
    ViewerGone(ViewerId),
    #[error("transport channel closed")]
    ChannelClosed,
    #[error("transport rejected operation: {0}")]
    Rejected(String),
}

/// Fire-and-forget entity operations for one viewer.
///
/// Calls must not wait for the client. An implementation reports
/// [`TransportError::ViewerGone`] when the viewer is no longer reachable;
/// callers treat that as cleanup, not failure.
pub trait Transport: Send + Sync {
    fn spawn_entity(&self, viewer: ViewerId, spawn: &EntitySpawn) -> Result<(), TransportError>;

    fn update_entity_metadata(
        &self,
        viewer: ViewerId,
        entity: EntityId,
        metadata: &EntityMetadata,
    ) -> Result<(), TransportError>;

    fn despawn_entity(&self, viewer: ViewerId, entities: &[EntityId])
    -> Result<(), TransportError>;

    fn teleport_entity(
        &self,
        viewer: ViewerId,
        entity: EntityId,
        location: &Location,
    ) -> Result<(), TransportError>;
}

// ════════════════════════════════════════════════════════════════════
// Channel transport
// ════════════════════════════════════════════════════════════════════

/// One entity operation, as handed to an encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityOp {
    Spawn(EntitySpawn),
    Metadata {
        entity: EntityId,
        metadata: EntityMetadata,
    },
    Despawn(Vec<EntityId>),
    Teleport {
        entity: EntityId,
        location: Location,
    },
}

/// An operation addressed to a viewer, tagged with the viewer's protocol revision
/// so the encoder can choose the layout.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundPacket {
    pub viewer: ViewerId,
    pub protocol: ProtocolVersion,
    pub op: EntityOp,
}

/// Forwards operations over a bounded channel to an encoder task.
///
/// Sends never block: a full channel drops the operation with
/// [`TransportError::Rejected`].
pub struct ChannelTransport {
    tx: mpsc::Sender<OutboundPacket>,
    directory: Arc<dyn ViewerDirectory>,
}

impl fmt::Debug for ChannelTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelTransport")
            .field("capacity", &self.tx.capacity())
            .finish()
    }
}

impl ChannelTransport {
    pub fn new(
        directory: Arc<dyn ViewerDirectory>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<OutboundPacket>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, directory }, rx)
    }

    fn send(&self, viewer: ViewerId, op: EntityOp) -> Result<(), TransportError> {
        let Some(protocol) = self.directory.protocol(viewer) else {
            return Err(TransportError::ViewerGone(viewer));
        };

        self.tx
            .try_send(OutboundPacket {
                viewer,
                protocol,
                op,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    TransportError::Rejected("encoder queue full".to_string())
                }
                mpsc::error::TrySendError::Closed(_) => TransportError::ChannelClosed,
            })
    }
}

impl Transport for ChannelTransport {
    fn spawn_entity(&self, viewer: ViewerId, spawn: &EntitySpawn) -> Result<(), TransportError> {
        self.send(viewer, EntityOp::Spawn(spawn.clone()))
    }

    fn update_entity_metadata(
        &self,
        viewer: ViewerId,
        entity: EntityId,
        metadata: &EntityMetadata,
    ) -> Result<(), TransportError> {
        self.send(
            viewer,
            EntityOp::Metadata {
                entity,
                metadata: metadata.clone(),
            },
        )
    }

    fn despawn_entity(
        &self,
        viewer: ViewerId,
        entities: &[EntityId],
    ) -> Result<(), TransportError> {
        self.send(viewer, EntityOp::Despawn(entities.to_vec()))
    }

    fn teleport_entity(
        &self,
        viewer: ViewerId,
        entity: EntityId,
        location: &Location,
    ) -> Result<(), TransportError> {
        self.send(
            viewer,
            EntityOp::Teleport {
                entity,
                location: location.clone(),
            },
        )
    }
}
