//! A transport that remembers what it was asked to do.
//! Used by the engine's tests and handy for dry runs.

use crate::location::Location;
use crate::transport::{EntityId, EntityMetadata, EntitySpawn, Transport, TransportError};
use crate::viewer::ViewerId;
use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedOp {
    Spawn {
        viewer: ViewerId,
        spawn: EntitySpawn,
    },
    Metadata {
        viewer: ViewerId,
        entity: EntityId,
        metadata: EntityMetadata,
    },
    Despawn {
        viewer: ViewerId,
        entities: Vec<EntityId>,
    },
    Teleport {
        viewer: ViewerId,
        entity: EntityId,
        location: Location,
    },
}

impl RecordedOp {
    pub fn viewer(&self) -> ViewerId {
        match self {
            Self::Spawn { viewer, .. }
            | Self::Metadata { viewer, .. }
            | Self::Despawn { viewer, .. }
            | Self::Teleport { viewer, .. } => *viewer,
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    ops: Mutex<Vec<RecordedOp>>,
    gone: Mutex<HashSet<ViewerId>>,
    reject_spawn_in: Mutex<Option<usize>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// From now on every operation for `viewer` fails with `ViewerGone`.
    pub fn mark_gone(&self, viewer: ViewerId) {
        self.gone.lock().insert(viewer);
    }

    /// Lets `after` spawns through, then fails one with `Rejected` as a full
    /// encoder queue would.
    pub fn reject_spawn(&self, after: usize) {
        *self.reject_spawn_in.lock() = Some(after);
    }

    pub fn ops(&self) -> Vec<RecordedOp> {
        self.ops.lock().clone()
    }

    pub fn ops_for(&self, viewer: ViewerId) -> Vec<RecordedOp> {
        self.ops
            .lock()
            .iter()
            .filter(|op| op.viewer() == viewer)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.ops.lock().clear();
    }

    pub fn spawns(&self) -> Vec<(ViewerId, EntitySpawn)> {
        self.ops
            .lock()
            .iter()
            .filter_map(|op| match op {
                RecordedOp::Spawn { viewer, spawn } => Some((*viewer, spawn.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn spawn_count(&self, viewer: ViewerId) -> usize {
        self.count(viewer, |op| matches!(op, RecordedOp::Spawn { .. }))
    }

    pub fn metadata_count(&self, viewer: ViewerId) -> usize {
        self.count(viewer, |op| matches!(op, RecordedOp::Metadata { .. }))
    }

    pub fn despawn_count(&self, viewer: ViewerId) -> usize {
        self.count(viewer, |op| matches!(op, RecordedOp::Despawn { .. }))
    }

    pub fn teleport_count(&self, viewer: ViewerId) -> usize {
        self.count(viewer, |op| matches!(op, RecordedOp::Teleport { .. }))
    }

    /// Last custom name sent to `viewer` for `entity`, via spawn or metadata.
    pub fn last_name(&self, viewer: ViewerId, entity: EntityId) -> Option<String> {
        self.ops.lock().iter().rev().find_map(|op| match op {
            RecordedOp::Spawn { viewer: v, spawn } if *v == viewer && spawn.id == entity => {
                spawn.metadata.custom_name.clone()
            }
            RecordedOp::Metadata {
                viewer: v,
                entity: e,
                metadata,
            } if *v == viewer && *e == entity => metadata.custom_name.clone(),
            _ => None,
        })
    }

    fn count(&self, viewer: ViewerId, pred: impl Fn(&RecordedOp) -> bool) -> usize {
        self.ops
            .lock()
            .iter()
            .filter(|op| op.viewer() == viewer && pred(op))
            .count()
    }

    fn record(&self, viewer: ViewerId, op: RecordedOp) -> Result<(), TransportError> {
        if self.gone.lock().contains(&viewer) {
            return Err(TransportError::ViewerGone(viewer));
        }
        self.ops.lock().push(op);
        Ok(())
    }
}

impl Transport for RecordingTransport {
    fn spawn_entity(&self, viewer: ViewerId, spawn: &EntitySpawn) -> Result<(), TransportError> {
        {
            let mut countdown = self.reject_spawn_in.lock();
            match *countdown {
                Some(0) => {
                    *countdown = None;
                    return Err(TransportError::Rejected("spawn refused".to_string()));
                }
                Some(left) => *countdown = Some(left - 1),
                None => {}
            }
        }
        self.record(
            viewer,
            RecordedOp::Spawn {
                viewer,
                spawn: spawn.clone(),
            },
        )
    }

    fn update_entity_metadata(
        &self,
        viewer: ViewerId,
        entity: EntityId,
        metadata: &EntityMetadata,
    ) -> Result<(), TransportError> {
        self.record(
            viewer,
            RecordedOp::Metadata {
                viewer,
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
        self.record(
            viewer,
            RecordedOp::Despawn {
                viewer,
                entities: entities.to_vec(),
            },
        )
    }

    fn teleport_entity(
        &self,
        viewer: ViewerId,
        entity: EntityId,
        location: &Location,
    ) -> Result<(), TransportError> {
        self.record(
            viewer,
            RecordedOp::Teleport {
                viewer,
                entity,
                location: location.clone(),
            },
        )
    }
}
