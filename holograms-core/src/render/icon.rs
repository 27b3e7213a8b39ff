use super::{LineType, RenderFrame, RenderVariant, stand_metadata};
use holograms_io::{EntityId, EntityKind, EntityMetadata, EntitySpawn, ItemStack};

/// A floating item riding an invisible stand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconLine {
    pub item: ItemStack,
}

impl IconLine {
    pub fn new(item: ItemStack) -> Self {
        Self { item }
    }

    fn layout(&self, ids: &[EntityId]) -> Vec<(EntityId, EntityKind, EntityMetadata)> {
        let [stand, item] = ids else {
            return Vec::new();
        };
        vec![
            (*stand, EntityKind::ArmorStand, stand_metadata()),
            (
                *item,
                EntityKind::DroppedItem,
                EntityMetadata {
                    item: Some(self.item.clone()),
                    no_gravity: true,
                    vehicle: Some(*stand),
                    ..EntityMetadata::default()
                },
            ),
        ]
    }
}

impl RenderVariant for IconLine {
    fn line_type(&self) -> LineType {
        LineType::Icon
    }

    fn width(&self) -> f64 {
        0.5
    }

    fn entity_count(&self) -> usize {
        2
    }

    fn spawns(&self, ids: &[EntityId], frame: &RenderFrame<'_>) -> Vec<EntitySpawn> {
        self.layout(ids)
            .into_iter()
            .map(|(id, kind, metadata)| EntitySpawn {
                id,
                kind,
                location: frame.location.clone(),
                metadata,
            })
            .collect()
    }

    /// Only the item changes after spawn.
    fn metadata(&self, ids: &[EntityId], _frame: &RenderFrame<'_>) -> Vec<(EntityId, EntityMetadata)> {
        self.layout(ids)
            .into_iter()
            .skip(1)
            .map(|(id, _, metadata)| (id, metadata))
            .collect()
    }
}
