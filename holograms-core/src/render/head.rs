use super::{LineType, RenderFrame, RenderVariant, stand_metadata};
use holograms_io::{EntityId, EntityKind, EntityMetadata, EntitySpawn, ItemStack};

/// An invisible stand wearing the item on its head, full size or small.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadLine {
    pub item: ItemStack,
    pub small: bool,
}

impl HeadLine {
    pub fn new(item: ItemStack) -> Self {
        Self { item, small: false }
    }

    pub fn small(item: ItemStack) -> Self {
        Self { item, small: true }
    }

    fn stand(&self) -> EntityMetadata {
        EntityMetadata {
            helmet: Some(self.item.clone()),
            small: self.small,
            ..stand_metadata()
        }
    }
}

impl RenderVariant for HeadLine {
    fn line_type(&self) -> LineType {
        if self.small {
            LineType::SmallHead
        } else {
            LineType::Head
        }
    }

    fn width(&self) -> f64 {
        if self.small { 0.5 } else { 0.7 }
    }

    fn spawns(&self, ids: &[EntityId], frame: &RenderFrame<'_>) -> Vec<EntitySpawn> {
        ids.iter()
            .take(1)
            .map(|&id| EntitySpawn {
                id,
                kind: EntityKind::ArmorStand,
                location: frame.location.clone(),
                metadata: self.stand(),
            })
            .collect()
    }

    fn metadata(&self, ids: &[EntityId], _frame: &RenderFrame<'_>) -> Vec<(EntityId, EntityMetadata)> {
        ids.iter().take(1).map(|&id| (id, self.stand())).collect()
    }
}
