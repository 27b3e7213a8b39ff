use super::{LineType, RenderFrame, RenderVariant};
use holograms_io::{EntityId, EntityKind, EntityMetadata, EntitySpawn};

/// A frozen living entity of a named type, e.g. `ZOMBIE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityLine {
    pub entity_type: String,
}

impl EntityLine {
    pub fn new(entity_type: impl AsRef<str>) -> Self {
        Self {
            entity_type: entity_type.as_ref().trim().to_ascii_uppercase(),
        }
    }

    fn body(&self) -> EntityMetadata {
        EntityMetadata {
            no_gravity: true,
            ..EntityMetadata::default()
        }
    }
}

/// Standing height of common types; anything else is treated as one block tall.
fn entity_height(entity_type: &str) -> f64 {
    match entity_type {
        "ZOMBIE" | "SKELETON" | "HUSK" | "DROWNED" | "VILLAGER" | "WITCH" | "PLAYER"
        | "PIGLIN" | "EVOKER" | "PILLAGER" | "VINDICATOR" => 1.95,
        "ENDERMAN" => 2.9,
        "IRON_GOLEM" => 2.7,
        "WITHER_SKELETON" => 2.4,
        "BLAZE" => 1.8,
        "CREEPER" => 1.7,
        "COW" | "MOOSHROOM" | "SHEEP" => 1.3,
        "HORSE" | "DONKEY" | "MULE" => 1.6,
        "PIG" | "SPIDER" => 0.9,
        "WOLF" | "FOX" => 0.85,
        "CHICKEN" | "CAT" | "OCELOT" => 0.7,
        "BAT" => 0.9,
        "SLIME" | "MAGMA_CUBE" => 0.51,
        "SILVERFISH" | "ENDERMITE" => 0.3,
        _ => LineType::Entity.height(),
    }
}

impl RenderVariant for EntityLine {
    fn line_type(&self) -> LineType {
        LineType::Entity
    }

    fn height(&self) -> f64 {
        entity_height(&self.entity_type)
    }

    fn width(&self) -> f64 {
        0.6
    }

    fn spawns(&self, ids: &[EntityId], frame: &RenderFrame<'_>) -> Vec<EntitySpawn> {
        ids.iter()
            .take(1)
            .map(|&id| EntitySpawn {
                id,
                kind: EntityKind::Living(self.entity_type.clone()),
                location: frame.location.clone(),
                metadata: self.body(),
            })
            .collect()
    }

    fn metadata(&self, ids: &[EntityId], _frame: &RenderFrame<'_>) -> Vec<(EntityId, EntityMetadata)> {
        ids.iter().take(1).map(|&id| (id, self.body())).collect()
    }
}
