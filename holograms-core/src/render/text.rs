use super::{LineType, RenderFrame, RenderVariant, stand_metadata};
use holograms_io::{EntityId, EntityKind, EntityMetadata, EntitySpawn};

/// A nameplate on an invisible stand. The name is formatted per viewer and tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub text: String,
}

impl TextLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    fn nameplate(&self, frame: &RenderFrame<'_>) -> EntityMetadata {
        let tick = frame.services.ticker.current_tick();
        let name = frame.services.formatter.format(frame.viewer, &self.text, tick);
        EntityMetadata {
            custom_name_visible: !name.is_empty(),
            custom_name: Some(name),
            ..stand_metadata()
        }
    }
}

impl RenderVariant for TextLine {
    fn line_type(&self) -> LineType {
        LineType::Text
    }

    fn spawns(&self, ids: &[EntityId], frame: &RenderFrame<'_>) -> Vec<EntitySpawn> {
        ids.iter()
            .take(1)
            .map(|&id| EntitySpawn {
                id,
                kind: EntityKind::ArmorStand,
                location: frame.location.clone(),
                metadata: self.nameplate(frame),
            })
            .collect()
    }

    fn metadata(&self, ids: &[EntityId], frame: &RenderFrame<'_>) -> Vec<(EntityId, EntityMetadata)> {
        ids.iter()
            .take(1)
            .map(|&id| (id, self.nameplate(frame)))
            .collect()
    }
}
