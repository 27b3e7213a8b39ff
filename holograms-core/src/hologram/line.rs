use crate::action::ActionList;
use crate::condition::{ConditionHolder, ViewerContext};
use crate::error::HologramError;
use crate::render::{Delivery, LineRenderer, LineType, Payload};
use crate::services::Services;
use crate::store::LineDefinition;
use holograms_io::{EntityId, Location, ViewerId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Layout footprint of a line. Follows the renderer variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSettings {
    pub height: f64,
    pub width: f64,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            height: LineType::Text.height(),
            width: 0.0,
        }
    }
}

/// Offset of the spawned entities from the line's slot in the page.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offsets {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// The mutable state of a line, kept under one lock so content, geometry and
/// renderer never disagree.
#[derive(Debug)]
pub struct LineBody {
    pub content: String,
    pub settings: LineSettings,
    pub offsets: Offsets,
    /// The line's slot, set by the page layout.
    pub anchor: Location,
    pub renderer: Option<LineRenderer>,
}

impl LineBody {
    pub fn new(content: impl Into<String>, anchor: Location) -> Self {
        Self {
            content: content.into(),
            settings: LineSettings::default(),
            offsets: Offsets::default(),
            anchor,
            renderer: None,
        }
    }

    pub fn location(&self) -> Location {
        self.anchor
            .offset(self.offsets.x, self.offsets.y, self.offsets.z)
    }

    /// Installs a freshly classified payload.
    ///
    /// Same entity layout: the payload is swapped in place and every viewer is
    /// updated. Otherwise the old renderer is hidden from everyone, replaced, and
    /// the new one is displayed to the same viewers.
    pub fn apply_payload(&mut self, payload: Payload, services: &Services) {
        let line_type = payload.line_type();

        let payload = match self.renderer.as_mut() {
            Some(renderer) => match renderer.set_payload(payload) {
                Ok(()) => {
                    self.settings.height = renderer.height();
                    self.settings.width = renderer.width();

                    let location = self.location();
                    if let Some(renderer) = self.renderer.as_mut() {
                        renderer.update_all(services, &location);
                    }
                    return;
                }
                Err(payload) => payload,
            },
            None => payload,
        };

        let viewers = self
            .renderer
            .take()
            .map(|mut old| old.hide_all(services))
            .unwrap_or_default();

        let renderer = LineRenderer::new(payload, services);
        self.offsets.y = renderer.offset_y();
        self.settings.height = renderer.height();
        self.settings.width = renderer.width();

        let location = self.location();
        let renderer = self.renderer.insert(renderer);
        renderer.display_all(services, &viewers, &location);

        tracing::trace!(%line_type, viewers = viewers.len(), "line renderer replaced");
    }

    /// Moves the slot; shown entities follow without a respawn.
    pub fn set_anchor(&mut self, anchor: Location, services: &Services) {
        let unchanged = self.anchor.approx_eq(&anchor)
            && self.anchor.yaw == anchor.yaw
            && self.anchor.pitch == anchor.pitch;
        self.anchor = anchor;
        if unchanged {
            return;
        }
        let location = self.location();
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.teleport_all(services, &location);
        }
    }
}

/// One row of a page.
pub struct Line {
    services: Arc<Services>,
    body: Mutex<LineBody>,
    view_conditions: RwLock<ConditionHolder>,
    click_conditions: RwLock<ConditionHolder>,
    click_actions: RwLock<ActionList>,
}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self.body.lock();
        f.debug_struct("Line")
            .field("content", &body.content)
            .field("renderer", &body.renderer)
            .finish_non_exhaustive()
    }
}

impl Line {
    pub fn new(
        services: Arc<Services>,
        content: impl Into<String>,
        anchor: Location,
    ) -> Result<Self, HologramError> {
        let mut body = LineBody::new(content, anchor);
        services.parsers.parse(&mut body, &services)?;

        Ok(Self {
            services,
            body: Mutex::new(body),
            view_conditions: RwLock::new(ConditionHolder::new()),
            click_conditions: RwLock::new(ConditionHolder::new()),
            click_actions: RwLock::new(ActionList::new()),
        })
    }

    pub fn from_definition(
        services: Arc<Services>,
        definition: &LineDefinition,
        anchor: Location,
    ) -> Result<Self, HologramError> {
        let line = Self::new(services, definition.content.clone(), anchor)?;
        {
            let mut body = line.body.lock();
            body.offsets.x = definition.offset_x;
            body.offsets.z = definition.offset_z;
        }
        *line.view_conditions.write() = definition.view_conditions.clone();
        *line.click_conditions.write() = definition.click_conditions.clone();
        *line.click_actions.write() = definition.click_actions.clone();
        Ok(line)
    }

    pub fn to_definition(&self) -> LineDefinition {
        let body = self.body.lock();
        LineDefinition {
            content: body.content.clone(),
            offset_x: body.offsets.x,
            offset_z: body.offsets.z,
            view_conditions: self.view_conditions.read().persistable(),
            click_conditions: self.click_conditions.read().persistable(),
            click_actions: self.click_actions.read().clone(),
        }
    }

    pub fn content(&self) -> String {
        self.body.lock().content.clone()
    }

    /// Re-parses the line. The renderer follows the new classification.
    pub fn set_content(&self, content: impl Into<String>) -> Result<LineType, HologramError> {
        let mut body = self.body.lock();
        body.content = content.into();
        self.services.parsers.parse(&mut body, &self.services)
    }

    pub fn line_type(&self) -> Option<LineType> {
        self.body.lock().renderer.as_ref().map(LineRenderer::line_type)
    }

    pub fn settings(&self) -> LineSettings {
        self.body.lock().settings
    }

    pub fn height(&self) -> f64 {
        self.body.lock().settings.height
    }

    pub fn width(&self) -> f64 {
        self.body.lock().settings.width
    }

    pub fn offsets(&self) -> Offsets {
        self.body.lock().offsets
    }

    /// Horizontal offsets only; the vertical one belongs to the renderer variant.
    pub fn set_horizontal_offsets(&self, x: f64, z: f64) {
        let mut body = self.body.lock();
        body.offsets.x = x;
        body.offsets.z = z;
        let location = body.location();
        if let Some(renderer) = body.renderer.as_mut() {
            renderer.teleport_all(&self.services, &location);
        }
    }

    pub fn location(&self) -> Location {
        self.body.lock().location()
    }

    pub fn set_anchor(&self, anchor: Location) {
        self.body.lock().set_anchor(anchor, &self.services);
    }

    // ───────────────────────────────────────────────────────────────
    // Conditions & actions
    // ───────────────────────────────────────────────────────────────

    pub fn view_conditions(&self) -> ConditionHolder {
        self.view_conditions.read().clone()
    }

    pub fn set_view_conditions(&self, conditions: ConditionHolder) {
        *self.view_conditions.write() = conditions;
    }

    pub fn click_conditions(&self) -> ConditionHolder {
        self.click_conditions.read().clone()
    }

    pub fn set_click_conditions(&self, conditions: ConditionHolder) {
        *self.click_conditions.write() = conditions;
    }

    pub fn click_actions(&self) -> ActionList {
        self.click_actions.read().clone()
    }

    pub fn set_click_actions(&self, actions: ActionList) {
        *self.click_actions.write() = actions;
    }

    pub fn can_view(&self, viewer: ViewerId) -> bool {
        let ctx = ViewerContext::new(viewer, self.services.directory.as_ref());
        self.view_conditions
            .read()
            .check(&ctx, self.services.actions.as_ref())
    }

    pub fn can_click(&self, viewer: ViewerId) -> bool {
        let ctx = ViewerContext::new(viewer, self.services.directory.as_ref());
        self.click_conditions
            .read()
            .check(&ctx, self.services.actions.as_ref())
    }

    // ───────────────────────────────────────────────────────────────
    // Rendering
    // ───────────────────────────────────────────────────────────────

    pub fn display(&self, viewer: ViewerId) -> Delivery {
        let mut body = self.body.lock();
        let location = body.location();
        match body.renderer.as_mut() {
            Some(renderer) => renderer.display(&self.services, viewer, &location),
            None => Delivery::Sent,
        }
    }

    pub fn update(&self, viewer: ViewerId) -> Delivery {
        let mut body = self.body.lock();
        let location = body.location();
        match body.renderer.as_mut() {
            Some(renderer) => renderer.update(&self.services, viewer, &location),
            None => Delivery::Sent,
        }
    }

    pub fn forget(&self, viewer: ViewerId) {
        if let Some(renderer) = self.body.lock().renderer.as_mut() {
            renderer.forget(viewer);
        }
    }

    pub fn hide(&self, viewer: ViewerId) {
        if let Some(renderer) = self.body.lock().renderer.as_mut() {
            renderer.hide(&self.services, viewer);
        }
    }

    pub fn hide_all(&self) -> Vec<ViewerId> {
        self.body
            .lock()
            .renderer
            .as_mut()
            .map(|r| r.hide_all(&self.services))
            .unwrap_or_default()
    }

    pub fn is_shown_to(&self, viewer: ViewerId) -> bool {
        self.body
            .lock()
            .renderer
            .as_ref()
            .is_some_and(|r| r.is_shown_to(viewer))
    }

    pub fn owns_entity(&self, entity: EntityId) -> bool {
        self.body
            .lock()
            .renderer
            .as_ref()
            .is_some_and(|r| r.owns(entity))
    }

    pub fn entities(&self) -> Vec<EntityId> {
        self.body
            .lock()
            .renderer
            .as_ref()
            .map(|r| r.entities().to_vec())
            .unwrap_or_default()
    }
}
