use super::line::Line;
use crate::action::ActionList;
use crate::condition::{ConditionHolder, ViewerContext};
use crate::error::HologramError;
use crate::render::{Delivery, LineType};
use crate::services::Services;
use crate::store::PageDefinition;
use holograms_io::{EntityId, Location, ViewerId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Where the page was last laid out. Structural edits reuse it.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub origin: Location,
    pub down_origin: bool,
    /// Head lines copy the origin's facing.
    pub rotate_heads: bool,
}

/// An ordered set of lines shown together.
pub struct Page {
    services: Arc<Services>,
    lines: RwLock<Vec<Arc<Line>>>,
    layout: Mutex<Layout>,
    viewers: Mutex<HashSet<ViewerId>>,
    click_conditions: RwLock<ConditionHolder>,
    click_actions: RwLock<ActionList>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("lines", &self.len())
            .field("viewers", &self.viewers.lock().len())
            .finish_non_exhaustive()
    }
}

impl Page {
    pub fn new(services: Arc<Services>, layout: Layout) -> Self {
        Self {
            services,
            lines: RwLock::new(Vec::new()),
            layout: Mutex::new(layout),
            viewers: Mutex::new(HashSet::new()),
            click_conditions: RwLock::new(ConditionHolder::new()),
            click_actions: RwLock::new(ActionList::new()),
        }
    }

    pub fn from_definition(
        services: Arc<Services>,
        definition: &PageDefinition,
        layout: Layout,
    ) -> Result<Self, HologramError> {
        let page = Self::new(services.clone(), layout.clone());
        {
            let mut lines = page.lines.write();
            for line in &definition.lines {
                lines.push(Arc::new(Line::from_definition(
                    services.clone(),
                    line,
                    layout.origin.clone(),
                )?));
            }
        }
        *page.click_conditions.write() = definition.click_conditions.clone();
        *page.click_actions.write() = definition.click_actions.clone();
        page.realign();
        Ok(page)
    }

    pub fn to_definition(&self) -> PageDefinition {
        PageDefinition {
            lines: self.lines().iter().map(|l| l.to_definition()).collect(),
            click_conditions: self.click_conditions.read().persistable(),
            click_actions: self.click_actions.read().clone(),
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Lines
    // ───────────────────────────────────────────────────────────────

    pub fn lines(&self) -> Vec<Arc<Line>> {
        self.lines.read().clone()
    }

    pub fn line(&self, index: usize) -> Option<Arc<Line>> {
        self.lines.read().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.lines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.read().is_empty()
    }

    pub fn add_line(&self, content: impl Into<String>) -> Result<Arc<Line>, HologramError> {
        let index = self.len();
        self.insert_line(index, content)
    }

    /// Inserts a line and shows it to everyone currently looking at the page.
    pub fn insert_line(
        &self,
        index: usize,
        content: impl Into<String>,
    ) -> Result<Arc<Line>, HologramError> {
        let origin = self.layout.lock().origin.clone();
        let line = Arc::new(Line::new(self.services.clone(), content, origin)?);
        {
            let mut lines = self.lines.write();
            if index > lines.len() {
                return Err(HologramError::LineOutOfRange {
                    index,
                    len: lines.len(),
                });
            }
            lines.insert(index, line.clone());
        }
        self.realign();

        for viewer in self.viewers() {
            // Failures here are retried by the next content pass.
            if line.can_view(viewer) {
                line.display(viewer);
            }
        }
        Ok(line)
    }

    pub fn remove_line(&self, index: usize) -> Result<Arc<Line>, HologramError> {
        let line = {
            let mut lines = self.lines.write();
            if index >= lines.len() {
                return Err(HologramError::LineOutOfRange {
                    index,
                    len: lines.len(),
                });
            }
            lines.remove(index)
        };
        line.hide_all();
        self.realign();
        Ok(line)
    }

    pub fn set_line(&self, index: usize, content: impl Into<String>) -> Result<LineType, HologramError> {
        let line = self.line(index).ok_or(HologramError::LineOutOfRange {
            index,
            len: self.len(),
        })?;
        let line_type = line.set_content(content)?;
        self.realign();
        Ok(line_type)
    }

    // ───────────────────────────────────────────────────────────────
    // Geometry
    // ───────────────────────────────────────────────────────────────

    pub fn height(&self) -> f64 {
        self.lines.read().iter().map(|l| l.height()).sum()
    }

    pub fn width(&self) -> f64 {
        self.lines
            .read()
            .iter()
            .map(|l| l.width())
            .fold(0.0, f64::max)
    }

    pub fn layout(&self) -> Layout {
        self.layout.lock().clone()
    }

    /// Stacks the lines downwards from the origin. With `down_origin` the
    /// origin is the bottom of the page instead of the top.
    pub fn recalculate(&self, layout: Layout) {
        let lines = self.lines();
        let total: f64 = lines.iter().map(|l| l.height()).sum();
        let mut cursor = layout.origin.y + if layout.down_origin { total } else { 0.0 };

        for line in &lines {
            let mut anchor = layout.origin.clone();
            anchor.y = cursor;
            let is_head = matches!(line.line_type(), Some(LineType::Head | LineType::SmallHead));
            if is_head && !layout.rotate_heads {
                anchor.yaw = 0.0;
                anchor.pitch = 0.0;
            }
            line.set_anchor(anchor);
            cursor -= line.height();
        }

        *self.layout.lock() = layout;
    }

    pub fn realign(&self) {
        let layout = self.layout();
        self.recalculate(layout);
    }

    // ───────────────────────────────────────────────────────────────
    // Viewers
    // ───────────────────────────────────────────────────────────────

    pub fn viewers(&self) -> Vec<ViewerId> {
        self.viewers.lock().iter().copied().collect()
    }

    pub fn is_viewing(&self, viewer: ViewerId) -> bool {
        self.viewers.lock().contains(&viewer)
    }

    /// Shows every line the viewer passes the view conditions of. Lines the
    /// transport refused are retried by the next [`Page::update`]. `Gone`
    /// means the viewer was dropped from the whole page.
    pub fn display(&self, viewer: ViewerId) -> Delivery {
        self.viewers.lock().insert(viewer);
        for line in self.lines() {
            if line.can_view(viewer) && line.display(viewer) == Delivery::Gone {
                self.forget(viewer);
                return Delivery::Gone;
            }
        }
        Delivery::Sent
    }

    /// Refreshes shown lines in place and brings per-line visibility up to date.
    pub fn update(&self, viewer: ViewerId) -> Delivery {
        if !self.is_viewing(viewer) {
            return Delivery::Sent;
        }
        for line in self.lines() {
            let delivery = match (line.can_view(viewer), line.is_shown_to(viewer)) {
                (true, true) => line.update(viewer),
                (true, false) => line.display(viewer),
                (false, true) => {
                    line.hide(viewer);
                    Delivery::Sent
                }
                (false, false) => Delivery::Sent,
            };
            if delivery == Delivery::Gone {
                self.forget(viewer);
                return Delivery::Gone;
            }
        }
        Delivery::Sent
    }

    /// Drops an unreachable viewer from every line without sending anything.
    pub fn forget(&self, viewer: ViewerId) {
        self.viewers.lock().remove(&viewer);
        for line in self.lines() {
            line.forget(viewer);
        }
    }

    pub fn hide(&self, viewer: ViewerId) {
        self.viewers.lock().remove(&viewer);
        for line in self.lines() {
            line.hide(viewer);
        }
    }

    pub fn hide_all(&self) -> Vec<ViewerId> {
        let viewers: Vec<ViewerId> = self.viewers.lock().drain().collect();
        for line in self.lines() {
            line.hide_all();
        }
        viewers
    }

    // ───────────────────────────────────────────────────────────────
    // Clicks
    // ───────────────────────────────────────────────────────────────

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

    /// The line shown to `viewer` that owns `entity`.
    pub fn line_for_entity(&self, viewer: ViewerId, entity: EntityId) -> Option<Arc<Line>> {
        self.lines()
            .into_iter()
            .find(|l| l.owns_entity(entity) && l.is_shown_to(viewer))
    }

    /// Runs the page's then the line's click actions, each behind its own
    /// click conditions. Returns whether anything ran.
    pub fn click(&self, viewer: ViewerId, line: &Line) -> bool {
        let ctx = ViewerContext::new(viewer, self.services.directory.as_ref());
        let actions = self.services.actions.as_ref();

        if !self.click_conditions.read().check(&ctx, actions) {
            return false;
        }
        let page_actions = self.click_actions();
        if !page_actions.is_empty() {
            actions.execute(viewer, &page_actions);
        }

        if !line.can_click(viewer) {
            return !page_actions.is_empty();
        }
        let line_actions = line.click_actions();
        if !line_actions.is_empty() {
            actions.execute(viewer, &line_actions);
        }
        !page_actions.is_empty() || !line_actions.is_empty()
    }
}
