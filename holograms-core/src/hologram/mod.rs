//! The hologram aggregate: pages of lines at a position, shown per viewer.

mod line;
mod page;
mod position;
mod settings;

pub use line::{Line, LineBody, LineSettings, Offsets};
pub use page::{Layout, Page};
pub use position::{BindContext, LocationBinder, Position, ViewerAnchor};
pub use settings::HologramSettings;

use crate::condition::ConditionHolder;
use crate::error::HologramError;
use crate::services::Services;
use crate::store::HologramDefinition;
use crate::ticker::{TickContext, TickHandle, Ticked};
use crate::visibility::{Pass, VisibilityManager};
use holograms_io::{EntityId, Location, ViewerId};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Two-phase construction: a hologram waiting on its stored definition is
/// `Pending` and does not tick until it is `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Pending,
    Ready,
    Destroyed,
}

pub struct Hologram {
    name: String,
    services: Arc<Services>,
    position: RwLock<Position>,
    /// Last resolved position.
    origin: RwLock<Location>,
    settings: RwLock<HologramSettings>,
    pages: RwLock<Vec<Arc<Page>>>,
    view_conditions: RwLock<ConditionHolder>,
    visibility: VisibilityManager,
    lifecycle: watch::Sender<Lifecycle>,
    /// Serialises reconciliation against page navigation and page list edits.
    reconcile: ReentrantMutex<()>,
    last_visibility: Mutex<Option<Instant>>,
    last_content: Mutex<Option<Instant>>,
    tick_handle: Mutex<Option<TickHandle>>,
}

impl fmt::Debug for Hologram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hologram")
            .field("name", &self.name)
            .field("lifecycle", &self.lifecycle())
            .field("pages", &self.page_count())
            .field("visibility", &self.visibility)
            .finish_non_exhaustive()
    }
}

fn due(last: &Mutex<Option<Instant>>, now: Instant, interval: Duration) -> bool {
    let mut last = last.lock();
    let due = last.is_none_or(|t| now.saturating_duration_since(t) >= interval);
    if due {
        *last = Some(now);
    }
    due
}

impl Hologram {
    /// A ready hologram with one empty page. Not ticking until [`Hologram::start_ticking`].
    pub fn new(
        name: impl Into<String>,
        services: Arc<Services>,
        location: Location,
        settings: HologramSettings,
    ) -> Arc<Self> {
        let hologram = Self::build(name.into(), services, location, settings, Lifecycle::Ready);
        hologram.add_page();
        hologram
    }

    /// A hologram waiting on [`Hologram::mark_ready`], with no pages yet.
    pub fn pending(
        name: impl Into<String>,
        services: Arc<Services>,
        location: Location,
        settings: HologramSettings,
    ) -> Arc<Self> {
        Self::build(name.into(), services, location, settings, Lifecycle::Pending)
    }

    fn build(
        name: String,
        services: Arc<Services>,
        location: Location,
        settings: HologramSettings,
        lifecycle: Lifecycle,
    ) -> Arc<Self> {
        let (lifecycle, _) = watch::channel(lifecycle);
        Arc::new(Self {
            name,
            visibility: VisibilityManager::new(services.clone()),
            services,
            position: RwLock::new(Position::Fixed(location.clone())),
            origin: RwLock::new(location),
            settings: RwLock::new(settings),
            pages: RwLock::new(Vec::new()),
            view_conditions: RwLock::new(ConditionHolder::new()),
            lifecycle,
            reconcile: ReentrantMutex::new(()),
            last_visibility: Mutex::new(None),
            last_content: Mutex::new(None),
            tick_handle: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn visibility(&self) -> &VisibilityManager {
        &self.visibility
    }

    // ───────────────────────────────────────────────────────────────
    // Lifecycle
    // ───────────────────────────────────────────────────────────────

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle() == Lifecycle::Ready
    }

    pub fn start_ticking(self: &Arc<Self>) {
        let mut handle = self.tick_handle.lock();
        if handle.is_some() || self.lifecycle() == Lifecycle::Destroyed {
            return;
        }
        let unit: Weak<dyn Ticked> = Arc::downgrade(self) as Weak<dyn Ticked>;
        *handle = Some(self.services.ticker.start(unit));
    }

    /// Stops ticking. When this returns no tick of this hologram is running.
    pub fn stop_ticking(&self) {
        if let Some(handle) = self.tick_handle.lock().take() {
            self.services.ticker.stop(handle);
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.tick_handle
            .lock()
            .is_some_and(|h| self.services.ticker.is_scheduled(h))
    }

    pub fn mark_ready(&self) {
        self.lifecycle.send_if_modified(|state| {
            if *state == Lifecycle::Pending {
                *state = Lifecycle::Ready;
                true
            } else {
                false
            }
        });
    }

    /// Resolves once the hologram leaves `Pending`.
    pub async fn wait_ready(&self) -> Lifecycle {
        let mut rx = self.lifecycle.subscribe();
        match rx.wait_for(|state| *state != Lifecycle::Pending).await {
            Ok(state) => *state,
            Err(_) => self.lifecycle(),
        }
    }

    /// Stops ticking first, then releases every viewer.
    pub fn destroy(&self) {
        if self.lifecycle() == Lifecycle::Destroyed {
            return;
        }
        self.stop_ticking();
        self.lifecycle.send_replace(Lifecycle::Destroyed);

        let _guard = self.reconcile.lock();
        let hidden = self.visibility.destroy();
        tracing::info!(hologram = %self.name, hidden, "hologram destroyed");
    }

    fn ensure_alive(&self) -> Result<(), HologramError> {
        if self.lifecycle() == Lifecycle::Destroyed {
            return Err(HologramError::Destroyed(self.name.clone()));
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────
    // Settings & position
    // ───────────────────────────────────────────────────────────────

    pub fn settings(&self) -> HologramSettings {
        self.settings.read().clone()
    }

    pub fn update_settings(&self, f: impl FnOnce(&mut HologramSettings)) {
        let enabled = {
            let mut settings = self.settings.write();
            f(&mut settings);
            settings.enabled
        };
        if !enabled {
            let _guard = self.reconcile.lock();
            self.visibility.hide_all();
        }
        self.recalculate();
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.update_settings(|s| s.enabled = enabled);
    }

    pub fn view_conditions(&self) -> ConditionHolder {
        self.view_conditions.read().clone()
    }

    pub fn set_view_conditions(&self, conditions: ConditionHolder) {
        *self.view_conditions.write() = conditions;
    }

    pub fn location(&self) -> Location {
        self.origin.read().clone()
    }

    pub fn set_location(&self, location: Location) {
        *self.position.write() = Position::Fixed(location);
        self.recalculate();
    }

    pub fn bind(&self, binder: Arc<dyn LocationBinder>) {
        *self.position.write() = Position::Bound(binder);
        self.recalculate();
    }

    pub fn position(&self) -> Position {
        self.position.read().clone()
    }

    /// Resolves the position and lays out every page from it.
    pub fn recalculate(&self) {
        let settings = self.settings();
        let position = self.position();

        let resolved = match &position {
            Position::Fixed(location) => Some(location.clone()),
            Position::Bound(binder) => {
                let page_height = |viewer: ViewerId| {
                    self.page(self.visibility.page_of(viewer))
                        .map_or(0.0, |p| p.height())
                };
                binder.bind(&BindContext {
                    directory: self.services.directory.as_ref(),
                    down_origin: settings.down_origin,
                    page_height: &page_height,
                })
            }
        };
        let mut origin = match resolved {
            Some(location) => {
                *self.origin.write() = location.clone();
                location
            }
            None => self.location(),
        };

        if !settings.rotate_horizontal {
            origin.yaw = 0.0;
        }
        if !settings.rotate_vertical {
            origin.pitch = 0.0;
        }
        let layout = Layout {
            origin,
            down_origin: settings.down_origin,
            rotate_heads: settings.rotate_heads,
        };
        for page in self.pages() {
            page.recalculate(layout.clone());
        }
    }

    fn layout(&self) -> Layout {
        let settings = self.settings.read();
        Layout {
            origin: self.location(),
            down_origin: settings.down_origin,
            rotate_heads: settings.rotate_heads,
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Pages
    // ───────────────────────────────────────────────────────────────

    pub fn pages(&self) -> Vec<Arc<Page>> {
        self.pages.read().clone()
    }

    pub fn page(&self, index: usize) -> Option<Arc<Page>> {
        self.pages.read().get(index).cloned()
    }

    pub fn page_count(&self) -> usize {
        self.pages.read().len()
    }

    pub fn index_of(&self, page: &Arc<Page>) -> Option<usize> {
        self.pages.read().iter().position(|p| Arc::ptr_eq(p, page))
    }

    /// Appends an empty page. Appending never moves existing indices.
    pub fn add_page(&self) -> Arc<Page> {
        let _guard = self.reconcile.lock();
        let page = Arc::new(Page::new(self.services.clone(), self.layout()));
        let pages = {
            let mut pages = self.pages.write();
            pages.push(page.clone());
            pages.clone()
        };
        self.visibility.resolve(&pages);
        page
    }

    /// Inserts an empty page. Viewers on `index` or later move up by one.
    pub fn insert_page(&self, index: usize) -> Result<Arc<Page>, HologramError> {
        self.ensure_alive()?;
        let _guard = self.reconcile.lock();
        let page = Arc::new(Page::new(self.services.clone(), self.layout()));
        let pages = {
            let mut pages = self.pages.write();
            if index > pages.len() {
                return Err(HologramError::PageOutOfRange {
                    index,
                    len: pages.len(),
                });
            }
            pages.insert(index, page.clone());
            pages.clone()
        };
        self.visibility.shift_pages(index, 1, &pages);
        Ok(page)
    }

    /// Removes a page. Viewers on `index` or later move down by one.
    pub fn remove_page(&self, index: usize) -> Result<Arc<Page>, HologramError> {
        self.ensure_alive()?;
        let _guard = self.reconcile.lock();
        let (removed, pages) = {
            let mut pages = self.pages.write();
            if index >= pages.len() {
                return Err(HologramError::PageOutOfRange {
                    index,
                    len: pages.len(),
                });
            }
            let removed = pages.remove(index);
            (removed, pages.clone())
        };
        self.visibility.shift_pages(index, -1, &pages);
        removed.hide_all();
        Ok(removed)
    }

    /// Removes every page. Every viewer goes back to index 0.
    pub fn clear_pages(&self) {
        let _guard = self.reconcile.lock();
        let removed = std::mem::take(&mut *self.pages.write());
        self.visibility.reset_pages(&[]);
        for page in removed {
            page.hide_all();
        }
    }

    /// Replaces all pages at once.
    pub fn set_pages(&self, pages: Vec<Arc<Page>>) {
        let _guard = self.reconcile.lock();
        let removed = std::mem::replace(&mut *self.pages.write(), pages.clone());
        self.visibility.reset_pages(&pages);
        for page in removed {
            if !pages.iter().any(|p| Arc::ptr_eq(p, &page)) {
                page.hide_all();
            }
        }
        self.recalculate();
    }

    // ───────────────────────────────────────────────────────────────
    // Navigation
    // ───────────────────────────────────────────────────────────────

    pub fn page_of(&self, viewer: ViewerId) -> usize {
        self.visibility.page_of(viewer)
    }

    pub fn set_page(&self, viewer: ViewerId, index: usize) -> Result<(), HologramError> {
        self.ensure_alive()?;
        let _guard = self.reconcile.lock();
        let pages = self.pages();
        self.visibility.set_page(viewer, index, &pages)
    }

    /// Wraps to the first page after the last.
    pub fn next_page(&self, viewer: ViewerId) -> Result<usize, HologramError> {
        self.step_page(viewer, 1)
    }

    /// Wraps to the last page before the first.
    pub fn previous_page(&self, viewer: ViewerId) -> Result<usize, HologramError> {
        self.step_page(viewer, -1)
    }

    fn step_page(&self, viewer: ViewerId, delta: isize) -> Result<usize, HologramError> {
        self.ensure_alive()?;
        let _guard = self.reconcile.lock();
        let pages = self.pages();
        if pages.is_empty() {
            return Err(HologramError::PageOutOfRange { index: 0, len: 0 });
        }
        let len = pages.len() as isize;
        let current = self.visibility.page_of(viewer) as isize;
        let index = (current + delta).rem_euclid(len) as usize;
        self.visibility.set_page(viewer, index, &pages)?;
        Ok(index)
    }

    // ───────────────────────────────────────────────────────────────
    // Interaction
    // ───────────────────────────────────────────────────────────────

    /// Handles a click on one of the hologram's entities. Returns whether any
    /// click actions ran.
    pub fn click(&self, viewer: ViewerId, entity: EntityId) -> bool {
        if !self.is_ready() || !self.settings.read().interactive {
            return false;
        }
        if !self.visibility.is_visible(viewer) {
            return false;
        }
        let Some(page) = self.page(self.visibility.page_of(viewer)) else {
            return false;
        };
        let Some(line) = page.line_for_entity(viewer, entity) else {
            return false;
        };
        tracing::debug!(hologram = %self.name, %viewer, %entity, "hologram clicked");
        page.click(viewer, &line)
    }

    // ───────────────────────────────────────────────────────────────
    // Reconciliation
    // ───────────────────────────────────────────────────────────────

    fn pass<R>(&self, now: Instant, f: impl FnOnce(&Pass<'_>) -> R) -> R {
        let origin = self.location();
        let settings = self.settings();
        let pages = self.pages();
        let conditions = self.view_conditions();
        f(&Pass {
            now,
            origin: &origin,
            settings: &settings,
            pages: &pages,
            conditions: &conditions,
        })
    }

    pub fn update_visibility(&self, now: Instant) {
        let _guard = self.reconcile.lock();
        self.pass(now, |pass| self.visibility.update_visibility(pass));
    }

    pub fn update_contents(&self, now: Instant) {
        let _guard = self.reconcile.lock();
        self.pass(now, |pass| self.visibility.update_contents(pass));
    }

    /// Releases one viewer's state, e.g. on disconnect.
    pub fn forget_viewer(&self, viewer: ViewerId) {
        let _guard = self.reconcile.lock();
        self.visibility.remove_viewer(viewer);
    }

    // ───────────────────────────────────────────────────────────────
    // Declarative form
    // ───────────────────────────────────────────────────────────────

    pub fn to_definition(&self) -> HologramDefinition {
        HologramDefinition {
            name: self.name.clone(),
            location: match &*self.position.read() {
                Position::Fixed(location) => location.clone(),
                Position::Bound(_) => self.location(),
            },
            settings: self.settings(),
            view_conditions: self.view_conditions.read().persistable(),
            pages: self.pages().iter().map(|p| p.to_definition()).collect(),
            saved_at: None,
        }
    }

    /// Replaces position, settings, conditions and pages with a stored form.
    pub fn apply_definition(&self, definition: &HologramDefinition) -> Result<(), HologramError> {
        self.ensure_alive()?;

        *self.position.write() = Position::Fixed(definition.location.clone());
        *self.origin.write() = definition.location.clone();
        *self.settings.write() = definition.settings.clone();
        *self.view_conditions.write() = definition.view_conditions.clone();

        let layout = self.layout();
        let pages = definition
            .pages
            .iter()
            .map(|p| Page::from_definition(self.services.clone(), p, layout.clone()).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        self.set_pages(pages);
        Ok(())
    }
}

impl Ticked for Hologram {
    fn label(&self) -> String {
        self.name.clone()
    }

    fn tick(&self, ctx: &TickContext) -> anyhow::Result<()> {
        if !self.is_ready() {
            return Ok(());
        }
        let (enabled, moving, update_interval) = {
            let settings = self.settings.read();
            (
                settings.enabled,
                settings.rotates(),
                settings.update_interval,
            )
        };
        if !enabled {
            return Ok(());
        }

        let _guard = self.reconcile.lock();

        if moving || self.position.read().is_bound() {
            self.recalculate();
        }

        let config = &self.services.config;
        if due(&self.last_visibility, ctx.now, config.visibility_interval()) {
            self.update_visibility(ctx.now);
        }
        if due(&self.last_content, ctx.now, config.content_interval(update_interval)) {
            self.update_contents(ctx.now);
        }
        Ok(())
    }
}
