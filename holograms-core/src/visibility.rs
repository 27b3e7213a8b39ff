//! Per-viewer visibility of one hologram.
//!
//! Every viewer is either hidden or visible. Visible viewers have exactly one
//! page on screen, tracked by identity next to their page index so that page
//! list edits can hide precisely what the viewer sees.

use crate::condition::{ConditionHolder, ViewerContext};
use crate::error::HologramError;
use crate::hologram::{HologramSettings, Page};
use crate::render::Delivery;
use crate::services::Services;
use dashmap::DashMap;
use holograms_io::{Location, ViewerId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct ViewerState {
    pub page: usize,
    pub visible: bool,
    pub last_visibility_check: Option<Instant>,
    pub last_content_update: Option<Instant>,
    /// The page on the viewer's screen while visible.
    pub shown: Option<Arc<Page>>,
}

/// Snapshot of the hologram a pass runs against.
pub struct Pass<'a> {
    pub now: Instant,
    pub origin: &'a Location,
    pub settings: &'a HologramSettings,
    pub pages: &'a [Arc<Page>],
    pub conditions: &'a ConditionHolder,
}

pub struct VisibilityManager {
    services: Arc<Services>,
    viewers: DashMap<ViewerId, ViewerState>,
}

impl fmt::Debug for VisibilityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibilityManager")
            .field("tracked", &self.viewers.len())
            .field("visible", &self.visible_viewers().len())
            .finish()
    }
}

fn same_page(a: Option<&Arc<Page>>, b: Option<&Arc<Page>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl VisibilityManager {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            services,
            viewers: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }

    pub fn state(&self, viewer: ViewerId) -> Option<ViewerState> {
        self.viewers.get(&viewer).map(|s| s.clone())
    }

    pub fn page_of(&self, viewer: ViewerId) -> usize {
        self.viewers.get(&viewer).map_or(0, |s| s.page)
    }

    pub fn is_visible(&self, viewer: ViewerId) -> bool {
        self.viewers.get(&viewer).is_some_and(|s| s.visible)
    }

    pub fn visible_viewers(&self) -> Vec<ViewerId> {
        self.viewers
            .iter()
            .filter(|e| e.visible)
            .map(|e| *e.key())
            .collect()
    }

    // ───────────────────────────────────────────────────────────────
    // Passes
    // ───────────────────────────────────────────────────────────────

    /// Decides who sees the hologram and applies Hidden ↔ Visible transitions.
    pub fn update_visibility(&self, pass: &Pass<'_>) {
        let directory = self.services.directory.as_ref();

        let mut candidates: HashSet<ViewerId> = directory.online().into_iter().collect();
        candidates.extend(self.viewers.iter().map(|e| *e.key()));

        for viewer in candidates {
            if !directory.is_connected(viewer) {
                self.remove_viewer(viewer);
                continue;
            }

            let in_range = directory
                .location(viewer)
                .is_some_and(|at| at.within(pass.origin, pass.settings.view_distance));

            let was_visible = self.is_visible(viewer);

            // Conditions run outside any map lock; actions may call back into the engine.
            let evaluation = if pass.settings.enabled && in_range {
                let ctx = ViewerContext::new(viewer, directory);
                Some(pass.conditions.evaluate(&ctx, self.services.actions.as_ref()))
            } else {
                None
            };
            let should_see = evaluation.as_ref().is_some_and(|e| e.passed);

            match (was_visible, should_see) {
                (false, true) => {
                    if self.show(viewer, pass.now, pass.pages) {
                        if let Some(evaluation) = &evaluation {
                            for actions in pass.conditions.met_actions(&evaluation.fulfilled) {
                                self.services.actions.execute(viewer, actions);
                            }
                        }
                    }
                }
                (true, false) => self.conceal(viewer, pass.now),
                _ => {
                    self.viewers.entry(viewer).or_default().last_visibility_check = Some(pass.now);
                }
            }
        }
    }

    /// Refreshes the page of every visible viewer within the update distance.
    /// Hidden viewers are never touched.
    pub fn update_contents(&self, pass: &Pass<'_>) {
        if !pass.settings.updating {
            return;
        }
        let directory = self.services.directory.as_ref();

        let due: Vec<(ViewerId, Arc<Page>)> = self
            .viewers
            .iter_mut()
            .filter(|e| e.visible)
            .filter(|e| {
                directory
                    .location(*e.key())
                    .is_some_and(|at| at.within(pass.origin, pass.settings.update_distance))
            })
            .filter_map(|mut e| {
                e.last_content_update = Some(pass.now);
                let page = e.shown.clone()?;
                Some((*e.key(), page))
            })
            .collect();

        for (viewer, page) in due {
            if page.update(viewer) == Delivery::Gone {
                self.drop_gone(viewer);
            }
        }
    }

    fn show(&self, viewer: ViewerId, now: Instant, pages: &[Arc<Page>]) -> bool {
        let page = {
            let mut state = self.viewers.entry(viewer).or_default();
            state.last_visibility_check = Some(now);
            if pages.is_empty() {
                return false;
            }
            if state.page >= pages.len() {
                state.page = 0;
            }
            let page = pages[state.page].clone();
            state.visible = true;
            state.shown = Some(page.clone());
            page
        };
        if page.display(viewer) == Delivery::Gone {
            self.drop_gone(viewer);
            return false;
        }
        tracing::debug!(%viewer, "hologram shown");
        true
    }

    /// Releases a viewer the transport reported unreachable. Their page has
    /// already forgotten them, so nothing is sent.
    fn drop_gone(&self, viewer: ViewerId) {
        if self.viewers.remove(&viewer).is_some() {
            tracing::debug!(%viewer, "viewer unreachable, state released");
        }
    }

    fn conceal(&self, viewer: ViewerId, now: Instant) {
        let shown = {
            let mut state = self.viewers.entry(viewer).or_default();
            state.last_visibility_check = Some(now);
            state.visible = false;
            state.shown.take()
        };
        if let Some(page) = shown {
            page.hide(viewer);
        }
        tracing::debug!(%viewer, "hologram hidden");
    }

    // ───────────────────────────────────────────────────────────────
    // Pages
    // ───────────────────────────────────────────────────────────────

    /// Moves a viewer to another page. A visible viewer has the old page hidden
    /// and the new one displayed before this returns.
    pub fn set_page(&self, viewer: ViewerId, index: usize, pages: &[Arc<Page>]) -> Result<(), HologramError> {
        let Some(target) = pages.get(index).cloned() else {
            return Err(HologramError::PageOutOfRange {
                index,
                len: pages.len(),
            });
        };

        let previous = {
            let mut state = self.viewers.entry(viewer).or_default();
            state.page = index;
            if !state.visible {
                return Ok(());
            }
            state.shown.replace(target.clone())
        };

        if !same_page(previous.as_ref(), Some(&target)) {
            if let Some(old) = previous {
                old.hide(viewer);
            }
            if target.display(viewer) == Delivery::Gone {
                self.drop_gone(viewer);
            }
        }
        Ok(())
    }

    /// After a page is inserted (`delta = 1`) or removed (`delta = -1`) at
    /// `from`, moves every index at or past it and re-resolves what is shown.
    pub fn shift_pages(&self, from: usize, delta: isize, pages: &[Arc<Page>]) {
        let last = pages.len().saturating_sub(1);
        for mut state in self.viewers.iter_mut() {
            if state.page >= from {
                state.page = state.page.saturating_add_signed(delta).min(last);
            }
        }
        self.resolve(pages);
    }

    pub fn reset_pages(&self, pages: &[Arc<Page>]) {
        for mut state in self.viewers.iter_mut() {
            state.page = 0;
        }
        self.resolve(pages);
    }

    /// Makes each visible viewer's screen match their stored index.
    pub fn resolve(&self, pages: &[Arc<Page>]) {
        let changes: Vec<(ViewerId, Option<Arc<Page>>, Option<Arc<Page>>)> = self
            .viewers
            .iter_mut()
            .filter(|s| s.visible)
            .filter_map(|mut s| {
                if s.page >= pages.len() {
                    s.page = 0;
                }
                let target = pages.get(s.page).cloned();
                if same_page(s.shown.as_ref(), target.as_ref()) {
                    return None;
                }
                // Nothing left to show; the next visibility pass shows them again.
                if target.is_none() {
                    s.visible = false;
                }
                let previous = std::mem::replace(&mut s.shown, target.clone());
                Some((*s.key(), previous, target))
            })
            .collect();

        for (viewer, previous, target) in changes {
            if let Some(old) = previous {
                old.hide(viewer);
            }
            if let Some(new) = target {
                if new.display(viewer) == Delivery::Gone {
                    self.drop_gone(viewer);
                }
            }
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Teardown
    // ───────────────────────────────────────────────────────────────

    /// Hides the hologram from every visible viewer but keeps their page index.
    pub fn hide_all(&self) {
        let shown: Vec<(ViewerId, Arc<Page>)> = self
            .viewers
            .iter_mut()
            .filter_map(|mut s| {
                s.visible = false;
                let page = s.shown.take()?;
                Some((*s.key(), page))
            })
            .collect();
        for (viewer, page) in shown {
            page.hide(viewer);
        }
    }

    /// Forgets a viewer, hiding what they had on screen.
    pub fn remove_viewer(&self, viewer: ViewerId) {
        if let Some((_, state)) = self.viewers.remove(&viewer) {
            if let Some(page) = state.shown {
                page.hide(viewer);
            }
            tracing::debug!(%viewer, "viewer state released");
        }
    }

    /// Releases every viewer. Returns how many had the hologram on screen.
    pub fn destroy(&self) -> usize {
        let tracked: Vec<ViewerId> = self.viewers.iter().map(|e| *e.key()).collect();
        let mut hidden = 0;
        for viewer in tracked {
            if let Some((_, state)) = self.viewers.remove(&viewer) {
                if let Some(page) = state.shown {
                    page.hide(viewer);
                    hidden += 1;
                }
            }
        }
        hidden
    }
}
