//! View and click gating.
//!
//! A [`Condition`] wraps one [`Requirement`] with inversion, a required flag and
//! optional met/not-met action lists. Conditions are grouped in a
//! [`ConditionHolder`], which evaluates them in order.

mod holder;

pub use holder::{ConditionHolder, Evaluation};

use crate::action::ActionList;
use holograms_io::{Location, ViewerDirectory, ViewerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Who a condition is being checked for, and where to look them up.
#[derive(Clone, Copy)]
pub struct ViewerContext<'a> {
    pub viewer: ViewerId,
    pub directory: &'a dyn ViewerDirectory,
}

impl<'a> ViewerContext<'a> {
    pub fn new(viewer: ViewerId, directory: &'a dyn ViewerDirectory) -> Self {
        Self { viewer, directory }
    }
}

impl fmt::Debug for ViewerContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerContext")
            .field("viewer", &self.viewer)
            .finish()
    }
}

/// Host-supplied predicate for requirements the engine has no built-in for.
pub trait Predicate: Send + Sync + fmt::Debug {
    fn test(&self, ctx: &ViewerContext<'_>) -> bool;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Requirement {
    Permission {
        permission: String,
    },
    /// Viewer is in the same world and strictly closer than `max_distance`.
    Distance {
        location: Location,
        max_distance: f64,
    },
    /// Not persisted.
    #[serde(skip)]
    Custom(Arc<dyn Predicate>),
}

impl Requirement {
    /// Missing lookup data (viewer gone, no location) counts as "not met".
    pub fn test(&self, ctx: &ViewerContext<'_>) -> bool {
        match self {
            Requirement::Permission { permission } => {
                ctx.directory.has_permission(ctx.viewer, permission)
            }
            Requirement::Distance {
                location,
                max_distance,
            } => ctx
                .directory
                .location(ctx.viewer)
                .is_some_and(|at| at.within(location, *max_distance)),
            Requirement::Custom(predicate) => predicate.test(ctx),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub requirement: Requirement,
    #[serde(default)]
    pub inverted: bool,
    #[serde(default = "required_by_default")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "ActionList::is_empty")]
    pub met_actions: ActionList,
    #[serde(default, skip_serializing_if = "ActionList::is_empty")]
    pub not_met_actions: ActionList,
}

fn required_by_default() -> bool {
    true
}

impl Condition {
    pub fn new(requirement: Requirement) -> Self {
        Self {
            requirement,
            inverted: false,
            required: true,
            met_actions: ActionList::new(),
            not_met_actions: ActionList::new(),
        }
    }

    pub fn permission(permission: impl Into<String>) -> Self {
        Self::new(Requirement::Permission {
            permission: permission.into(),
        })
    }

    pub fn distance(location: Location, max_distance: f64) -> Self {
        Self::new(Requirement::Distance {
            location,
            max_distance,
        })
    }

    pub fn custom(predicate: Arc<dyn Predicate>) -> Self {
        Self::new(Requirement::Custom(predicate))
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn on_met(mut self, actions: ActionList) -> Self {
        self.met_actions = actions;
        self
    }

    pub fn on_not_met(mut self, actions: ActionList) -> Self {
        self.not_met_actions = actions;
        self
    }

    /// `inverted XOR requirement`.
    pub fn is_fulfilled(&self, ctx: &ViewerContext<'_>) -> bool {
        self.inverted != self.requirement.test(ctx)
    }

    pub fn is_persistable(&self) -> bool {
        !matches!(self.requirement, Requirement::Custom(_))
    }
}
